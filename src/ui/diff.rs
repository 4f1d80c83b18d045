use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use diffnav::document::{Content, FileContainer};
use diffnav::fragment::Row;
use diffnav::viewer::DiffViewer;

pub fn render(frame: &mut Frame, viewer: &DiffViewer, area: Rect) {
    let lines: Vec<Line> = document_lines(viewer)
        .into_iter()
        .skip(viewer.scroll_top())
        .take(area.height as usize)
        .collect();
    frame.render_widget(Paragraph::new(lines), area);
}

/// One line per layout row of the document.
fn document_lines(viewer: &DiffViewer) -> Vec<Line<'_>> {
    let selected = viewer.anchors().selected_anchor().map(|a| (a.file, a.row));
    let highlighted = viewer.highlighted();
    let mut lines = Vec::with_capacity(viewer.document().height());

    for (file, container) in viewer.document().iter().enumerate() {
        match &container.content {
            Content::Rendered(fragment) if !fragment.rows.is_empty() => {
                for (index, row) in fragment.rows.iter().enumerate() {
                    let in_block = highlighted.is_some_and(|h| {
                        h.file == file && h.block.is_some() && h.block == row.block
                    });
                    let is_selected = selected == Some((file, index));
                    lines.push(row_line(row, in_block, is_selected));
                }
            }
            Content::Failed(message) => {
                lines.push(title_line(container, ""));
                lines.push(Line::from(Span::styled(
                    format!("  Error loading diff: {}", message),
                    Style::default().fg(Color::Red),
                )));
            }
            Content::Rendered(_) => lines.push(title_line(container, "")),
            Content::Placeholder | Content::Preloaded(_) => {
                lines.push(title_line(container, " (loading)"))
            }
        }
    }
    lines
}

fn title_line<'a>(container: &FileContainer, suffix: &str) -> Line<'a> {
    Line::from(Span::styled(
        format!("{}{}", container.title(), suffix),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ))
}

fn row_line(row: &Row, in_block: bool, is_selected: bool) -> Line<'_> {
    let gutter = if is_selected { "> " } else { "  " };
    let mut style = if row.header {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else if row.dimmed || row.hidden {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };
    if in_block {
        style = style.bg(Color::Rgb(40, 40, 60));
    }

    let mut spans = vec![Span::styled(gutter, style.fg(Color::Yellow))];
    for (i, cell) in row.cells.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" │ ", style.fg(Color::DarkGray)));
        }
        spans.push(Span::styled(cell.as_str(), style));
    }
    Line::from(spans)
}
