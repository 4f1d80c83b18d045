//! Scanning of rendered diff fragments.
//!
//! A fragment is the HTML table the server renders for one file's diff. We
//! parse it once into rows, blocks (`<thead>`/`<tbody>`) and the named anchors
//! that live in header cells, which is everything navigation needs.

use html5ever::tendril::TendrilSink;
use html5ever::{parse_document, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::anchor::{Anchor, AnchorKinds};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub cells: Vec<String>,
    /// Virtual line number from the `line` attribute.
    pub line: Option<u32>,
    pub block: Option<usize>,
    pub header: bool,
    pub dimmed: bool,
    pub whitespace: bool,
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub id: Option<String>,
    pub header: bool,
    pub first_row: usize,
    /// Exclusive.
    pub end_row: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentAnchor {
    pub name: String,
    pub kinds: AnchorKinds,
    pub row: usize,
    pub block: Option<usize>,
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub rows: Vec<Row>,
    pub blocks: Vec<Block>,
    pub anchors: Vec<FragmentAnchor>,
}

impl Fragment {
    pub fn parse(markup: &str) -> Fragment {
        let dom = parse_document(RcDom::default(), ParseOpts::default()).one(markup);
        let mut scanner = Scanner::default();
        scanner.walk(&dom.document, Context::default());
        scanner.fragment
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Anchors for the index, in document order, bound to file position `file`.
    pub fn anchors_for(&self, file: usize) -> Vec<Anchor> {
        self.anchors
            .iter()
            .map(|fa| {
                let row = &self.rows[fa.row];
                Anchor {
                    name: fa.name.clone(),
                    kinds: fa.kinds,
                    file,
                    row: fa.row,
                    block: fa.block,
                    dimmed: row.dimmed,
                    hidden: fa.hidden || row.hidden,
                    whitespace: row.whitespace,
                }
            })
            .collect()
    }

    /// Add a kind-less anchor on the row showing `line`, for bookmarks that
    /// point at a line the markup did not anchor. Returns false if no row has
    /// that line.
    pub fn anchor_at_line(&mut self, name: &str, line: u32) -> bool {
        if self.anchors.iter().any(|a| a.name == name) {
            return true;
        }
        let Some(row) = self.rows.iter().position(|r| r.line == Some(line)) else {
            return false;
        };
        let at = self.anchors.partition_point(|a| a.row <= row);
        self.anchors.insert(
            at,
            FragmentAnchor {
                name: name.to_string(),
                kinds: AnchorKinds::NONE,
                row,
                block: self.rows[row].block,
                hidden: self.rows[row].hidden,
            },
        );
        true
    }

    /// First and last line numbers shown in a block.
    pub fn block_lines(&self, block: usize) -> Option<(u32, u32)> {
        let block = self.blocks.get(block)?;
        let rows = &self.rows[block.first_row..block.end_row];
        let first = rows.iter().find_map(|r| r.line)?;
        let last = rows.iter().rev().find_map(|r| r.line)?;
        Some((first, last))
    }

    pub fn toggle_whitespace_dimming(&mut self) {
        for row in self.rows.iter_mut().filter(|r| r.whitespace) {
            row.dimmed = !row.dimmed;
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Context {
    hidden: bool,
    in_header_cell: bool,
    in_head: bool,
    row: Option<usize>,
    cell: Option<usize>,
}

#[derive(Default)]
struct Scanner {
    fragment: Fragment,
    block: Option<usize>,
}

impl Scanner {
    fn walk(&mut self, node: &Handle, ctx: Context) {
        match &node.data {
            NodeData::Element { name, attrs, .. } => {
                let tag: &str = &name.local;
                let attrs = attrs.borrow();
                let attr = |key: &str| {
                    attrs
                        .iter()
                        .find(|a| &*a.name.local == key)
                        .map(|a| a.value.to_string())
                };
                let classes = attr("class").unwrap_or_default();
                let has_class = |c: &str| classes.split_whitespace().any(|x| x == c);

                let mut ctx = ctx;
                ctx.hidden = ctx.hidden || attr("hidden").is_some() || has_class("hidden") || {
                    let style = attr("style").unwrap_or_default().replace(' ', "");
                    style.contains("display:none")
                };

                match tag {
                    "script" | "style" => {}
                    "thead" | "tbody" => {
                        let outer = self.block;
                        let index = self.fragment.blocks.len();
                        self.fragment.blocks.push(Block {
                            id: attr("id"),
                            header: tag == "thead",
                            first_row: self.fragment.rows.len(),
                            end_row: self.fragment.rows.len(),
                        });
                        self.block = Some(index);
                        ctx.in_head = tag == "thead";
                        self.walk_children(node, ctx);
                        self.fragment.blocks[index].end_row = self.fragment.rows.len();
                        self.block = outer;
                    }
                    "tr" => {
                        let index = self.fragment.rows.len();
                        self.fragment.rows.push(Row {
                            cells: Vec::new(),
                            line: attr("line").and_then(|l| l.trim().parse().ok()),
                            block: self.block,
                            header: ctx.in_head,
                            dimmed: has_class("dimmed"),
                            whitespace: has_class("whitespace-line"),
                            hidden: ctx.hidden,
                        });
                        ctx.row = Some(index);
                        ctx.cell = None;
                        self.walk_children(node, ctx);
                        for cell in &mut self.fragment.rows[index].cells {
                            let trimmed = cell.trim_matches(|c| c == '\n' || c == '\r');
                            *cell = trimmed.trim_end().to_string();
                        }
                    }
                    "th" | "td" => {
                        if let Some(row) = ctx.row {
                            let cells = &mut self.fragment.rows[row].cells;
                            cells.push(String::new());
                            ctx.cell = Some(cells.len() - 1);
                        }
                        ctx.in_header_cell = tag == "th";
                        self.walk_children(node, ctx);
                    }
                    "a" => {
                        if let (Some(name), true, Some(row)) =
                            (attr("name"), ctx.in_header_cell, ctx.row)
                        {
                            self.fragment.anchors.push(FragmentAnchor {
                                name,
                                kinds: AnchorKinds::from_class_list(&classes),
                                row,
                                block: self.block,
                                hidden: ctx.hidden,
                            });
                        }
                        self.walk_children(node, ctx);
                    }
                    _ => self.walk_children(node, ctx),
                }
            }
            NodeData::Text { contents } => {
                if let (Some(row), Some(cell)) = (ctx.row, ctx.cell) {
                    self.fragment.rows[row].cells[cell].push_str(&contents.borrow());
                }
            }
            _ => self.walk_children(node, ctx),
        }
    }

    fn walk_children(&mut self, node: &Handle, ctx: Context) {
        for child in node.children.borrow().iter() {
            self.walk(child, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE_ONE: &str = r#"
<table class="sidebyside" id="file200">
 <thead>
  <tr class="filename-row">
   <th colspan="4"><a name="file1" class="file-anchor"></a>src/main.rs</th>
  </tr>
 </thead>
 <tbody class="insert" id="chunk0.0">
  <tr line="100">
   <th><a name="1.1" class="chunk-anchor"></a>100</th>
   <td class="l">fn main() {}</td>
   <th>101</th>
   <td class="r">fn main() { run(); }</td>
  </tr>
  <tr line="101"><th>101</th><td class="l"></td><th>102</th><td class="r">}</td></tr>
 </tbody>
 <tbody class="equal whitespace-chunk" id="chunk0.1">
  <tr line="102" class="dimmed whitespace-line">
   <th><a name="1.2" class="chunk-anchor"></a>102</th>
   <td class="l">  x</td><th>103</th><td class="r">x</td>
  </tr>
 </tbody>
 <tbody id="chunk0.2" style="display: none">
  <tr line="110">
   <th><a name="c1" class="commentflag-anchor"></a>110</th>
   <td class="l">y</td><th>111</th><td class="r">y</td>
  </tr>
 </tbody>
</table>
"#;

    #[test]
    fn parses_rows_blocks_and_anchors() {
        let fragment = Fragment::parse(FILE_ONE);

        assert_eq!(fragment.rows.len(), 5);
        assert_eq!(fragment.blocks.len(), 4);
        assert!(fragment.rows[0].header);
        assert_eq!(fragment.rows[1].line, Some(100));
        assert_eq!(fragment.rows[1].cells[1], "fn main() {}");

        let names: Vec<&str> = fragment.anchors.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["file1", "1.1", "1.2", "c1"]);
        assert_eq!(fragment.anchors[0].kinds, AnchorKinds::FILE);
        assert_eq!(fragment.anchors[1].kinds, AnchorKinds::CHUNK);
        assert_eq!(fragment.anchors[3].kinds, AnchorKinds::COMMENT);
        assert_eq!(fragment.anchors[1].block, Some(1));
    }

    #[test]
    fn row_flags_flow_into_anchors() {
        let fragment = Fragment::parse(FILE_ONE);
        let anchors = fragment.anchors_for(3);

        assert!(anchors.iter().all(|a| a.file == 3));
        assert!(anchors[2].dimmed);
        assert!(anchors[2].whitespace);
        assert!(!anchors[1].dimmed);
        assert!(anchors[3].hidden);
        assert!(!anchors[0].hidden);
    }

    #[test]
    fn anchors_outside_header_cells_are_ignored() {
        let fragment = Fragment::parse(
            r#"<table><tbody><tr line="1"><td><a name="nope"></a>x</td></tr></tbody></table>"#,
        );
        assert!(fragment.anchors.is_empty());
        assert_eq!(fragment.rows.len(), 1);
    }

    #[test]
    fn block_lines_span_first_to_last_row() {
        let fragment = Fragment::parse(FILE_ONE);
        assert_eq!(fragment.block_lines(1), Some((100, 101)));
        assert_eq!(fragment.block_lines(0), None);
        assert_eq!(fragment.block_lines(9), None);
    }

    #[test]
    fn line_anchor_is_inserted_in_row_order() {
        let mut fragment = Fragment::parse(FILE_ONE);
        assert!(fragment.anchor_at_line("file200,101", 101));
        assert!(!fragment.anchor_at_line("file200,999", 999));

        let names: Vec<&str> = fragment.anchors.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["file1", "1.1", "file200,101", "1.2", "c1"]);
        assert!(fragment.anchors[2].kinds.is_empty());
    }

    #[test]
    fn whitespace_toggle_undims_rows() {
        let mut fragment = Fragment::parse(FILE_ONE);
        fragment.toggle_whitespace_dimming();
        assert!(!fragment.rows[3].dimmed);
        assert!(!fragment.anchors_for(0)[2].dimmed);
    }
}
