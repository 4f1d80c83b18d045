use crate::anchor::Anchor;
use crate::fragment::Fragment;
use crate::source::FileEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Inserted from the file metadata before any markup arrives.
    Placeholder,
    Preloaded(String),
    Rendered(Fragment),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContainer {
    pub entry: FileEntry,
    pub content: Content,
}

impl FileContainer {
    pub fn placeholder(entry: FileEntry) -> Self {
        let content = match entry.preloaded.clone() {
            Some(markup) => Content::Preloaded(markup),
            None => Content::Placeholder,
        };
        Self { entry, content }
    }

    /// Header line shown while the file has no rendered rows.
    pub fn title(&self) -> String {
        if self.entry.new_file {
            format!("{} (new file)", self.entry.filename)
        } else {
            self.entry.filename.clone()
        }
    }

    pub fn has_markup(&self) -> bool {
        matches!(self.content, Content::Preloaded(_) | Content::Rendered(_))
    }

    pub fn fragment(&self) -> Option<&Fragment> {
        match &self.content {
            Content::Rendered(fragment) => Some(fragment),
            _ => None,
        }
    }

    /// Height in rows.
    pub fn height(&self) -> usize {
        match &self.content {
            Content::Rendered(fragment) => fragment.height().max(1),
            Content::Failed(_) => 2,
            Content::Placeholder | Content::Preloaded(_) => 1,
        }
    }
}

/// The diff document: one container per file, in file-list order.
#[derive(Debug, Default)]
pub struct DiffDocument {
    files: Vec<FileContainer>,
}

impl DiffDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self, entries: Vec<FileEntry>) {
        self.files = entries.into_iter().map(FileContainer::placeholder).collect();
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileContainer> {
        self.files.iter()
    }

    pub fn get(&self, file: usize) -> Option<&FileContainer> {
        self.files.get(file)
    }

    /// Render a file from new markup, or from the markup it already holds when
    /// `markup` is `None`. Returns the fragment to scan for anchors.
    pub fn render(&mut self, file: usize, markup: Option<&str>) -> Option<&mut Fragment> {
        let container = self.files.get_mut(file)?;
        let fragment = match (markup, &container.content) {
            (Some(markup), _) => Fragment::parse(markup),
            (None, Content::Preloaded(markup)) => Fragment::parse(markup),
            (None, Content::Rendered(fragment)) => fragment.clone(),
            (None, _) => return None,
        };
        container.content = Content::Rendered(fragment);
        match &mut container.content {
            Content::Rendered(fragment) => Some(fragment),
            _ => None,
        }
    }

    pub fn fail(&mut self, file: usize, message: impl Into<String>) {
        if let Some(container) = self.files.get_mut(file) {
            container.content = Content::Failed(message.into());
        }
    }

    pub fn file_top(&self, file: usize) -> usize {
        self.files.iter().take(file).map(FileContainer::height).sum()
    }

    pub fn anchor_top(&self, anchor: &Anchor) -> usize {
        self.file_top(anchor.file) + anchor.row
    }

    pub fn height(&self) -> usize {
        self.files.iter().map(FileContainer::height).sum()
    }

    pub fn toggle_whitespace_dimming(&mut self) {
        for container in &mut self.files {
            if let Content::Rendered(fragment) = &mut container.content {
                fragment.toggle_whitespace_dimming();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: usize, filediff_id: u64) -> FileEntry {
        FileEntry {
            id: 100 + index as u64,
            index,
            filediff_id,
            interfilediff_id: None,
            filename: format!("src/file{}.rs", index),
            new_file: index == 1,
            deleted: false,
            preloaded: None,
        }
    }

    const TWO_ROWS: &str = r#"<table><thead><tr><th><a name="0" class="file-anchor"></a>a</th></tr></thead>
<tbody><tr line="1"><th><a name="0.0" class="chunk-anchor"></a>1</th><td>x</td></tr></tbody></table>"#;

    #[test]
    fn layout_accounts_for_each_state() {
        let mut doc = DiffDocument::new();
        doc.reset(vec![entry(0, 200), entry(1, 201), entry(2, 202)]);
        assert_eq!(doc.height(), 3);

        doc.render(0, Some(TWO_ROWS));
        doc.fail(1, "boom");
        assert_eq!(doc.file_top(1), 2);
        assert_eq!(doc.file_top(2), 4);
        assert_eq!(doc.height(), 5);

        let anchors = doc.get(0).unwrap().fragment().unwrap().anchors_for(0);
        assert_eq!(doc.anchor_top(&anchors[1]), 1);
    }

    #[test]
    fn render_from_existing_markup() {
        let mut preloaded = entry(0, 200);
        preloaded.preloaded = Some(TWO_ROWS.to_string());
        let mut doc = DiffDocument::new();
        doc.reset(vec![preloaded, entry(1, 201)]);

        assert!(doc.get(0).unwrap().has_markup());
        assert!(doc.render(0, None).is_some());
        assert!(doc.render(1, None).is_none());
        assert_eq!(doc.get(0).unwrap().height(), 2);
    }

    #[test]
    fn titles_mark_new_files() {
        let mut doc = DiffDocument::new();
        doc.reset(vec![entry(0, 200), entry(1, 201)]);
        assert_eq!(doc.get(0).unwrap().title(), "src/file0.rs");
        assert_eq!(doc.get(1).unwrap().title(), "src/file1.rs (new file)");
        assert_eq!(doc.get(1).unwrap().entry.element_name(), "file201");
    }
}
