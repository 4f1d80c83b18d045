use std::collections::{HashMap, HashSet};
use std::ops::BitOr;

/// Bitmask of anchor kinds. A navigation query may match several at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AnchorKinds(u8);

impl AnchorKinds {
    pub const NONE: AnchorKinds = AnchorKinds(0);
    pub const COMMENT: AnchorKinds = AnchorKinds(1);
    pub const FILE: AnchorKinds = AnchorKinds(2);
    pub const CHUNK: AnchorKinds = AnchorKinds(4);

    pub fn intersects(self, other: AnchorKinds) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Classify an anchor element by its CSS class list.
    pub fn from_class_list(classes: &str) -> AnchorKinds {
        classes
            .split_whitespace()
            .fold(AnchorKinds::NONE, |kinds, class| match class {
                "file-anchor" => kinds | AnchorKinds::FILE,
                "chunk-anchor" => kinds | AnchorKinds::CHUNK,
                "commentflag-anchor" => kinds | AnchorKinds::COMMENT,
                _ => kinds,
            })
    }
}

impl BitOr for AnchorKinds {
    type Output = AnchorKinds;

    fn bitor(self, rhs: AnchorKinds) -> AnchorKinds {
        AnchorKinds(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Backward,
    Forward,
}

impl Direction {
    fn step(self) -> isize {
        match self {
            Direction::Backward => -1,
            Direction::Forward => 1,
        }
    }
}

/// One navigable position in the rendered diff document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub name: String,
    pub kinds: AnchorKinds,
    /// Position of the owning file container in the document.
    pub file: usize,
    /// Row within the owning file's rendered fragment.
    pub row: usize,
    /// Enclosing `<thead>`/`<tbody>` block within the fragment.
    pub block: Option<usize>,
    pub dimmed: bool,
    pub hidden: bool,
    pub whitespace: bool,
}

impl Anchor {
    pub fn new(name: impl Into<String>, kinds: AnchorKinds, file: usize, row: usize) -> Self {
        Self {
            name: name.into(),
            kinds,
            file,
            row,
            block: None,
            dimmed: false,
            hidden: false,
            whitespace: false,
        }
    }
}

/// Outcome of registering a file's anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Registered {
    pub added: usize,
    /// Set when nothing was selected before and the first anchor got picked.
    pub first_selected: Option<usize>,
}

/// Ordered collection of anchors in document order, plus the selection cursor.
///
/// The selection is an index into the ordered collection so neighbor lookups
/// walk from it directly.
#[derive(Debug, Default)]
pub struct AnchorIndex {
    anchors: Vec<Anchor>,
    names: HashMap<String, usize>,
    selected: Option<usize>,
}

impl AnchorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.anchors.clear();
        self.names.clear();
        self.selected = None;
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Anchor> {
        self.anchors.get(index)
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_anchor(&self) -> Option<&Anchor> {
        self.selected.and_then(|i| self.anchors.get(i))
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub fn set_selected(&mut self, index: usize) -> bool {
        if index < self.anchors.len() {
            self.selected = Some(index);
            true
        } else {
            false
        }
    }

    /// Register the anchors scanned from one file's rendered fragment.
    ///
    /// Anchors already registered for `file` are replaced in place. New anchors
    /// land after every earlier file's anchors and before every later file's,
    /// so the collection stays in document order whatever order files arrive in.
    pub fn register(&mut self, file: usize, anchors: Vec<Anchor>) -> Registered {
        let previous = self.selected_anchor().map(|a| (a.name.clone(), a.file));
        let replaced_at = self.anchors.iter().position(|a| a.file == file);

        self.anchors.retain(|a| a.file != file);
        let insert_at = self.anchors.partition_point(|a| a.file < file);

        let mut taken: HashSet<String> = self.anchors.iter().map(|a| a.name.clone()).collect();
        let mut fresh: Vec<Anchor> = Vec::with_capacity(anchors.len());
        for mut anchor in anchors {
            if !taken.insert(anchor.name.clone()) {
                tracing::debug!(name = %anchor.name, "skipping duplicate anchor");
                continue;
            }
            anchor.file = file;
            fresh.push(anchor);
        }

        let added = fresh.len();
        self.anchors.splice(insert_at..insert_at, fresh);
        self.reindex();

        self.selected = match previous {
            Some((name, _)) if self.names.contains_key(&name) => self.position(&name),
            Some((_, prev_file)) if prev_file == file => replaced_at
                .filter(|_| added > 0)
                .map(|_| insert_at)
                .or_else(|| (!self.anchors.is_empty()).then_some(0)),
            _ => self.selected.filter(|&i| i < self.anchors.len()),
        };

        let mut registered = Registered {
            added,
            first_selected: None,
        };
        if self.selected.is_none() && !self.anchors.is_empty() {
            self.selected = Some(0);
            registered.first_selected = Some(0);
        }
        registered
    }

    /// Walk from the current selection and return the first anchor of `kinds`,
    /// skipping dimmed rows. Reaching either end returns `None`.
    pub fn find_next(&self, direction: Direction, kinds: AnchorKinds) -> Option<usize> {
        let len = self.anchors.len() as isize;
        let start = self.selected.map(|i| i as isize).unwrap_or(-1);
        let step = direction.step();
        let mut i = start + step;

        while i >= 0 && i < len {
            let anchor = &self.anchors[i as usize];
            if !anchor.dimmed && anchor.kinds.intersects(kinds) {
                return Some(i as usize);
            }
            i += step;
        }
        None
    }

    /// Flip the dimmed state of anchors sitting on whitespace-only lines.
    pub fn toggle_whitespace_dimming(&mut self) -> usize {
        let mut toggled = 0;
        for anchor in self.anchors.iter_mut().filter(|a| a.whitespace) {
            anchor.dimmed = !anchor.dimmed;
            toggled += 1;
        }
        toggled
    }

    fn reindex(&mut self) {
        self.names.clear();
        for (i, anchor) in self.anchors.iter().enumerate() {
            self.names.insert(anchor.name.clone(), i);
        }
    }
}
