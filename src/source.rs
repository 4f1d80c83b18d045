use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};

/// One file in the diff file list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: u64,
    pub index: usize,
    pub filediff_id: u64,
    pub interfilediff_id: Option<u64>,
    pub filename: String,
    pub new_file: bool,
    pub deleted: bool,
    /// Markup rendered ahead of time, if the server shipped it with the list.
    #[serde(skip)]
    pub preloaded: Option<String>,
}

impl FileEntry {
    /// Name of the element the rendered fragment is bound to, and the prefix
    /// of `file<id>,<line>` bookmarks.
    pub fn element_name(&self) -> String {
        format!("file{}", self.filediff_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: u32,
    pub pages: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            current_page: 1,
            pages: 1,
        }
    }
}

/// The file list and revision metadata for one revision/page context.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiffContext {
    pub revision: u32,
    pub interdiff_revision: Option<u32>,
    pub latest_revision: u32,
    pub num_diffs: u32,
    pub pagination: Pagination,
    pub filename_patterns: Vec<String>,
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RevisionQuery {
    /// `None` asks for the latest revision.
    pub revision: Option<u32>,
    pub interdiff_revision: Option<u32>,
    pub page: u32,
    pub filename_patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentRequest {
    pub revision: u32,
    pub interdiff_revision: Option<u32>,
    pub entry: FileEntry,
    pub show_deleted: bool,
}

#[async_trait]
pub trait DiffSource: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Absolute, shareable URL for a diff viewer route such as `2-3/#file1`.
    fn web_url(&self, route: &str) -> String;

    async fn load_context(&self, query: &RevisionQuery) -> Result<DiffContext>;
    async fn fetch_fragment(&self, request: &FragmentRequest) -> Result<String>;
}

/// In-memory source serving canned file lists and fragments.
#[derive(Debug, Default)]
pub struct MemorySource {
    pub latest_revision: u32,
    /// Files per page; 0 disables pagination.
    pub page_size: usize,
    pub revisions: HashMap<(u32, Option<u32>), Vec<FileEntry>>,
    pub fragments: HashMap<u64, String>,
    pub deleted_fragments: HashMap<u64, String>,
    pub failing: HashSet<u64>,
    pub delays: HashMap<u64, Duration>,
}

impl MemorySource {
    pub fn new(latest_revision: u32) -> Self {
        Self {
            latest_revision,
            ..Self::default()
        }
    }

    pub fn with_files(mut self, revision: (u32, Option<u32>), files: Vec<FileEntry>) -> Self {
        self.revisions.insert(revision, files);
        self
    }

    pub fn with_fragment(mut self, filediff_id: u64, markup: impl Into<String>) -> Self {
        self.fragments.insert(filediff_id, markup.into());
        self
    }
}

#[async_trait]
impl DiffSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn web_url(&self, route: &str) -> String {
        format!("memory:///diff/{}", route)
    }

    async fn load_context(&self, query: &RevisionQuery) -> Result<DiffContext> {
        let revision = query.revision.unwrap_or(self.latest_revision);
        let files = self
            .revisions
            .get(&(revision, query.interdiff_revision))
            .cloned()
            .ok_or_else(|| NavError::Api(format!("no such diff revision {}", revision)))?;

        let page = query.page.max(1);
        let (files, pages) = if self.page_size == 0 {
            (files, 1)
        } else {
            let pages = files.len().div_ceil(self.page_size).max(1) as u32;
            let start = (page as usize - 1) * self.page_size;
            let end = (start + self.page_size).min(files.len());
            (files.get(start..end).map(<[_]>::to_vec).unwrap_or_default(), pages)
        };

        Ok(DiffContext {
            revision,
            interdiff_revision: query.interdiff_revision,
            latest_revision: self.latest_revision,
            num_diffs: self.latest_revision,
            pagination: Pagination {
                current_page: page,
                pages,
            },
            filename_patterns: query.filename_patterns.clone(),
            files,
        })
    }

    async fn fetch_fragment(&self, request: &FragmentRequest) -> Result<String> {
        let id = request.entry.filediff_id;
        if let Some(delay) = self.delays.get(&id) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(&id) {
            return Err(NavError::Api(format!("failed to render filediff {}", id)));
        }
        let fragments = if request.show_deleted {
            &self.deleted_fragments
        } else {
            &self.fragments
        };
        fragments
            .get(&id)
            .cloned()
            .ok_or_else(|| NavError::Api(format!("no fragment for filediff {}", id)))
    }
}
