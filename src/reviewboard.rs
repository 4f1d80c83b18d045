use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{NavError, Result};
use crate::route::split_location;
use crate::source::{DiffContext, DiffSource, FileEntry, FragmentRequest, Pagination, RevisionQuery};

/// A pasted diff viewer URL, split into the server, the review request and
/// the route below `/r/<id>/diff/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewUrl {
    pub server: String,
    pub review_request: u64,
    /// `revision[-interdiff]/[?query][#anchor]`, possibly empty.
    pub route: String,
}

impl ReviewUrl {
    pub fn parse(url: &str) -> Result<Self> {
        let invalid = || NavError::Route(format!("not a diff viewer URL: {}", url));

        let (path, query, hash) = split_location(url);
        let at = path.find("/r/").ok_or_else(invalid)?;
        let server = path[..at].trim_end_matches('/').to_string();
        if !server.starts_with("http://") && !server.starts_with("https://") {
            return Err(invalid());
        }

        let rest = &path[at + "/r/".len()..];
        let (id, rest) = rest.split_once('/').unwrap_or((rest, ""));
        let review_request: u64 = id.parse().map_err(|_| invalid())?;
        let rest = rest.strip_prefix("diff").unwrap_or(rest);
        let rest = rest.strip_prefix('/').unwrap_or(rest);

        let mut route = rest.to_string();
        route.push_str(query);
        if let Some(hash) = hash {
            route.push('#');
            route.push_str(hash);
        }

        Ok(Self {
            server,
            review_request,
            route,
        })
    }

    pub fn host(&self) -> &str {
        let without_scheme = self
            .server
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(self.server.as_str());
        without_scheme.split('/').next().unwrap_or(without_scheme)
    }
}

#[derive(Debug)]
pub struct ReviewBoard {
    client: Client,
    server: String,
    review_request: u64,
    token: Option<String>,
}

impl ReviewBoard {
    pub fn new(server: impl Into<String>, review_request: u64, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            server: server.into().trim_end_matches('/').to_string(),
            review_request,
            token,
        }
    }

    fn diff_root(&self) -> String {
        format!("{}/r/{}/diff", self.server, self.review_request)
    }

    fn context_url(&self, query: &RevisionQuery) -> String {
        let mut params = Vec::new();
        if let Some(revision) = query.revision {
            params.push(format!("revision={}", revision));
        }
        if let Some(interdiff) = query.interdiff_revision {
            params.push(format!("interdiff-revision={}", interdiff));
        }
        if query.page > 1 {
            params.push(format!("page={}", query.page));
        }
        if !query.filename_patterns.is_empty() {
            params.push(format!(
                "filenames={}",
                urlencoding::encode(&query.filename_patterns.join(","))
            ));
        }

        let mut url = format!(
            "{}/api/review-requests/{}/diff-context/",
            self.server, self.review_request
        );
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }
        url
    }

    fn fragment_url(&self, request: &FragmentRequest) -> String {
        let mut url = format!("{}/{}", self.diff_root(), request.revision);
        if let Some(interdiff) = request.interdiff_revision {
            url.push_str(&format!("-{}", interdiff));
        }
        url.push_str(&format!("/fragment/{}", request.entry.filediff_id));
        if let Some(interfilediff) = request.entry.interfilediff_id {
            url.push_str(&format!("-{}", interfilediff));
        }
        url.push_str(&format!("/?index={}", request.entry.index));
        if request.show_deleted {
            url.push_str("&show-deleted=1");
        }
        url
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("token {}", token));
        }
        let response = request.send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(NavError::Auth(format!(
                "Review Board {}: set a token via [server] token_env or token_command",
                status
            )));
        }
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(NavError::Api(format!("Review Board {}: {}", status, text)));
        }
        Ok(response)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        Ok(self.get(url).await?.json().await?)
    }
}

// Review Board API response types

#[derive(Deserialize)]
struct RbContextResponse {
    diff_context: RbDiffContext,
}

#[derive(Deserialize)]
struct RbDiffContext {
    revision: RbRevision,
    #[serde(default)]
    num_diffs: u32,
    #[serde(default)]
    pagination: RbPagination,
    #[serde(default)]
    filename_patterns: Vec<String>,
    #[serde(default)]
    files: Vec<RbFile>,
}

#[derive(Deserialize)]
struct RbRevision {
    revision: u32,
    interdiff_revision: Option<u32>,
    latest_revision: Option<u32>,
}

#[derive(Deserialize)]
struct RbPagination {
    current_page: u32,
    #[serde(default = "one")]
    pages: u32,
}

impl Default for RbPagination {
    fn default() -> Self {
        Self {
            current_page: 1,
            pages: 1,
        }
    }
}

fn one() -> u32 {
    1
}

#[derive(Deserialize)]
struct RbFile {
    id: u64,
    index: usize,
    filediff: RbFileDiff,
    interfilediff: Option<RbFileDiff>,
    #[serde(default)]
    newfile: bool,
    #[serde(default)]
    deleted: bool,
    depot_filename: Option<String>,
    dest_filename: Option<String>,
}

#[derive(Deserialize)]
struct RbFileDiff {
    id: u64,
}

impl From<RbFile> for FileEntry {
    fn from(file: RbFile) -> Self {
        FileEntry {
            id: file.id,
            index: file.index,
            filediff_id: file.filediff.id,
            interfilediff_id: file.interfilediff.map(|f| f.id),
            filename: file
                .dest_filename
                .or(file.depot_filename)
                .unwrap_or_default(),
            new_file: file.newfile,
            deleted: file.deleted,
            preloaded: None,
        }
    }
}

impl From<RbDiffContext> for DiffContext {
    fn from(ctx: RbDiffContext) -> Self {
        DiffContext {
            revision: ctx.revision.revision,
            interdiff_revision: ctx.revision.interdiff_revision,
            latest_revision: ctx.revision.latest_revision.unwrap_or(ctx.num_diffs),
            num_diffs: ctx.num_diffs,
            pagination: Pagination {
                current_page: ctx.pagination.current_page.max(1),
                pages: ctx.pagination.pages.max(1),
            },
            filename_patterns: ctx.filename_patterns,
            files: ctx.files.into_iter().map(FileEntry::from).collect(),
        }
    }
}

#[async_trait]
impl DiffSource for ReviewBoard {
    fn name(&self) -> &str {
        "Review Board"
    }

    fn web_url(&self, route: &str) -> String {
        format!("{}/{}", self.diff_root(), route)
    }

    async fn load_context(&self, query: &RevisionQuery) -> Result<DiffContext> {
        let url = self.context_url(query);
        tracing::debug!(%url, "loading diff context");
        let response: RbContextResponse = self.get_json(&url).await?;
        Ok(response.diff_context.into())
    }

    async fn fetch_fragment(&self, request: &FragmentRequest) -> Result<String> {
        let url = self.fragment_url(request);
        tracing::debug!(%url, "fetching diff fragment");
        Ok(self.get(&url).await?.text().await?)
    }
}
