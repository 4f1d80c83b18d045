//! URL and history state for the diff viewer.
//!
//! The URL is the only persisted navigation state. It has the shape
//! `revision[-interdiff]/[?page=N&filenames=a,b][#anchor]`, relative to the
//! review request's diff viewer root.

use crate::error::{NavError, Result};
use crate::source::RevisionQuery;

/// Logical position within the multi-revision diff view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    /// `None` until the first revision has loaded.
    pub revision: Option<u32>,
    pub interdiff_revision: Option<u32>,
    /// 1-based.
    pub page: u32,
    pub filename_patterns: Vec<String>,
    pub anchor_name: Option<String>,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            revision: None,
            interdiff_revision: None,
            page: 1,
            filename_patterns: Vec::new(),
            anchor_name: None,
        }
    }
}

impl NavigationState {
    pub fn same_range(&self, revision: u32, interdiff_revision: Option<u32>) -> bool {
        self.revision == Some(revision) && self.interdiff_revision == interdiff_revision
    }
}

/// Everything a route carries, parsed out of a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub revision: u32,
    pub interdiff_revision: Option<u32>,
    pub page: u32,
    pub filename_patterns: Vec<String>,
    pub anchor: Option<String>,
}

impl RouteMatch {
    pub fn query(&self) -> RevisionQuery {
        RevisionQuery {
            revision: Some(self.revision),
            interdiff_revision: self.interdiff_revision,
            page: self.page,
            filename_patterns: self.filename_patterns.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Used exactly as given, including its leading `?`.
    Verbatim(String),
    Params(Vec<(&'static str, String)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    pub revision: u32,
    pub interdiff_revision: Option<u32>,
    pub query: Query,
    pub anchor: Option<String>,
}

pub trait Router: Send + std::fmt::Debug {
    fn parse_route(&self, url: &str) -> Option<RouteMatch>;
    fn build_url(&self, parts: &UrlParts) -> String;
}

/// Router for `revision[-interdiff]/[?query][#anchor]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffRouter;

impl Router for DiffRouter {
    fn parse_route(&self, url: &str) -> Option<RouteMatch> {
        let (path, query, anchor) = split_location(url);

        let range = path.strip_suffix('/').unwrap_or(path);
        let (revision, interdiff_revision) = match range.split_once('-') {
            Some((base, tip)) => (parse_revision(base)?, Some(parse_revision(tip)?)),
            None => (parse_revision(range)?, None),
        };

        let (page, filename_patterns) = parse_query(query);

        Some(RouteMatch {
            revision,
            interdiff_revision,
            page,
            filename_patterns,
            anchor: anchor.map(str::to_string),
        })
    }

    fn build_url(&self, parts: &UrlParts) -> String {
        let mut url = parts.revision.to_string();
        if let Some(interdiff) = parts.interdiff_revision {
            url.push_str(&format!("-{}", interdiff));
        }
        url.push('/');

        match &parts.query {
            Query::Verbatim(query) if query.is_empty() => {}
            Query::Verbatim(query) => {
                if !query.starts_with('?') {
                    url.push('?');
                }
                url.push_str(query);
            }
            Query::Params(params) if params.is_empty() => {}
            Query::Params(params) => {
                let joined: Vec<String> = params
                    .iter()
                    .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
                    .collect();
                url.push('?');
                url.push_str(&joined.join("&"));
            }
        }

        if let Some(anchor) = &parts.anchor {
            url.push('#');
            url.push_str(anchor);
        }
        url
    }
}

fn parse_revision(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Split a location into path, query (with its `?`, or empty) and hash.
pub fn split_location(url: &str) -> (&str, &str, Option<&str>) {
    let (rest, hash) = match url.split_once('#') {
        Some((rest, hash)) => (rest, Some(hash).filter(|h| !h.is_empty())),
        None => (url, None),
    };
    match rest.find('?') {
        Some(at) => (&rest[..at], &rest[at..], hash),
        None => (rest, "", hash),
    }
}

/// Read `page` and `filenames` from a query string, with or without its `?`.
pub fn parse_query(query: &str) -> (u32, Vec<String>) {
    let mut page = 1;
    let mut filename_patterns = Vec::new();
    let query = query.strip_prefix('?').unwrap_or(query);
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = urlencoding::decode(value)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| value.to_string());
        match key {
            "page" => page = value.parse::<u32>().ok().filter(|p| *p > 0).unwrap_or(1),
            "filenames" => filename_patterns = split_patterns(&value),
            _ => {}
        }
    }
    (page, filename_patterns)
}

pub fn split_patterns(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

pub trait History: Send + std::fmt::Debug {
    /// Replace the current entry without triggering a route.
    fn replace(&mut self, url: &str);
    /// Add a new entry.
    fn push(&mut self, url: &str);
    /// Step back one entry, returning its URL.
    fn back(&mut self) -> Option<String>;
    fn current(&self) -> Option<&str>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryHistory {
    entries: Vec<String>,
    cursor: usize,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the URL the viewer was opened at.
    pub fn starting_at(url: impl Into<String>) -> Self {
        Self {
            entries: vec![url.into()],
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl History for MemoryHistory {
    fn replace(&mut self, url: &str) {
        match self.entries.get_mut(self.cursor) {
            Some(entry) => *entry = url.to_string(),
            None => {
                self.entries.push(url.to_string());
                self.cursor = self.entries.len() - 1;
            }
        }
    }

    fn push(&mut self, url: &str) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push(url.to_string());
        self.cursor = self.entries.len() - 1;
    }

    fn back(&mut self) -> Option<String> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor).cloned()
    }

    fn current(&self) -> Option<&str> {
        self.entries.get(self.cursor).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigateOptions {
    pub revision: Option<u32>,
    /// `Some(None)` explicitly drops the interdiff.
    pub interdiff_revision: Option<Option<u32>>,
    pub page: Option<u32>,
    pub anchor: Option<String>,
    pub query_string: Option<String>,
    pub update_url_only: bool,
}

impl NavigateOptions {
    pub fn revision(mut self, revision: u32) -> Self {
        self.revision = Some(revision);
        self
    }

    pub fn interdiff(mut self, interdiff_revision: Option<u32>) -> Self {
        self.interdiff_revision = Some(interdiff_revision);
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    pub fn query_string(mut self, query: impl Into<String>) -> Self {
        self.query_string = Some(query.into());
        self
    }

    pub fn url_only(mut self) -> Self {
        self.update_url_only = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// The displayed URL changed in place; nothing needs loading.
    UrlOnly(String),
    /// A new history entry was added and the route must be loaded.
    Route { url: String, route: RouteMatch },
}

impl Navigation {
    pub fn url(&self) -> &str {
        match self {
            Navigation::UrlOnly(url) => url,
            Navigation::Route { url, .. } => url,
        }
    }
}

/// Keeps the history's URL a faithful representation of a [`NavigationState`].
#[derive(Debug)]
pub struct UrlSynchronizer {
    router: Box<dyn Router>,
    history: Box<dyn History>,
}

impl UrlSynchronizer {
    pub fn new(router: Box<dyn Router>, history: Box<dyn History>) -> Self {
        Self { router, history }
    }

    pub fn current_url(&self) -> Option<&str> {
        self.history.current()
    }

    pub fn parse(&self, url: &str) -> Option<RouteMatch> {
        self.router.parse_route(url)
    }

    pub fn navigate(
        &mut self,
        state: &NavigationState,
        options: NavigateOptions,
    ) -> Result<Navigation> {
        let revision = options
            .revision
            .or(state.revision)
            .ok_or_else(|| NavError::Route("no diff revision loaded".to_string()))?;
        let interdiff_revision = options
            .interdiff_revision
            .unwrap_or(state.interdiff_revision);

        let query = match options.query_string {
            Some(query) => Query::Verbatim(query),
            None => {
                let mut params = Vec::new();
                // Keep the current page only while the revision range stays put.
                let page = options.page.or_else(|| {
                    state
                        .same_range(revision, interdiff_revision)
                        .then_some(state.page)
                });
                if let Some(page) = page.filter(|p| *p != 1) {
                    params.push(("page", page.to_string()));
                }
                if !state.filename_patterns.is_empty() {
                    params.push(("filenames", state.filename_patterns.join(",")));
                }
                Query::Params(params)
            }
        };

        let url = self.router.build_url(&UrlParts {
            revision,
            interdiff_revision,
            query,
            anchor: options.anchor,
        });

        if options.update_url_only {
            self.history.replace(&url);
            return Ok(Navigation::UrlOnly(url));
        }

        self.history.push(&url);
        let route = self
            .router
            .parse_route(&url)
            .ok_or_else(|| NavError::Route(format!("unroutable URL {}", url)))?;
        Ok(Navigation::Route { url, route })
    }

    /// Fold the loaded revision into the URL the viewer was opened at, keeping
    /// its query string and hash verbatim. Adds no history entry.
    pub fn set_initial_url(
        &mut self,
        state: &NavigationState,
        query: &str,
        anchor: Option<&str>,
    ) -> Result<Navigation> {
        let mut options = NavigateOptions::default().query_string(query).url_only();
        options.anchor = anchor.map(str::to_string);
        self.navigate(state, options)
    }

    /// Step back in history and parse the entry landed on.
    pub fn back(&mut self) -> Option<RouteMatch> {
        let url = self.history.back()?;
        self.router.parse_route(&url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sync() -> UrlSynchronizer {
        UrlSynchronizer::new(Box::new(DiffRouter), Box::new(MemoryHistory::starting_at("")))
    }

    fn state(revision: u32) -> NavigationState {
        NavigationState {
            revision: Some(revision),
            ..NavigationState::default()
        }
    }

    fn with_patterns(mut state: NavigationState) -> NavigationState {
        state.filename_patterns = vec!["*.js".into(), "src/*".into()];
        state
    }

    #[test]
    fn initial_default_load() {
        let mut sync = sync();
        let nav = sync
            .set_initial_url(&state(1), "", Some("index_header"))
            .unwrap();
        assert_eq!(nav, Navigation::UrlOnly("1/#index_header".into()));
        assert_eq!(sync.current_url(), Some("1/#index_header"));
    }

    #[test]
    fn initial_query_is_kept_verbatim() {
        let mut sync = sync();
        let nav = sync
            .set_initial_url(&state(1), "?page=1", Some("index_header"))
            .unwrap();
        assert_eq!(nav.url(), "1/?page=1#index_header");

        let nav = sync
            .set_initial_url(&state(1), "?filenames=*.js,src/*", Some("index_header"))
            .unwrap();
        assert_eq!(nav.url(), "1/?filenames=*.js,src/*#index_header");
    }

    #[test]
    fn initial_interdiff() {
        let mut sync = sync();
        let mut st = state(2);
        st.interdiff_revision = Some(3);
        let nav = sync.set_initial_url(&st, "?page=2", Some("index_header")).unwrap();
        assert_eq!(nav.url(), "2-3/?page=2#index_header");
    }

    #[test]
    fn page_one_is_omitted() {
        let mut sync = sync();
        let nav = sync
            .navigate(&with_patterns(state(1)), NavigateOptions::default().page(1))
            .unwrap();
        assert_eq!(nav.url(), "1/?filenames=%2A.js%2Csrc%2F%2A");
        match nav {
            Navigation::Route { route, .. } => {
                assert_eq!(route.page, 1);
                assert_eq!(route.revision, 1);
                assert_eq!(route.interdiff_revision, None);
                assert_eq!(route.filename_patterns, vec!["*.js", "src/*"]);
            }
            other => panic!("expected a route, got {:?}", other),
        }
    }

    #[test]
    fn explicit_page_is_written() {
        let mut sync = sync();
        let nav = sync
            .navigate(&state(1), NavigateOptions::default().page(2))
            .unwrap();
        assert_eq!(nav.url(), "1/?page=2");
    }

    #[test]
    fn new_revision_resets_page() {
        let mut sync = sync();
        let mut st = with_patterns(state(1));
        st.page = 2;
        let nav = sync
            .navigate(&st, NavigateOptions::default().revision(2).interdiff(None))
            .unwrap();
        assert_eq!(nav.url(), "2/?filenames=%2A.js%2Csrc%2F%2A");
        if let Navigation::Route { route, .. } = nav {
            assert_eq!(route.page, 1);
        }
    }

    #[test]
    fn same_revision_keeps_page() {
        let mut sync = sync();
        let mut st = state(1);
        st.page = 2;
        let nav = sync
            .navigate(&st, NavigateOptions::default().revision(1))
            .unwrap();
        assert_eq!(nav.url(), "1/?page=2");
    }

    #[test]
    fn url_only_replaces_without_route() {
        let mut sync = sync();
        let mut st = with_patterns(state(1));
        st.page = 2;
        let nav = sync
            .navigate(
                &st,
                NavigateOptions::default()
                    .revision(2)
                    .interdiff(Some(3))
                    .url_only(),
            )
            .unwrap();
        assert_eq!(
            nav,
            Navigation::UrlOnly("2-3/?filenames=%2A.js%2Csrc%2F%2A".into())
        );
        assert_eq!(sync.back(), None);
    }

    #[test]
    fn anchor_goes_in_the_fragment() {
        let mut sync = sync();
        let nav = sync
            .navigate(&state(1), NavigateOptions::default().anchor("test"))
            .unwrap();
        assert_eq!(nav.url(), "1/#test");
        if let Navigation::Route { route, .. } = nav {
            assert_eq!(route.anchor.as_deref(), Some("test"));
        }
    }

    #[test]
    fn navigate_without_revision_fails() {
        let mut sync = sync();
        let err = sync
            .navigate(&NavigationState::default(), NavigateOptions::default())
            .unwrap_err();
        assert!(matches!(err, NavError::Route(_)));
    }

    #[test]
    fn back_returns_previous_route() {
        let mut sync = sync();
        sync.set_initial_url(&state(1), "", None).unwrap();
        sync.navigate(&state(1), NavigateOptions::default().revision(4))
            .unwrap();
        let route = sync.back().unwrap();
        assert_eq!(route.revision, 1);
        assert_eq!(sync.current_url(), Some("1/"));
    }

    #[test]
    fn history_push_truncates_forward_entries() {
        let mut history = MemoryHistory::new();
        assert!(history.is_empty());
        history.replace("1/");
        history.push("2/");
        history.push("3/");
        assert_eq!(history.back().as_deref(), Some("2/"));
        history.push("4/");
        assert_eq!(history.len(), 3);
        assert_eq!(history.back().as_deref(), Some("2/"));
        assert_eq!(history.back().as_deref(), Some("1/"));
        assert_eq!(history.back(), None);
        assert_eq!(history.current(), Some("1/"));
    }

    #[test]
    fn parse_route_variants() {
        let router = DiffRouter;
        let route = router.parse_route("2-5/?page=3&filenames=a,b%2Fc#1.2").unwrap();
        assert_eq!(route.revision, 2);
        assert_eq!(route.interdiff_revision, Some(5));
        assert_eq!(route.page, 3);
        assert_eq!(route.filename_patterns, vec!["a", "b/c"]);
        assert_eq!(route.anchor.as_deref(), Some("1.2"));

        let bare = router.parse_route("7").unwrap();
        assert_eq!(bare.revision, 7);
        assert_eq!(bare.page, 1);
        assert_eq!(bare.anchor, None);

        assert!(router.parse_route("").is_none());
        assert!(router.parse_route("abc/").is_none());
        assert!(router.parse_route("1-/").is_none());
        assert_eq!(router.parse_route("1/?page=zero").unwrap().page, 1);
    }

    #[test]
    fn split_location_parts() {
        assert_eq!(split_location("3/?page=2#x"), ("3/", "?page=2", Some("x")));
        assert_eq!(split_location("?filenames=a"), ("", "?filenames=a", None));
        assert_eq!(split_location("#"), ("", "", None));
        assert_eq!(parse_query("?page=4&filenames=a,b"), (4, vec!["a".into(), "b".into()]));
    }
}
