//! The diff navigation controller.
//!
//! Ties the anchor index, the rendered document, the load queue and the URL
//! synchronizer together. All mutation happens on the caller's task through
//! [`DiffViewer::update`]; network work is spawned and reports back as
//! [`Action`]s on the action channel.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::action::Action;
use crate::anchor::{AnchorIndex, AnchorKinds, Direction};
use crate::document::{Content, DiffDocument};
use crate::keymap::Command;
use crate::queue::{LoadOptions, LoadQueue, LoadResult, LoadTicket, Ready};
use crate::route::{
    parse_query, split_location, NavigateOptions, Navigation, NavigationState, RouteMatch,
    UrlSynchronizer,
};
use crate::source::{DiffContext, DiffSource, FragmentRequest, Pagination, RevisionQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerSettings {
    /// Rows kept above a selected anchor when scrolling to it.
    pub lead_in: usize,
    /// Fragment loads allowed in flight at once.
    pub max_in_flight: usize,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            lead_in: 3,
            max_in_flight: 1,
        }
    }
}

/// The highlighted region: the block enclosing the selected anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlight {
    pub file: usize,
    pub block: Option<usize>,
    pub row: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentDraft {
    pub filediff_id: u64,
    pub filename: String,
    pub first_line: u32,
    pub last_line: u32,
}

#[derive(Debug)]
pub struct DiffViewer {
    state: NavigationState,
    pagination: Pagination,
    latest_revision: u32,
    anchors: AnchorIndex,
    document: DiffDocument,
    queue: LoadQueue,
    sync: UrlSynchronizer,
    source: Arc<dyn DiffSource>,
    action_tx: mpsc::UnboundedSender<Action>,
    settings: ViewerSettings,
    /// Query and hash of the URL we were opened at, folded in once the first
    /// revision is known.
    initial: Option<(String, Option<String>)>,
    /// Anchor to select as soon as it gets registered.
    start_anchor: Option<String>,
    highlighted: Option<Highlight>,
    scroll_top: usize,
    banner: Option<String>,
    comment_draft: Option<CommentDraft>,
    show_whitespace_chunks: bool,
    pub loading: bool,
    pub error: Option<String>,
}

impl DiffViewer {
    pub fn new(
        source: Arc<dyn DiffSource>,
        sync: UrlSynchronizer,
        action_tx: mpsc::UnboundedSender<Action>,
        settings: ViewerSettings,
    ) -> Self {
        Self {
            state: NavigationState::default(),
            pagination: Pagination::default(),
            latest_revision: 0,
            anchors: AnchorIndex::new(),
            document: DiffDocument::new(),
            queue: LoadQueue::new(settings.max_in_flight),
            sync,
            source,
            action_tx,
            settings,
            initial: None,
            start_anchor: None,
            highlighted: None,
            scroll_top: 0,
            banner: None,
            comment_draft: None,
            show_whitespace_chunks: false,
            loading: false,
            error: None,
        }
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn latest_revision(&self) -> u32 {
        self.latest_revision
    }

    pub fn anchors(&self) -> &AnchorIndex {
        &self.anchors
    }

    pub fn document(&self) -> &DiffDocument {
        &self.document
    }

    pub fn highlighted(&self) -> Option<Highlight> {
        self.highlighted
    }

    pub fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn comment_draft(&self) -> Option<&CommentDraft> {
        self.comment_draft.as_ref()
    }

    pub fn shows_whitespace_chunks(&self) -> bool {
        self.show_whitespace_chunks
    }

    pub fn current_url(&self) -> Option<&str> {
        self.sync.current_url()
    }

    /// Absolute URL for the current state, suitable for sharing.
    pub fn web_url(&self) -> Option<String> {
        self.current_url().map(|route| self.source.web_url(route))
    }

    /// True once the context is loaded and every queued file has rendered.
    pub fn is_settled(&self) -> bool {
        !self.loading && self.queue.is_idle()
    }

    /// Start viewing at `location`, a diff viewer URL relative to the review
    /// request's diff root. It may omit the revision (`""`, `"?page=2"`); the
    /// URL is normalised once the revision is known.
    pub fn open(&mut self, location: &str) {
        let (path, query, hash) = split_location(location);
        self.initial = Some((query.to_string(), hash.map(str::to_string)));
        self.start_anchor = hash.map(str::to_string);

        let request = match self.sync.parse(location).filter(|_| !path.is_empty()) {
            Some(route) => route.query(),
            None => {
                let (page, filename_patterns) = parse_query(query);
                RevisionQuery {
                    revision: None,
                    interdiff_revision: None,
                    page,
                    filename_patterns,
                }
            }
        };
        self.spawn_load_context(request);
    }

    pub fn update(&mut self, action: Action) {
        if self.error.is_some() && !matches!(action, Action::FragmentLoaded { .. }) {
            self.error = None;
        }

        match action {
            Action::Command(command) => {
                self.run_command(command);
            }
            Action::SelectAnchor(name) => {
                self.select_anchor_by_name(&name, true);
            }
            Action::SelectRevision { base, tip } => self.select_revision(base, tip),
            Action::NextPage => {
                if self.state.page < self.pagination.pages {
                    self.select_page(self.state.page + 1);
                }
            }
            Action::PreviousPage => {
                if self.state.page > 1 {
                    self.select_page(self.state.page - 1);
                }
            }
            Action::ShowDeleted => {
                if let Some(file) = self.anchors.selected_anchor().map(|a| a.file) {
                    self.show_deleted(file);
                }
            }
            Action::ToggleWhitespace => self.toggle_whitespace_only_chunks(),
            Action::DismissBanner => self.dismiss_comment(),
            Action::Back => {
                self.go_back();
            }
            Action::ScrollUp => self.scroll_by(-1),
            Action::ScrollDown => self.scroll_by(1),
            Action::PageUp => self.scroll_by(-20),
            Action::PageDown => self.scroll_by(20),
            Action::ContextLoaded { epoch, result } => self.on_context_loaded(epoch, *result),
            Action::FragmentLoaded { ticket, result } => self.on_fragment_loaded(ticket, result),
            Action::Error(msg) => {
                self.loading = false;
                self.error = Some(msg);
            }
            Action::Quit | Action::YankUrl | Action::OpenInBrowser | Action::None => {}
        }
    }

    pub fn run_command(&mut self, command: Command) -> bool {
        match command {
            Command::PreviousFile => self.select_previous_file(),
            Command::NextFile => self.select_next_file(),
            Command::PreviousDiff => self.select_previous_diff(),
            Command::NextDiff => self.select_next_diff(),
            Command::PreviousComment => self.select_previous_comment(),
            Command::NextComment => self.select_next_comment(),
            Command::Recenter => self.recenter_selected(),
            Command::CreateComment => self.create_comment(),
        }
    }

    // Anchor selection

    /// Select the anchor at `index`. Fails if there is no such anchor or it is
    /// hidden. With `scroll`, the URL's hash follows the anchor and the view
    /// scrolls to it.
    pub fn select_anchor(&mut self, index: usize, scroll: bool) -> bool {
        let Some(anchor) = self.anchors.get(index) else {
            return false;
        };
        if anchor.hidden {
            return false;
        }
        let name = anchor.name.clone();
        let top = self.document.anchor_top(anchor);

        if scroll {
            let options = NavigateOptions::default().anchor(name.clone()).url_only();
            match self.sync.navigate(&self.state, options) {
                Ok(_) => self.state.anchor_name = Some(name),
                Err(e) => tracing::debug!(error = %e, "anchor URL not updated"),
            }
            self.scroll_top = top.saturating_sub(self.settings.lead_in + self.banner_height());
        }

        self.highlight(index);
        self.anchors.set_selected(index);
        true
    }

    pub fn select_anchor_by_name(&mut self, name: &str, scroll: bool) -> bool {
        match self.anchors.position(name) {
            Some(index) => self.select_anchor(index, scroll),
            None => false,
        }
    }

    pub fn select_previous_file(&mut self) -> bool {
        self.select_next(Direction::Backward, AnchorKinds::FILE)
    }

    pub fn select_next_file(&mut self) -> bool {
        self.select_next(Direction::Forward, AnchorKinds::FILE)
    }

    pub fn select_previous_diff(&mut self) -> bool {
        self.select_next(Direction::Backward, AnchorKinds::CHUNK | AnchorKinds::FILE)
    }

    pub fn select_next_diff(&mut self) -> bool {
        self.select_next(Direction::Forward, AnchorKinds::CHUNK | AnchorKinds::FILE)
    }

    pub fn select_previous_comment(&mut self) -> bool {
        self.select_next(Direction::Backward, AnchorKinds::COMMENT)
    }

    pub fn select_next_comment(&mut self) -> bool {
        self.select_next(Direction::Forward, AnchorKinds::COMMENT)
    }

    /// Re-select the current anchor to redo its highlight and scroll.
    pub fn recenter_selected(&mut self) -> bool {
        match self.anchors.selected() {
            Some(index) => self.select_anchor(index, true),
            None => false,
        }
    }

    fn select_next(&mut self, direction: Direction, kinds: AnchorKinds) -> bool {
        match self.anchors.find_next(direction, kinds) {
            Some(index) => self.select_anchor(index, true),
            None => false,
        }
    }

    fn highlight(&mut self, index: usize) {
        self.highlighted = self.anchors.get(index).map(|a| Highlight {
            file: a.file,
            block: a.block,
            row: a.row,
        });
    }

    fn banner_height(&self) -> usize {
        usize::from(self.banner.is_some())
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let max = self.document.height().saturating_sub(1);
        self.scroll_top = self.scroll_top.saturating_add_signed(delta).min(max);
    }

    // Diff actions

    /// Start a comment on the lines of the highlighted chunk.
    pub fn create_comment(&mut self) -> bool {
        let Some(highlight) = self.highlighted else {
            return false;
        };
        let Some(container) = self.document.get(highlight.file) else {
            return false;
        };
        let Some((first_line, last_line)) = container
            .fragment()
            .zip(highlight.block)
            .and_then(|(fragment, block)| fragment.block_lines(block))
        else {
            return false;
        };

        let draft = CommentDraft {
            filediff_id: container.entry.filediff_id,
            filename: container.entry.filename.clone(),
            first_line,
            last_line,
        };
        self.banner = Some(if first_line == last_line {
            format!("Commenting on {} line {}", draft.filename, first_line)
        } else {
            format!(
                "Commenting on {} lines {}-{}",
                draft.filename, first_line, last_line
            )
        });
        self.comment_draft = Some(draft);
        true
    }

    pub fn dismiss_comment(&mut self) {
        self.comment_draft = None;
        self.banner = None;
    }

    pub fn toggle_whitespace_only_chunks(&mut self) {
        self.show_whitespace_chunks = !self.show_whitespace_chunks;
        self.document.toggle_whitespace_dimming();
        let toggled = self.anchors.toggle_whitespace_dimming();
        tracing::debug!(toggled, "toggled whitespace-only chunks");
    }

    /// Reload a deleted file with its deleted content shown.
    pub fn show_deleted(&mut self, file: usize) -> bool {
        if !self.document.get(file).is_some_and(|c| c.entry.deleted) {
            return false;
        }
        self.queue.enqueue(file, LoadOptions { show_deleted: true });
        let tickets = self.queue.start();
        self.pump(tickets);
        true
    }

    // Revision and page navigation

    /// Select a revision range. A `base` of 0 means the single revision `tip`.
    /// The page resets to 1.
    pub fn select_revision(&mut self, base: u32, tip: u32) {
        let (revision, interdiff) = if base == 0 {
            (tip, None)
        } else {
            (base, Some(tip))
        };
        self.navigate(
            NavigateOptions::default()
                .revision(revision)
                .interdiff(interdiff),
        );
    }

    pub fn select_page(&mut self, page: u32) {
        self.scroll_top = 0;
        self.navigate(NavigateOptions::default().page(page));
    }

    pub fn navigate(&mut self, options: NavigateOptions) {
        match self.sync.navigate(&self.state, options) {
            Ok(Navigation::Route { route, .. }) => self.load_diff_revision(route),
            Ok(Navigation::UrlOnly(_)) => {}
            Err(e) => self.update(Action::from(e)),
        }
    }

    /// Step back in history. Reloads when the revision range, page or filter
    /// differ; otherwise just reselects the anchor.
    pub fn go_back(&mut self) -> bool {
        let Some(route) = self.sync.back() else {
            return false;
        };
        let same_view = self
            .state
            .same_range(route.revision, route.interdiff_revision)
            && self.state.page == route.page
            && self.state.filename_patterns == route.filename_patterns;

        if same_view {
            if let Some(anchor) = &route.anchor {
                self.select_anchor_by_name(anchor, true);
            }
            self.state.anchor_name = route.anchor;
        } else {
            self.load_diff_revision(route);
        }
        true
    }

    /// Switch to a new revision/page context, discarding the current one.
    pub fn load_diff_revision(&mut self, route: RouteMatch) {
        self.queue.clear();
        self.anchors.reset();
        self.document.clear();
        self.highlighted = None;
        self.scroll_top = 0;
        self.initial = None;

        self.state.revision = Some(route.revision);
        self.state.interdiff_revision = route.interdiff_revision;
        self.state.page = route.page;
        self.state.filename_patterns = route.filename_patterns.clone();
        self.state.anchor_name = route.anchor.clone();
        self.start_anchor = route.anchor.clone();

        self.spawn_load_context(route.query());
    }

    // Loading

    fn spawn_load_context(&mut self, query: RevisionQuery) {
        self.loading = true;
        let epoch = self.queue.epoch();
        let tx = self.action_tx.clone();
        let source = Arc::clone(&self.source);
        tokio::spawn(async move {
            let result = source
                .load_context(&query)
                .await
                .map_err(|e| e.to_string());
            tx.send(Action::ContextLoaded {
                epoch,
                result: Box::new(result),
            })
            .ok();
        });
    }

    fn on_context_loaded(&mut self, epoch: u64, result: Result<DiffContext, String>) {
        if epoch != self.queue.epoch() {
            tracing::debug!(epoch, "dropping stale diff context");
            return;
        }
        self.loading = false;

        let context = match result {
            Ok(context) => context,
            Err(msg) => {
                tracing::warn!(error = %msg, "failed to load diff context");
                self.error = Some(msg);
                return;
            }
        };

        self.queue.clear();
        self.anchors.reset();
        self.highlighted = None;

        self.state.revision = Some(context.revision);
        self.state.interdiff_revision = context.interdiff_revision;
        self.state.page = context.pagination.current_page;
        self.state.filename_patterns = context.filename_patterns;
        self.pagination = context.pagination;
        self.latest_revision = context.latest_revision;

        if let Some((query, hash)) = self.initial.take() {
            if let Err(e) = self
                .sync
                .set_initial_url(&self.state, &query, hash.as_deref())
            {
                tracing::warn!(error = %e, "could not normalise initial URL");
            }
        }

        tracing::debug!(
            source = self.source.name(),
            revision = context.revision,
            files = context.files.len(),
            "populating diff files"
        );
        self.document.reset(context.files);
        for file in 0..self.document.len() {
            self.queue.enqueue(file, LoadOptions::default());
        }
        let tickets = self.queue.start();
        self.pump(tickets);
    }

    fn on_fragment_loaded(&mut self, ticket: LoadTicket, result: Result<String, String>) {
        let result = match result {
            Ok(markup) => LoadResult::Markup(markup),
            Err(msg) => LoadResult::Failed(msg),
        };
        let ready = self.queue.complete(ticket, result);
        if ready.is_empty() {
            return;
        }
        for done in ready {
            self.render_ready(done);
        }
        let tickets = self.queue.advance();
        self.pump(tickets);
    }

    /// Launch loads. Files whose markup is already present render straight
    /// away, still in queue order.
    fn pump(&mut self, mut tickets: Vec<LoadTicket>) {
        while !tickets.is_empty() {
            let mut ready: Vec<Ready> = Vec::new();
            for ticket in tickets.drain(..) {
                let has_markup = self
                    .document
                    .get(ticket.file)
                    .is_some_and(|c| c.has_markup());
                if has_markup && !ticket.options.show_deleted {
                    ready.extend(self.queue.complete(ticket, LoadResult::Existing));
                } else {
                    self.spawn_fetch(ticket);
                }
            }
            if ready.is_empty() {
                break;
            }
            for done in ready {
                self.render_ready(done);
            }
            tickets = self.queue.advance();
        }

        if self.queue.is_idle() {
            if let Some(name) = self.start_anchor.take() {
                tracing::debug!(anchor = %name, "start anchor never appeared");
            }
        }
    }

    fn spawn_fetch(&self, ticket: LoadTicket) {
        let (Some(revision), Some(container)) =
            (self.state.revision, self.document.get(ticket.file))
        else {
            return;
        };
        let request = FragmentRequest {
            revision,
            interdiff_revision: self.state.interdiff_revision,
            entry: container.entry.clone(),
            show_deleted: ticket.options.show_deleted,
        };
        let tx = self.action_tx.clone();
        let source = Arc::clone(&self.source);
        tokio::spawn(async move {
            let result = source
                .fetch_fragment(&request)
                .await
                .map_err(|e| e.to_string());
            tx.send(Action::FragmentLoaded { ticket, result }).ok();
        });
    }

    fn render_ready(&mut self, ready: Ready) {
        let Ready { ticket, result } = ready;
        let file = ticket.file;
        let Some(element) = self.document.get(file).map(|c| c.entry.element_name()) else {
            return;
        };

        let markup = match result {
            LoadResult::Markup(markup) => Some(markup),
            LoadResult::Existing => None,
            LoadResult::Failed(msg) => {
                tracing::warn!(file = %element, error = %msg, "failed to load diff");
                if ticket.options.show_deleted {
                    self.error = Some(msg);
                } else {
                    self.document.fail(file, msg);
                }
                return;
            }
        };

        // A `file<id>,<line>` bookmark gets an anchor on that line if the
        // markup didn't carry one.
        let line_bookmark = self
            .start_anchor
            .as_deref()
            .filter(|name| self.anchors.position(name).is_none())
            .and_then(parse_line_bookmark)
            .filter(|(target, _, _)| *target == element.as_str())
            .map(|(_, name, line)| (name.to_string(), line));

        // Freshly parsed markup carries the server's dimming.
        let parsed = markup.is_some()
            || self
                .document
                .get(file)
                .is_some_and(|c| matches!(c.content, Content::Preloaded(_)));

        let anchors = {
            let Some(fragment) = self.document.render(file, markup.as_deref()) else {
                return;
            };
            if parsed && self.show_whitespace_chunks {
                fragment.toggle_whitespace_dimming();
            }
            if let Some((name, line)) = &line_bookmark {
                if !fragment.anchor_at_line(name, *line) {
                    tracing::debug!(anchor = %name, "bookmarked line not in diff");
                }
            }
            fragment.anchors_for(file)
        };

        let registered = self.anchors.register(file, anchors);
        if let Some(first) = registered.first_selected {
            self.highlight(first);
        }

        if let Some(name) = self.start_anchor.clone() {
            if self.select_anchor_by_name(&name, true) {
                self.start_anchor = None;
            }
        }
    }
}

/// Split `file200,101` into (`file200`, whole name, 101).
fn parse_line_bookmark(name: &str) -> Option<(&str, &str, u32)> {
    let (element, line) = name.split_once(',')?;
    Some((element, name, line.parse().ok()?))
}
