use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadOptions {
    pub show_deleted: bool,
}

/// A launched load. Carries the epoch it was issued under so completions from
/// a discarded context can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub epoch: u64,
    pub seq: u64,
    pub file: usize,
    pub options: LoadOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadResult {
    Markup(String),
    /// Render from markup already held by the document.
    Existing,
    Failed(String),
}

/// A completed load whose turn to render has come.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ready {
    pub ticket: LoadTicket,
    pub result: LoadResult,
}

#[derive(Debug)]
struct InFlight {
    ticket: LoadTicket,
    result: Option<LoadResult>,
}

/// FIFO of per-file loads.
///
/// Up to `window` loads may be in flight at once, but results are released
/// for rendering strictly in the order the loads were enqueued, and nothing
/// new is launched until [`LoadQueue::advance`] is called after a render.
#[derive(Debug)]
pub struct LoadQueue {
    pending: VecDeque<(usize, LoadOptions)>,
    in_flight: VecDeque<InFlight>,
    epoch: u64,
    next_seq: u64,
    running: bool,
    window: usize,
}

impl Default for LoadQueue {
    fn default() -> Self {
        Self::new(1)
    }
}

impl LoadQueue {
    pub fn new(window: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            in_flight: VecDeque::new(),
            epoch: 0,
            next_seq: 0,
            running: false,
            window: window.max(1),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }

    pub fn enqueue(&mut self, file: usize, options: LoadOptions) {
        self.pending.push_back((file, options));
    }

    /// Begin processing. Returns the loads to launch now.
    pub fn start(&mut self) -> Vec<LoadTicket> {
        self.running = true;
        self.fill()
    }

    /// Launch whatever fits in the window after a render finished.
    pub fn advance(&mut self) -> Vec<LoadTicket> {
        self.fill()
    }

    /// Record a load's result. Returns the loads now ready to render, in order.
    /// Tickets from an older epoch are ignored.
    pub fn complete(&mut self, ticket: LoadTicket, result: LoadResult) -> Vec<Ready> {
        if ticket.epoch != self.epoch {
            tracing::debug!(
                file = ticket.file,
                epoch = ticket.epoch,
                current = self.epoch,
                "dropping stale load"
            );
            return Vec::new();
        }

        match self.in_flight.iter_mut().find(|f| f.ticket.seq == ticket.seq) {
            Some(slot) => slot.result = Some(result),
            None => {
                tracing::debug!(file = ticket.file, seq = ticket.seq, "unknown load ticket");
                return Vec::new();
            }
        }

        let mut ready = Vec::new();
        while self.in_flight.front().is_some_and(|f| f.result.is_some()) {
            if let Some(InFlight {
                ticket,
                result: Some(result),
            }) = self.in_flight.pop_front()
            {
                ready.push(Ready { ticket, result });
            }
        }
        ready
    }

    /// Discard queued and in-flight work and rotate to a new epoch.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.in_flight.clear();
        self.running = false;
        self.epoch += 1;
    }

    fn fill(&mut self) -> Vec<LoadTicket> {
        let mut launched = Vec::new();
        while self.running && self.in_flight.len() < self.window {
            let Some((file, options)) = self.pending.pop_front() else {
                break;
            };
            let ticket = LoadTicket {
                epoch: self.epoch,
                seq: self.next_seq,
                file,
                options,
            };
            self.next_seq += 1;
            self.in_flight.push_back(InFlight {
                ticket,
                result: None,
            });
            launched.push(ticket);
        }
        launched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markup(s: &str) -> LoadResult {
        LoadResult::Markup(s.to_string())
    }

    #[test]
    fn nothing_launches_before_start() {
        let mut queue = LoadQueue::new(1);
        queue.enqueue(0, LoadOptions::default());
        assert!(queue.advance().is_empty());
        assert_eq!(queue.start().len(), 1);
    }

    #[test]
    fn sequential_one_at_a_time() {
        let mut queue = LoadQueue::new(1);
        for file in 0..3 {
            queue.enqueue(file, LoadOptions::default());
        }

        let first = queue.start();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].file, 0);
        // The next load waits for the render step.
        assert!(queue.advance().is_empty());

        let ready = queue.complete(first[0], markup("a"));
        assert_eq!(ready.len(), 1);

        let second = queue.advance();
        assert_eq!(second[0].file, 1);
        queue.complete(second[0], LoadResult::Failed("500".into()));

        // A failure doesn't block the rest.
        let third = queue.advance();
        assert_eq!(third[0].file, 2);
        queue.complete(third[0], markup("c"));
        assert!(queue.advance().is_empty());
        assert!(queue.is_idle());
    }

    #[test]
    fn out_of_order_completion_releases_in_order() {
        let mut queue = LoadQueue::new(3);
        for file in 0..3 {
            queue.enqueue(file, LoadOptions::default());
        }
        let tickets = queue.start();
        assert_eq!(tickets.len(), 3);

        assert!(queue.complete(tickets[2], markup("c")).is_empty());
        assert!(queue.complete(tickets[1], markup("b")).is_empty());

        let ready = queue.complete(tickets[0], markup("a"));
        let files: Vec<usize> = ready.iter().map(|r| r.ticket.file).collect();
        assert_eq!(files, vec![0, 1, 2]);
    }

    #[test]
    fn clear_discards_stale_work() {
        let mut queue = LoadQueue::new(1);
        queue.enqueue(0, LoadOptions::default());
        queue.enqueue(1, LoadOptions::default());
        let old = queue.start();

        queue.clear();
        assert!(queue.is_idle());
        assert!(!queue.is_running());

        queue.enqueue(7, LoadOptions::default());
        let fresh = queue.start();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].file, 7);
        assert_ne!(fresh[0].epoch, old[0].epoch);

        // A late completion from the old context must not render.
        assert!(queue.complete(old[0], markup("old")).is_empty());

        let ready = queue.complete(fresh[0], markup("new"));
        assert_eq!(ready.len(), 1);
        // File 1 from the old context never runs.
        assert!(queue.advance().is_empty());
    }

    #[test]
    fn show_deleted_option_is_carried() {
        let mut queue = LoadQueue::default();
        queue.enqueue(4, LoadOptions { show_deleted: true });
        let tickets = queue.start();
        assert!(tickets[0].options.show_deleted);
    }
}
