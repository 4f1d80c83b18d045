use crate::error::NavError;
use crate::keymap::Command;
use crate::queue::LoadTicket;
use crate::source::DiffContext;

#[derive(Debug, Clone)]
pub enum Action {
    Quit,
    Back,
    ScrollUp,
    ScrollDown,
    PageUp,
    PageDown,

    // Anchor navigation
    Command(Command),
    SelectAnchor(String),

    // Revision and page selection
    SelectRevision { base: u32, tip: u32 },
    NextPage,
    PreviousPage,

    // Diff display
    ShowDeleted,
    ToggleWhitespace,
    DismissBanner,

    // Loading
    ContextLoaded {
        epoch: u64,
        result: Box<Result<DiffContext, String>>,
    },
    FragmentLoaded {
        ticket: LoadTicket,
        result: Result<String, String>,
    },

    // Shareable URL
    YankUrl,
    OpenInBrowser,

    Error(String),
    None,
}

impl From<NavError> for Action {
    fn from(err: NavError) -> Self {
        Action::Error(err.to_string())
    }
}
