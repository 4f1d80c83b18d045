/// Navigation commands driven by the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    PreviousFile,
    NextFile,
    PreviousDiff,
    NextDiff,
    PreviousComment,
    NextComment,
    Recenter,
    CreateComment,
}

const BINDINGS: &[(&str, Command)] = &[
    ("aAKP<m", Command::PreviousFile),
    ("fFJN>", Command::NextFile),
    ("sSkp,", Command::PreviousDiff),
    ("dDjn.", Command::NextDiff),
    ("[x", Command::PreviousComment),
    ("]c", Command::NextComment),
    ("\r\n", Command::Recenter),
    ("rR", Command::CreateComment),
];

pub fn command_for_char(c: char) -> Option<Command> {
    BINDINGS
        .iter()
        .find(|(keys, _)| keys.contains(c))
        .map(|(_, command)| *command)
}

/// Keys bound to `command`, for help text.
pub fn keys_for(command: Command) -> &'static str {
    BINDINGS
        .iter()
        .find(|(_, c)| *c == command)
        .map(|(keys, _)| *keys)
        .unwrap_or("")
}
