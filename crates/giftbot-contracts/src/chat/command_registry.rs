#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Commands whose whole remainder is one free-text argument.
pub(crate) const TEXT_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "search",
        action: "search",
    },
    CommandSpec {
        command: "image",
        action: "generate_image",
    },
    CommandSpec {
        command: "voice",
        action: "voice",
    },
    CommandSpec {
        command: "lang",
        action: "set_language",
    },
    CommandSpec {
        command: "size",
        action: "set_size",
    },
];

/// Commands taking a path followed by free text.
pub(crate) const PATH_AND_TEXT_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "edit",
    action: "edit_image",
}];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "history",
        action: "show_history",
    },
    CommandSpec {
        command: "clear",
        action: "clear_history",
    },
    CommandSpec {
        command: "catalog",
        action: "show_catalog",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/search <query>",
    "/image <prompt>",
    "/edit <path> <instruction>",
    "/voice <transcript>",
    "/lang en|bn",
    "/size <WxH|square|portrait|landscape>",
    "/history",
    "/clear",
    "/catalog",
    "/help",
    "/quit",
];
