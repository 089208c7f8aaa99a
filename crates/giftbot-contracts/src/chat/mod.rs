mod command_parser;
mod command_registry;
pub mod heuristic;
pub mod normalize;
mod templates;

pub use command_parser::{parse_command, ChatCommand};
pub use command_registry::CHAT_HELP_COMMANDS;
pub use heuristic::{
    recommend_categories, respond, respond_with_branch, speech_text, HeuristicBranch,
    HeuristicReply, DEFAULT_RECOMMENDED, MAX_RECOMMENDED,
};
pub use normalize::{
    normalize, trim_history, ChatTurn, ImageSize, Language, NormalizedRequest, RawInput,
    RequestKind, Role, SourceImage, HISTORY_LIMIT,
};
