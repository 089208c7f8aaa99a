use super::command_registry::{
    CommandSpec, NO_ARG_COMMANDS, PATH_AND_TEXT_COMMANDS, TEXT_ARG_COMMANDS,
};

/// One line typed into the chat REPL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCommand {
    pub action: String,
    pub text: Option<String>,
    pub path: Option<String>,
}

impl ChatCommand {
    fn new(action: &str) -> Self {
        Self {
            action: action.to_string(),
            text: None,
            path: None,
        }
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

/// Split `<path> <text...>`, honouring shell quoting for the path.
fn split_path_and_text(arg: &str) -> (Option<String>, Option<String>) {
    let parts = match shell_words::split(arg) {
        Ok(parts) => parts,
        Err(_) => arg.split_whitespace().map(str::to_string).collect(),
    };
    let mut parts = parts.into_iter().filter(|value| !value.is_empty());
    let path = parts.next();
    let rest = parts.collect::<Vec<String>>().join(" ");
    let text = if rest.trim().is_empty() {
        None
    } else {
        Some(rest)
    };
    (path, text)
}

pub fn parse_command(text: &str) -> ChatCommand {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return ChatCommand::new("noop");
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, TEXT_ARG_COMMANDS) {
                let mut parsed = ChatCommand::new(action);
                if !arg.is_empty() {
                    parsed.text = Some(arg.to_string());
                }
                return parsed;
            }

            if let Some(action) = find_action(&command, PATH_AND_TEXT_COMMANDS) {
                let (path, instruction) = split_path_and_text(arg);
                let mut parsed = ChatCommand::new(action);
                parsed.path = path;
                parsed.text = instruction;
                return parsed;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return ChatCommand::new(action);
            }

            let mut parsed = ChatCommand::new("unknown");
            parsed.text = Some(command);
            return parsed;
        }
    }

    let mut parsed = ChatCommand::new("chat");
    parsed.text = Some(raw_trimmed.to_string());
    parsed
}

#[cfg(test)]
mod tests {
    use super::parse_command;

    #[test]
    fn plain_text_is_a_chat_message() {
        let parsed = parse_command("  any robots under 3000?  ");
        assert_eq!(parsed.action, "chat");
        assert_eq!(parsed.text.as_deref(), Some("any robots under 3000?"));
    }

    #[test]
    fn blank_line_is_noop() {
        assert_eq!(parse_command("   ").action, "noop");
    }

    #[test]
    fn text_commands_keep_the_remainder() {
        let search = parse_command("/search soft toys for a baby");
        assert_eq!(search.action, "search");
        assert_eq!(search.text.as_deref(), Some("soft toys for a baby"));

        let image = parse_command("/IMAGE a dragon kite");
        assert_eq!(image.action, "generate_image");
        assert_eq!(image.text.as_deref(), Some("a dragon kite"));

        let lang = parse_command("/lang bn");
        assert_eq!(lang.action, "set_language");
        assert_eq!(lang.text.as_deref(), Some("bn"));

        assert_eq!(parse_command("/search").text, None);
    }

    #[test]
    fn edit_accepts_quoted_paths() {
        let edit = parse_command("/edit \"/tmp/my toy.png\" make it blue");
        assert_eq!(edit.action, "edit_image");
        assert_eq!(edit.path.as_deref(), Some("/tmp/my toy.png"));
        assert_eq!(edit.text.as_deref(), Some("make it blue"));

        let bare = parse_command("/edit toy.png");
        assert_eq!(bare.path.as_deref(), Some("toy.png"));
        assert_eq!(bare.text, None);
    }

    #[test]
    fn no_arg_and_unknown_commands() {
        assert_eq!(parse_command("/exit").action, "quit");
        assert_eq!(parse_command("/history").action, "show_history");
        let unknown = parse_command("/dance now");
        assert_eq!(unknown.action, "unknown");
        assert_eq!(unknown.text.as_deref(), Some("dance"));
    }
}
