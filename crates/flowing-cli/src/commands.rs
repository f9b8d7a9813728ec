//! Slash commands for interactive mode

pub const PROVIDERS: [&str; 3] = ["tongyi", "claude", "custom"];

/// Result of executing a slash command
pub enum CommandResult {
    /// Clear the conversation
    Clear,
    /// Show the last generated code
    ShowLast,
    /// Switch to another provider
    Switch(String),
    /// Show a message to the user (not sent to the model)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command. Returns `None` for ordinary input.
pub fn execute_command(input: &str, current_provider: &str) -> Option<CommandResult> {
    let input = input.trim();

    if !input.starts_with('/') {
        return None;
    }

    let parts: Vec<&str> = input[1..].splitn(2, ' ').collect();
    let command = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "last" | "l" => CommandResult::ShowLast,

        "clear" | "c" => CommandResult::Clear,

        "quit" | "exit" | "q" => CommandResult::Exit,

        "switch" | "s" => {
            if args.is_empty() {
                CommandResult::Message(format!(
                    "Current: {}\nUsage: /switch tongyi|claude|custom",
                    current_provider
                ))
            } else if PROVIDERS.contains(&args) {
                CommandResult::Switch(args.to_string())
            } else {
                CommandResult::Message(format!("Unknown provider: {}", args))
            }
        }

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?        Show this help message
  /last, /l            Show the last generated code
  /switch, /s <name>   Switch provider (tongyi, claude, custom)
  /clear, /c           Clear conversation history
  /quit, /exit, /q     Exit flowing

Anything else is sent to the model as a diagram description."#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_input_is_not_a_command() {
        assert!(execute_command("draw a flowchart", "tongyi").is_none());
        assert!(execute_command("", "tongyi").is_none());
    }

    #[test]
    fn test_quit_aliases() {
        for input in ["/quit", "/exit", "/q"] {
            assert!(matches!(
                execute_command(input, "tongyi"),
                Some(CommandResult::Exit)
            ));
        }
    }

    #[test]
    fn test_switch_with_valid_provider() {
        match execute_command("/switch claude", "tongyi") {
            Some(CommandResult::Switch(p)) => assert_eq!(p, "claude"),
            _ => panic!("expected switch"),
        }
    }

    #[test]
    fn test_switch_without_args_shows_current() {
        match execute_command("/switch", "tongyi") {
            Some(CommandResult::Message(msg)) => {
                assert!(msg.contains("Current: tongyi"));
                assert!(msg.contains("Usage"));
            }
            _ => panic!("expected message"),
        }
    }

    #[test]
    fn test_switch_rejects_unknown_provider() {
        match execute_command("/switch groq", "tongyi") {
            Some(CommandResult::Message(msg)) => assert!(msg.contains("Unknown provider")),
            _ => panic!("expected message"),
        }
    }

    #[test]
    fn test_unknown_command_is_reported() {
        match execute_command("/frobnicate", "tongyi") {
            Some(CommandResult::Unknown(cmd)) => assert_eq!(cmd, "frobnicate"),
            _ => panic!("expected unknown"),
        }
    }
}
