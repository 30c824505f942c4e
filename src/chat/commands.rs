//! Slash command parsing for the support console.
//!
//! Input starting with `/` controls the session and is never sent to the model.

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Select a model by identifier or 1-based catalog index.
    Model(String),

    /// List the model catalog.
    Models,

    /// Select a ticket category by name, alias, or 1-based index.
    Category(String),

    /// List the ticket categories.
    Categories,

    /// Attach an image file to the next submission.
    Attach(String),

    /// Drop the pending attachment.
    Detach,

    /// Show the conversation so far.
    History,

    /// Start a new, empty session.
    New,

    /// Display session statistics (turn count, outcomes, current model, etc.).
    Stats,

    /// Show the current configuration.
    ShowConfig,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use supportintel::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/category billing").is_some());
/// assert!(parse_command("My laptop will not boot").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "model" => match argument {
            Some(model) => ChatCommand::Model(model.to_string()),
            None => ChatCommand::Invalid(
                "/model requires a model id or number (see /models)".to_string(),
            ),
        },
        "models" => ChatCommand::Models,
        "category" => match argument {
            Some(category) => ChatCommand::Category(category.to_string()),
            None => ChatCommand::Invalid(
                "/category requires a category name or number (see /categories)".to_string(),
            ),
        },
        "categories" => ChatCommand::Categories,
        "attach" => match argument {
            Some(path) => ChatCommand::Attach(unquote(path).to_string()),
            None => ChatCommand::Invalid("/attach requires an image path".to_string()),
        },
        "detach" => ChatCommand::Detach,
        "history" => ChatCommand::History,
        "new" | "clear" => ChatCommand::New,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "stats" | "status" => ChatCommand::Stats,
        "config" => ChatCommand::ShowConfig,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

/// Strips one pair of matching quotes, as left by drag-and-drop into a terminal.
fn unquote(path: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = path
            .strip_prefix(quote)
            .and_then(|p| p.strip_suffix(quote))
        {
            return inner;
        }
    }
    path
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /model <id|number>     Switch model (e.g., /model 2)
  /models                List available models
  /category <name|num>   Set the ticket category (e.g., /category security)
  /categories            List ticket categories
  /attach <path>         Attach a screenshot (jpg, png, gif, webp) to the next message
  /detach                Drop the pending attachment
  /history               Show the conversation so far
  /new                   Start a new session
  /stats                 Show session statistics
  /config                Show current configuration
  /help                  Show this help message
  /quit                  Exit the console"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_new() {
        assert_eq!(parse_command("/new"), Some(ChatCommand::New));
        assert_eq!(parse_command("/CLEAR"), Some(ChatCommand::New));
    }

    #[test]
    fn parse_model() {
        assert_eq!(
            parse_command("/model 2"),
            Some(ChatCommand::Model("2".to_string()))
        );
        assert_eq!(
            parse_command("/model   qwen/qwen-2.5-vl-72b-instruct:free  "),
            Some(ChatCommand::Model(
                "qwen/qwen-2.5-vl-72b-instruct:free".to_string()
            ))
        );
        assert!(matches!(
            parse_command("/model"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("requires")
        ));
        assert_eq!(parse_command("/models"), Some(ChatCommand::Models));
    }

    #[test]
    fn parse_category() {
        assert_eq!(
            parse_command("/category Billing & Account"),
            Some(ChatCommand::Category("Billing & Account".to_string()))
        );
        assert!(matches!(
            parse_command("/category"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("requires")
        ));
        assert_eq!(parse_command("/categories"), Some(ChatCommand::Categories));
    }

    #[test]
    fn parse_attach() {
        assert_eq!(
            parse_command("/attach screenshots/error dialog.png"),
            Some(ChatCommand::Attach("screenshots/error dialog.png".to_string()))
        );
        assert_eq!(
            parse_command("/attach '/tmp/My Screenshot.jpg'"),
            Some(ChatCommand::Attach("/tmp/My Screenshot.jpg".to_string()))
        );
        assert!(matches!(
            parse_command("/attach"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("requires")
        ));
        assert_eq!(parse_command("/detach"), Some(ChatCommand::Detach));
    }

    #[test]
    fn parse_stats_and_config() {
        assert_eq!(parse_command("/stats"), Some(ChatCommand::Stats));
        assert_eq!(parse_command("/config"), Some(ChatCommand::ShowConfig));
        assert_eq!(parse_command("/history"), Some(ChatCommand::History));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("/reboot now"),
            Some(ChatCommand::Invalid("Unknown command: /reboot".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("My router keeps dropping packets"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn help_text_not_empty() {
        let help = help_text();
        assert!(!help.is_empty());
        assert!(help.contains("/quit"));
        assert!(help.contains("/model"));
        assert!(help.contains("/category"));
        assert!(help.contains("/attach"));
    }
}
