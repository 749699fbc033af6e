use codex_monitor_client::ApprovalDecision;
use codex_monitor_protocol::RequestId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    Message(String),
    Review(String),
    Command(UserCommand),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Help,
    Quit,
    NewThread,
    Resume(String),
    Use(String),
    List,
    /// Archive the given thread, or the active one.
    Archive(Option<String>),
    Interrupt,
    Answer {
        request_id: RequestId,
        decision: ApprovalDecision,
    },
    Limits,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    EmptyCommand,
    MissingArgument { name: &'static str },
    UnknownCommand { command: String },
}

impl ParseError {
    pub fn message(&self) -> String {
        match self {
            Self::EmptyCommand => "empty command after ':'".to_string(),
            Self::MissingArgument { name } => {
                format!("missing required argument: {name}")
            }
            Self::UnknownCommand { command } => format!("unknown command: {command}"),
        }
    }
}

pub fn parse_input(line: &str) -> Result<Option<InputAction>, ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed == "/review" || trimmed.starts_with("/review ") {
        return Ok(Some(InputAction::Review(trimmed.to_string())));
    }

    let Some(command_line) = trimmed.strip_prefix(':') else {
        return Ok(Some(InputAction::Message(trimmed.to_string())));
    };

    let mut parts = command_line.split_whitespace();
    let Some(command) = parts.next() else {
        return Err(ParseError::EmptyCommand);
    };

    let command = match command {
        "help" | "h" => UserCommand::Help,
        "quit" | "q" | "exit" => UserCommand::Quit,
        "new" => UserCommand::NewThread,
        "resume" => UserCommand::Resume(required(parts.next(), "thread-id")?),
        "use" => UserCommand::Use(required(parts.next(), "thread-id")?),
        "list" | "ls" => UserCommand::List,
        "archive" => UserCommand::Archive(parts.next().map(str::to_string)),
        "interrupt" | "stop" => UserCommand::Interrupt,
        "approve" => {
            let request_id = parse_request_id(&required(parts.next(), "request-id")?);
            let decision = match parts.next() {
                Some("session") => ApprovalDecision::AcceptForSession,
                _ => ApprovalDecision::Accept,
            };
            UserCommand::Answer {
                request_id,
                decision,
            }
        }
        "decline" => {
            let request_id = parse_request_id(&required(parts.next(), "request-id")?);
            let decision = match parts.next() {
                Some("cancel") => ApprovalDecision::Cancel,
                _ => ApprovalDecision::Decline,
            };
            UserCommand::Answer {
                request_id,
                decision,
            }
        }
        "limits" => UserCommand::Limits,
        _ => {
            return Err(ParseError::UnknownCommand {
                command: command.to_string(),
            });
        }
    };
    Ok(Some(InputAction::Command(command)))
}

fn required(value: Option<&str>, name: &'static str) -> Result<String, ParseError> {
    value
        .map(str::to_string)
        .ok_or(ParseError::MissingArgument { name })
}

/// Server request ids are usually integers; anything else is kept verbatim.
fn parse_request_id(raw: &str) -> RequestId {
    raw.parse::<i64>()
        .map(RequestId::Integer)
        .unwrap_or_else(|_| RequestId::String(raw.to_string()))
}
