use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReplCommand {
    Noop,
    Help,
    Shot(PathBuf),
    List,
    Delete(PathBuf),
    Process,
    Cancel,
    Reset,
    Status,
    Move(Direction),
    Toggle,
    Resize { width: f64, height: f64 },
    Quit,
    Invalid { command: String, reason: String },
    Unknown(String),
}

#[derive(Clone, Copy, Debug)]
struct CommandSpec {
    command: &'static str,
    usage: &'static str,
}

const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "shot",
        usage: "/shot <path>",
    },
    CommandSpec {
        command: "list",
        usage: "/list",
    },
    CommandSpec {
        command: "delete",
        usage: "/delete <path>",
    },
    CommandSpec {
        command: "process",
        usage: "/process",
    },
    CommandSpec {
        command: "cancel",
        usage: "/cancel",
    },
    CommandSpec {
        command: "reset",
        usage: "/reset",
    },
    CommandSpec {
        command: "status",
        usage: "/status",
    },
    CommandSpec {
        command: "left",
        usage: "/left",
    },
    CommandSpec {
        command: "right",
        usage: "/right",
    },
    CommandSpec {
        command: "up",
        usage: "/up",
    },
    CommandSpec {
        command: "down",
        usage: "/down",
    },
    CommandSpec {
        command: "toggle",
        usage: "/toggle",
    },
    CommandSpec {
        command: "resize",
        usage: "/resize <width> <height>",
    },
    CommandSpec {
        command: "help",
        usage: "/help",
    },
    CommandSpec {
        command: "quit",
        usage: "/quit",
    },
];

pub fn help_lines() -> Vec<&'static str> {
    COMMANDS.iter().map(|spec| spec.usage).collect()
}

fn usage_of(command: &str) -> &'static str {
    COMMANDS
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.usage)
        .unwrap_or("")
}

fn split_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts.into_iter().filter(|value| !value.is_empty()).collect(),
        Err(_) => arg.split_whitespace().map(str::to_string).collect(),
    }
}

fn single_path(command: &str, arg: &str) -> Result<PathBuf, ReplCommand> {
    let parts = split_args(arg);
    if parts.is_empty() {
        return Err(invalid(command, format!("usage: {}", usage_of(command))));
    }
    Ok(PathBuf::from(parts.join(" ")))
}

fn invalid(command: &str, reason: String) -> ReplCommand {
    ReplCommand::Invalid {
        command: command.to_string(),
        reason,
    }
}

fn parse_resize(arg: &str) -> ReplCommand {
    let parts = split_args(arg);
    let dims: Vec<f64> = parts
        .iter()
        .filter_map(|part| part.parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value > 0.0)
        .collect();
    match (parts.len(), dims.as_slice()) {
        (2, [width, height]) => ReplCommand::Resize {
            width: *width,
            height: *height,
        },
        _ => invalid("resize", format!("usage: {}", usage_of("resize"))),
    }
}

/// Parses one REPL line. Slash commands drive the session; a bare line is
/// taken as the path of a screenshot to queue.
pub fn parse_command(text: &str) -> ReplCommand {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ReplCommand::Noop;
    }

    let Some(slash_tail) = trimmed.strip_prefix('/') else {
        return match single_path("shot", trimmed) {
            Ok(path) => ReplCommand::Shot(path),
            Err(invalid) => invalid,
        };
    };

    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    let command = slash_tail[..command_len].to_ascii_lowercase();
    let arg = slash_tail[command_len..].trim();

    let path_command = |build: fn(PathBuf) -> ReplCommand| match single_path(&command, arg) {
        Ok(path) => build(path),
        Err(invalid) => invalid,
    };

    match command.as_str() {
        "shot" => path_command(ReplCommand::Shot),
        "delete" | "rm" => path_command(ReplCommand::Delete),
        "list" | "ls" => ReplCommand::List,
        "process" | "go" => ReplCommand::Process,
        "cancel" => ReplCommand::Cancel,
        "reset" => ReplCommand::Reset,
        "status" => ReplCommand::Status,
        "left" => ReplCommand::Move(Direction::Left),
        "right" => ReplCommand::Move(Direction::Right),
        "up" => ReplCommand::Move(Direction::Up),
        "down" => ReplCommand::Move(Direction::Down),
        "toggle" => ReplCommand::Toggle,
        "resize" => parse_resize(arg),
        "help" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        _ => ReplCommand::Unknown(command),
    }
}
