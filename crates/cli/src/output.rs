// Output rendering for the REPL.
//
// TTY → coloured human-readable text. Piped/redirected → one JSON object per
// outcome. `--json` forces JSON output regardless of terminal.

use std::io::{self, IsTerminal, Write};

use mobilecoder_session::outcome::Outcome;
use mobilecoder_session::SessionError;
use serde_json::Value;

use crate::help;

const ANSI_RED: &str = "\x1b[31m";
const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_PURPLE: &str = "\x1b[38;2;133;101;196m";
const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_UNDERLINE: &str = "\x1b[4m";
const ANSI_RESET: &str = "\x1b[0m";

/// Clears the screen and moves the cursor home.
pub const CLEAR_SEQUENCE: &str = "\x1b[2J\x1b[3J\x1b[H";

/// Output format for REPL responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text with colours.
    Human,
    /// Machine-readable JSON (one object per response).
    Json,
}

impl OutputFormat {
    /// Auto-detect format: JSON if `--json` was passed or stdout is not a TTY.
    pub fn detect(json_flag: bool) -> Self {
        if json_flag {
            return Self::Json;
        }
        Self::detect_from_terminal(io::stdout().is_terminal())
    }

    /// Testable variant that takes an explicit `is_tty` flag.
    pub fn detect_from_terminal(is_tty: bool) -> Self {
        if is_tty {
            Self::Human
        } else {
            Self::Json
        }
    }
}

/// ANSI styling that collapses to plain text when disabled.
#[derive(Debug, Clone, Copy)]
pub struct Style {
    enabled: bool,
}

impl Style {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("{code}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }

    pub fn green(&self, text: &str) -> String {
        self.paint(ANSI_GREEN, text)
    }

    pub fn yellow(&self, text: &str) -> String {
        self.paint(ANSI_YELLOW, text)
    }

    pub fn red(&self, text: &str) -> String {
        self.paint(ANSI_RED, text)
    }

    pub fn purple(&self, text: &str) -> String {
        self.paint(ANSI_PURPLE, text)
    }

    pub fn bold(&self, text: &str) -> String {
        self.paint(ANSI_BOLD, text)
    }

    pub fn underline(&self, text: &str) -> String {
        self.paint(ANSI_UNDERLINE, text)
    }
}

/// Human text for an outcome. `None` when nothing should be printed.
pub fn render_human(outcome: &Outcome, style: Style) -> Option<String> {
    let text = match outcome {
        Outcome::Nothing | Outcome::Quit => return None,
        Outcome::Clear => CLEAR_SEQUENCE.to_string(),
        Outcome::Help { all, state } => help::render(*state, *all),
        Outcome::Listing { entries } => {
            if entries.is_empty() {
                style.yellow("Empty directory.")
            } else {
                entries.iter().map(|e| format!("* {}", e.display)).collect::<Vec<_>>().join("\n")
            }
        }
        Outcome::SignedUp { email } => {
            style.green(&format!("Created profile for {email}. Log in with `login`."))
        }
        Outcome::LoggedIn { name, workspaces } => {
            style.green(&format!("Welcome, {name}! You have {workspaces} workspace(s)."))
        }
        Outcome::SignedOut => style.green("Sign out successful."),
        Outcome::Workspaces { names } => bullet_list(names, "Empty workspace collection.", style),
        Outcome::WorkspaceCreated { name } => {
            style.green(&format!("New workspace created with name: {name}"))
        }
        Outcome::WorkspaceDeleted { name, files } => {
            style.green(&format!("Workspace {name} and its {files} file(s) successfully deleted."))
        }
        Outcome::EnteredWorkspace { name, files } => {
            style.green(&format!("Entered workspace {name} ({files} file(s))."))
        }
        Outcome::LeftWorkspace { name } => format!("Left workspace {name}."),
        Outcome::Files { names } => bullet_list(names, "Empty file collection.", style),
        Outcome::Viewed { file_name, contents } => {
            let heading = style.bold(&style.underline(&format!("Viewing file: {file_name}")));
            format!("{heading}\n\n{contents}")
        }
        Outcome::FileAdded { file_name } => {
            style.green(&format!("Successfully added file: {file_name}"))
        }
        Outcome::FileOverwritten { file_name, .. } => {
            style.green(&format!("Successfully overwrote file: {file_name}"))
        }
        Outcome::Pulled { written, failed } => {
            let mut lines: Vec<String> = written
                .iter()
                .map(|path| {
                    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                    style.green(&format!("Created new file: {name} in current directory."))
                })
                .collect();
            lines.extend(failed.iter().map(|f| {
                style.red(&format!("Failed to create file {}: {}", f.file_name, f.error))
            }));
            if lines.is_empty() {
                lines.push(style.yellow("Empty file collection."));
            }
            lines.join("\n")
        }
        Outcome::FileDeleted { file_name } => {
            style.green(&format!("Successfully deleted file: {file_name}"))
        }
        Outcome::Refreshed { .. } => style.green("User data refreshed."),
        Outcome::WorkspaceRemoved { name } => style.yellow(&format!(
            "Refresh found workspace {name} to be deleted. Exiting workspace..."
        )),
        Outcome::Cancelled { reason } => style.yellow(&format!("{}.", capitalize(reason))),
    };
    Some(text)
}

fn bullet_list(names: &[String], empty: &str, style: Style) -> String {
    if names.is_empty() {
        return style.yellow(empty);
    }
    names.iter().map(|n| format!("- {n}")).collect::<Vec<_>>().join("\n")
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// JSON object for an outcome: the tagged outcome plus `"ok": true`.
pub fn render_json(outcome: &Outcome) -> Value {
    let mut value = serde_json::to_value(outcome).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert("ok".into(), Value::Bool(true));
        if let Outcome::Help { all, state } = outcome {
            map.insert("text".into(), Value::String(help::render(*state, *all)));
        }
    }
    value
}

/// Write an outcome to a provided writer.
pub fn write_outcome<W: Write>(
    writer: &mut W,
    format: OutputFormat,
    outcome: &Outcome,
    style: Style,
) -> io::Result<()> {
    match format {
        OutputFormat::Human => match render_human(outcome, style) {
            Some(text) if matches!(outcome, Outcome::Clear) => write!(writer, "{text}"),
            Some(text) => writeln!(writer, "{text}"),
            None => Ok(()),
        },
        OutputFormat::Json => {
            if matches!(outcome, Outcome::Nothing) {
                return Ok(());
            }
            serde_json::to_writer(&mut *writer, &render_json(outcome)).map_err(io::Error::other)?;
            writeln!(writer)
        }
    }
}

/// Write an error to stderr in the selected format.
pub fn print_error(format: OutputFormat, code: &str, message: &str) {
    print_diagnostic(format, "error", code, message, ANSI_RED);
}

/// Write a warning to stderr in the selected format.
pub fn print_warning(format: OutputFormat, code: &str, message: &str) {
    print_diagnostic(format, "warning", code, message, ANSI_YELLOW);
}

/// Report a failed command; consistency problems are warnings.
pub fn print_session_error(format: OutputFormat, error: &SessionError) {
    let message = error.to_string();
    if error.is_warning() {
        print_warning(format, error.code(), &message);
    } else {
        print_error(format, error.code(), &message);
    }
}

fn print_diagnostic(format: OutputFormat, label: &str, code: &str, message: &str, color: &str) {
    let mut err = io::stderr().lock();
    let line = render_diagnostic(format, label, code, message, io::stderr().is_terminal(), color);
    let _ = writeln!(err, "{line}");
}

fn render_diagnostic(
    format: OutputFormat,
    label: &str,
    code: &str,
    message: &str,
    is_tty: bool,
    color: &str,
) -> String {
    match format {
        OutputFormat::Human => render_human_stderr_line(label, message, is_tty, color),
        OutputFormat::Json => {
            let mut obj = serde_json::Map::new();
            obj.insert(label.to_string(), serde_json::json!({ "code": code, "message": message }));
            Value::Object(obj).to_string()
        }
    }
}

fn render_human_stderr_line(label: &str, message: &str, is_tty: bool, color: &str) -> String {
    if is_tty {
        format!("{color}{label}:{ANSI_RESET} {message}")
    } else {
        format!("{label}: {message}")
    }
}

/// Start-up banner.
pub fn banner(style: Style) -> String {
    let lines = [
        "<MC/>",
        "Welcome to the MobileCoder Desktop CLI!",
        "To get a list of available commands, enter 'help' or 'help -a' to view all commands.",
    ];
    let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let rule = "═".repeat(width + 6);
    let mut out = vec![style.purple(&format!("╔{rule}╗"))];
    for line in lines {
        let pad = width - line.chars().count();
        let left = pad / 2;
        let body = format!("   {}{line}{}   ", " ".repeat(left), " ".repeat(pad - left));
        out.push(format!("{}{}{}", style.purple("║"), style.purple(&body), style.purple("║")));
    }
    out.push(style.purple(&format!("╚{rule}╝")));
    out.join("\n")
}

/// Prompt text: `MobileCoder [<workspace>]> `.
pub fn prompt(name: &str, workspace: &str, style: Style) -> String {
    style.purple(&format!("{name} [{workspace}]> "))
}
