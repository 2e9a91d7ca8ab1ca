// Line-based terminal input shared by the REPL loop and in-command prompts.

use std::io::{self, BufRead, BufReader, IsTerminal, Stdin, Write};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use mobilecoder_session::prompt::Prompter;

use crate::output::OutputFormat;

/// Reads answers from `input`, writing prompts to `output`.
pub struct Terminal<R, W> {
    input: R,
    output: W,
    /// Read secrets from the controlling terminal with echo off.
    hide_secrets: bool,
}

impl Terminal<BufReader<Stdin>, Box<dyn Write + Send>> {
    /// Standard input, with prompts on stdout. JSON mode keeps stdout for
    /// responses only, so prompts go to stderr there.
    pub fn stdio(format: OutputFormat) -> Self {
        let output: Box<dyn Write + Send> = match format {
            OutputFormat::Human => Box::new(io::stdout()),
            OutputFormat::Json => Box::new(io::stderr()),
        };
        let mut terminal = Self::new(BufReader::new(io::stdin()), output);
        terminal.hide_secrets = io::stdin().is_terminal();
        terminal
    }
}

impl<R: BufRead, W: Write> Terminal<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output, hide_secrets: false }
    }

    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}

impl<R: BufRead + Send, W: Write + Send> Prompter for Terminal<R, W> {
    fn ask(&mut self, prompt: &str) -> Option<String> {
        let _ = write!(self.output, "{prompt}");
        let _ = self.output.flush();
        self.read_line()
    }

    fn ask_secret(&mut self, prompt: &str) -> Option<String> {
        if !self.hide_secrets {
            return self.ask(prompt);
        }
        let _ = write!(self.output, "{prompt}");
        let _ = self.output.flush();
        let answer = match read_hidden_line() {
            Ok(answer) => answer,
            Err(_) => return self.read_line(),
        };
        let _ = writeln!(self.output);
        answer
    }
}

/// What a key press does to a secret being typed.
#[derive(Debug, PartialEq, Eq)]
enum SecretKey {
    Edited,
    Submit,
    Abort,
}

fn apply_secret_key(line: &mut String, key: &KeyEvent) -> SecretKey {
    if key.kind != KeyEventKind::Press {
        return SecretKey::Edited;
    }
    match key.code {
        KeyCode::Enter => SecretKey::Submit,
        KeyCode::Char('c' | 'd') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            SecretKey::Abort
        }
        KeyCode::Char(c) => {
            line.push(c);
            SecretKey::Edited
        }
        KeyCode::Backspace => {
            line.pop();
            SecretKey::Edited
        }
        _ => SecretKey::Edited,
    }
}

struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// One line from the terminal with echo off. `None` on Ctrl-C / Ctrl-D.
fn read_hidden_line() -> io::Result<Option<String>> {
    let _raw = RawMode::enable()?;
    let mut line = String::new();
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        match apply_secret_key(&mut line, &key) {
            SecretKey::Edited => {}
            SecretKey::Submit => return Ok(Some(line)),
            SecretKey::Abort => return Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn ask_writes_prompt_and_strips_line_ending() {
        let mut out = Vec::new();
        let mut terminal = Terminal::new(Cursor::new("a@b.com\r\nsecret1\n"), &mut out);
        assert_eq!(terminal.ask("Email: ").as_deref(), Some("a@b.com"));
        assert_eq!(terminal.ask_secret("Password: ").as_deref(), Some("secret1"));
        assert_eq!(terminal.ask("> "), None, "end of input");
        drop(terminal);
        assert_eq!(String::from_utf8(out).unwrap(), "Email: Password: > ");
    }

    #[test]
    fn confirm_uses_strict_yes() {
        let mut out = Vec::new();
        let mut terminal = Terminal::new(Cursor::new("yes\nsure\n"), &mut out);
        assert!(terminal.confirm("Continue?"));
        assert!(!terminal.confirm("Continue?"));
        drop(terminal);
        assert!(String::from_utf8(out).unwrap().contains("Continue? [y/n]: "));
    }

    #[test]
    fn secret_keys_edit_submit_and_abort() {
        let press = |code| KeyEvent::new(code, KeyModifiers::NONE);
        let mut line = String::new();
        for c in "pass".chars() {
            assert_eq!(apply_secret_key(&mut line, &press(KeyCode::Char(c))), SecretKey::Edited);
        }
        apply_secret_key(&mut line, &press(KeyCode::Backspace));
        apply_secret_key(&mut line, &press(KeyCode::Char('t')));
        assert_eq!(line, "past");
        assert_eq!(apply_secret_key(&mut line, &press(KeyCode::Enter)), SecretKey::Submit);

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(apply_secret_key(&mut line, &ctrl_c), SecretKey::Abort);
        assert_eq!(line, "past");
    }

    #[test]
    fn key_releases_are_ignored() {
        let mut release = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        let mut line = String::new();
        assert_eq!(apply_secret_key(&mut line, &release), SecretKey::Edited);
        assert!(line.is_empty());
    }
}
