// Read-eval-print loop over a `Session`.

use std::io::{self, Write};

use mobilecoder_session::auth::AuthProvider;
use mobilecoder_session::command::{Command, PullTarget};
use mobilecoder_session::outcome::Outcome;
use mobilecoder_session::prompt::Prompter;
use mobilecoder_session::remote::RemoteStore;
use mobilecoder_session::Session;
use tracing::debug;

use crate::output::{self, OutputFormat, Style};

pub struct Repl<R, A> {
    session: Session<R, A>,
    format: OutputFormat,
    style: Style,
    prompt_name: String,
}

impl<R: RemoteStore, A: AuthProvider> Repl<R, A> {
    pub fn new(
        session: Session<R, A>,
        format: OutputFormat,
        style: Style,
        prompt_name: impl Into<String>,
    ) -> Self {
        Self { session, format, style, prompt_name: prompt_name.into() }
    }

    pub fn session(&self) -> &Session<R, A> {
        &self.session
    }

    /// Run until `quit` or end of input. Command failures are reported and
    /// never end the loop.
    pub async fn run<W: Write>(&mut self, prompter: &mut dyn Prompter, out: &mut W) -> io::Result<()> {
        loop {
            let prompt = output::prompt(&self.prompt_name, self.session.workspace_label(), self.style);
            let Some(line) = prompter.ask(&prompt) else {
                debug!("input closed");
                break;
            };

            let stale_before = self.session.needs_refresh();
            match self.session.execute(&line, prompter).await {
                Ok(Outcome::Quit) => {
                    if self.format == OutputFormat::Human {
                        writeln!(out, "Goodbye!")?;
                    } else {
                        output::write_outcome(out, self.format, &Outcome::Quit, self.style)?;
                    }
                    break;
                }
                Ok(outcome) => {
                    output::write_outcome(out, self.format, &outcome, self.style)?;
                    if let Outcome::Viewed { file_name, .. } = outcome {
                        self.offer_pull(file_name, prompter, out).await?;
                    }
                }
                Err(error) => output::print_session_error(self.format, &error),
            }

            if self.session.needs_refresh() && !stale_before {
                output::print_warning(
                    self.format,
                    "NEEDS_REFRESH",
                    "local data may be out of date; run `refresh` to resynchronize",
                );
            }
            out.flush()?;
        }
        Ok(())
    }

    async fn offer_pull<W: Write>(
        &mut self,
        file_name: String,
        prompter: &mut dyn Prompter,
        out: &mut W,
    ) -> io::Result<()> {
        if !prompter.confirm("\nWould you like to pull this file?") {
            return Ok(());
        }
        let pull = Command::PullFile(PullTarget::Named(file_name));
        match self.session.dispatch(pull, prompter).await {
            Ok(outcome) => output::write_outcome(out, self.format, &outcome, self.style),
            Err(error) => {
                output::print_session_error(self.format, &error);
                Ok(())
            }
        }
    }
}
