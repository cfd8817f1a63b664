use std::io::{ self, Write };

use chrono::Local;
use log::info;
use tokio::io::{ AsyncBufRead, AsyncBufReadExt };

use crate::agent::{ ChatAgent, TurnEvent };
use crate::config::prompt::CLEAR_CONFIRMATION;
use crate::history::format_history_for_display;
use crate::models::chat::{ ChatMessage, Role };
use crate::session::{ ChatSession, TurnOutcome };

const PARTIAL_DISCARDED: &str = "[partial reply discarded]";

const HELP: &str =
    "Commands:\n  /clear    clear the chat history\n  /history  show the conversation\n  /help     show this help\n  /quit     exit\nEnd a line with \\ to continue on the next line.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Submit(String),
    Clear,
    History,
    Help,
    Quit,
}

pub fn parse_command(input: &str) -> Command {
    match input.trim() {
        "/clear" => Command::Clear,
        "/history" => Command::History,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        _ => Command::Submit(input.to_string()),
    }
}

fn is_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn label(message: &ChatMessage) -> String {
    let who = match message.role {
        Role::User => "You",
        Role::Model => "Assistant",
    };
    format!("[{}] {}:", message.timestamp.with_timezone(&Local).format("%H:%M"), who)
}

/// Terminal front end. Owns one session for its whole lifetime; a prompt is
/// only read again after the running turn has finished.
pub struct Repl<R, W> {
    agent: ChatAgent,
    session: ChatSession,
    input: R,
    output: W,
}

impl<R, W> Repl<R, W> where R: AsyncBufRead + Unpin, W: Write {
    pub fn new(agent: ChatAgent, input: R, output: W) -> Self {
        Self {
            agent,
            session: ChatSession::new(),
            input,
            output,
        }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn into_output(self) -> W {
        self.output
    }

    pub async fn run(&mut self) -> io::Result<()> {
        writeln!(self.output, "Dars-e-Nizami AI | Expert Scholarly Guidance (/help for commands)")?;
        if let Some(greeting) = self.session.conversation().last() {
            writeln!(self.output, "{} {}\n", label(greeting), greeting.content)?;
        }

        loop {
            write!(self.output, "> ")?;
            self.output.flush()?;
            let Some(text) = self.read_submission().await? else {
                break;
            };

            match parse_command(&text) {
                Command::Quit => {
                    break;
                }
                Command::Help => writeln!(self.output, "{}", HELP)?,
                Command::History => {
                    write!(self.output, "{}", format_history_for_display(self.session.conversation()))?;
                }
                Command::Clear => self.confirm_and_clear().await?,
                Command::Submit(text) => self.submit(&text).await?,
            }
        }
        info!("Terminal session ended");
        Ok(())
    }

    /// Reads one submission, joining lines that end with a backslash.
    /// Returns `None` at end of input.
    async fn read_submission(&mut self) -> io::Result<Option<String>> {
        let mut text = String::new();
        loop {
            let mut line = String::new();
            if self.input.read_line(&mut line).await? == 0 {
                return Ok(if text.is_empty() { None } else { Some(text) });
            }
            let line = line.trim_end_matches(['\n', '\r']);
            match line.strip_suffix('\\') {
                Some(head) => {
                    text.push_str(head);
                    text.push('\n');
                    write!(self.output, ". ")?;
                    self.output.flush()?;
                }
                None => {
                    text.push_str(line);
                    return Ok(Some(text));
                }
            }
        }
    }

    async fn confirm_and_clear(&mut self) -> io::Result<()> {
        write!(self.output, "{} [y/N] ", CLEAR_CONFIRMATION)?;
        self.output.flush()?;
        let mut answer = String::new();
        self.input.read_line(&mut answer).await?;
        if is_confirmation(&answer) {
            self.session.reset();
            if let Some(greeting) = self.session.conversation().last() {
                writeln!(self.output, "{} {}\n", label(greeting), greeting.content)?;
            }
        }
        Ok(())
    }

    async fn submit(&mut self, text: &str) -> io::Result<()> {
        let output = &mut self.output;
        let mut streamed = false;
        let outcome = self.agent.submit(&mut self.session, text, |event| {
            match event {
                TurnEvent::Started { placeholder, .. } => {
                    let _ = write!(output, "{} ", label(placeholder));
                }
                TurnEvent::Delta { delta, .. } => {
                    streamed = true;
                    let _ = write!(output, "{}", delta);
                }
            }
            let _ = output.flush();
        }).await;

        match outcome {
            TurnOutcome::Rejected => {}
            TurnOutcome::Completed { .. } => writeln!(self.output, "\n")?,
            TurnOutcome::Failed { message, .. } => {
                // The store keeps only the apology, so say what was dropped.
                if streamed {
                    writeln!(self.output, "\n{}", PARTIAL_DISCARDED)?;
                    writeln!(self.output, "{}\n", message)?;
                } else {
                    writeln!(self.output, "\n{}\n", message)?;
                }
            }
        }
        Ok(())
    }
}
