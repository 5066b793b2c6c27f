//! Interactive chat loop
//!
//! Reads a line, handles special commands, otherwise runs a turn while a
//! printer drains the turn's events to the terminal. The chat is saved
//! after every turn.

use std::io::{self, BufRead, Write};

use anyhow::Result;

use super::commands::{history_lines, parse_special_command, SpecialCommand};
use super::history::CommandHistory;
use crate::agent::{event_channel, ChatClient};
use crate::output::{OutputEvent, OutputWriter};
use crate::session::{ChatSession, SessionStore};

const WELCOME: &[&str] = &[
    "\nWelcome to MCP Chat Interactive!",
    "See connected server(s) with tools above.",
    "Commands:",
    "  exit, quit - Close the chat",
    "  history [N] - View last N commands (default 20)",
    "\nUse 'Ctrl+C' to exit at any time.",
];

/// Interactive REPL
pub struct Repl<'a> {
    client: &'a mut ChatClient,
    store: &'a SessionStore,
    session: &'a mut ChatSession,
    history: CommandHistory,
    output: &'a dyn OutputWriter,
}

impl<'a> Repl<'a> {
    pub fn new(
        client: &'a mut ChatClient,
        store: &'a SessionStore,
        session: &'a mut ChatSession,
        history: CommandHistory,
        output: &'a dyn OutputWriter,
    ) -> Self {
        Self {
            client,
            store,
            session,
            history,
            output,
        }
    }

    /// Run until `quit`, `exit` or end of input
    pub async fn run(&mut self) -> Result<()> {
        for line in WELCOME {
            self.output.write(OutputEvent::System(line.to_string()));
        }

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("\n> ");
            stdout.flush()?;

            let mut input = String::new();
            if stdin.lock().read_line(&mut input)? == 0 {
                break;
            }
            let input = input.trim_end_matches(['\r', '\n']);

            match parse_special_command(input) {
                Some(SpecialCommand::Quit) => break,
                Some(SpecialCommand::History(count)) => {
                    for line in history_lines(self.history.entries(), count) {
                        self.output.write(OutputEvent::Text(line));
                    }
                    continue;
                }
                Some(SpecialCommand::Invalid(message)) => {
                    self.output.write(OutputEvent::Text(message.to_string()));
                    continue;
                }
                None => {}
            }

            if input.trim().is_empty() {
                continue;
            }

            self.history.push(input);
            if let Err(e) = self.history.save() {
                tracing::warn!("Failed to save history: {:#}", e);
            }

            self.handle_chat(input).await;
        }

        Ok(())
    }

    /// Run one turn, streaming its events, then save the chat
    async fn handle_chat(&mut self, input: &str) {
        let client = &mut *self.client;
        let session = &mut *self.session;
        let output = self.output;

        let (tx, mut rx) = event_channel();
        client.set_event_sender(Some(tx));

        let turn = async {
            let result = client.process_query(session, input).await;
            // drop the sender so the printer sees the end of the stream
            client.set_event_sender(None);
            result
        };
        let printer = async {
            while let Some(event) = rx.recv().await {
                output.write(event.into());
            }
        };

        let (result, ()) = tokio::join!(turn, printer);
        output.write(OutputEvent::NewLine);

        if let Err(e) = result {
            tracing::debug!("Turn failed: {}", e);
        }

        if let Err(e) = self.store.save(&mut *self.session) {
            self.output
                .write(OutputEvent::Error(format!("Failed to save chat file: {}", e)));
        }
        self.output.flush();
    }
}
