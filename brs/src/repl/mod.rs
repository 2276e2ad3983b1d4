//! Interactive read-execute-print loop
//!
//! Each line is lexed, parsed and run against one long-lived interpreter, so
//! variables and functions persist between inputs.

use crate::extensions::ExtensionRegistry;
use crate::interp::{Interpreter, RuntimeContext, Signal};
use crate::lexer::scan;
use crate::parser::parse;
use crate::task::message::{HostMessage, MessageReceiver, channel};
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use std::path::PathBuf;

const PROMPT: &str = "brs> ";
const HISTORY_FILE: &str = ".brs_history";
const REPL_FILENAME: &str = "REPL";

/// Interpreter state shared by every line of a REPL session
pub struct Session {
    interpreter: Interpreter,
    messages: MessageReceiver,
}

impl Session {
    pub fn new() -> Self {
        let (tx, messages) = channel();
        Session {
            interpreter: Interpreter::new(RuntimeContext::new(tx)),
            messages,
        }
    }

    /// Session with the named extensions attached
    pub fn with_extensions(registry: &ExtensionRegistry, names: &[String]) -> Self {
        let mut session = Self::new();
        for extension in registry.instantiate(names) {
            session.interpreter.add_extension(extension);
        }
        session
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Run one line of source; returns every message it produced
    pub fn eval_line(&mut self, line: &str) -> Vec<HostMessage> {
        let mut output = Vec::new();
        let scanned = scan(line, REPL_FILENAME);
        if !scanned.errors.is_empty() {
            output.extend(scanned.errors.iter().map(|e| HostMessage::Error(e.to_string())));
            return output;
        }
        let parsed = parse(&scanned.tokens);
        if !parsed.errors.is_empty() {
            output.extend(parsed.errors.iter().map(|e| HostMessage::Error(e.to_string())));
            return output;
        }
        if parsed.statements.is_empty() {
            return output;
        }

        let result = self.interpreter.run_statements(&parsed.statements);
        output.extend(self.messages.drain());
        match result {
            Ok(_) => {}
            Err(Signal::Error(err)) => output.push(HostMessage::Error(err.to_string())),
            Err(Signal::End(reason)) => log::debug!("REPL input ended execution: {reason:?}"),
        }
        output
    }

    /// Release every component the session still holds
    pub fn finish(mut self) {
        self.interpreter.release_all();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Write a host message to the console: prints to stdout, problems to stderr
pub fn print_message(message: &HostMessage) {
    match message {
        HostMessage::Print(text) => print!("{text}"),
        HostMessage::Warning(text) | HostMessage::Error(text) => eprintln!("{}", text.trim_end()),
        HostMessage::Debug(text) => eprintln!("{}", text.trim_end()),
        HostMessage::Start(_) | HostMessage::End(_) | HostMessage::TaskState { .. } => {
            log::debug!("{message}")
        }
        HostMessage::Version(_) | HostMessage::Extension { .. } => log::info!("{message}"),
    }
}

/// REPL state
pub struct Repl {
    editor: DefaultEditor,
    session: Session,
    history_path: Option<PathBuf>,
}

impl Repl {
    /// Create a new REPL
    pub fn new(session: Session) -> RlResult<Self> {
        let editor = DefaultEditor::new()?;
        let history_path = dirs_home().map(|h| h.join(HISTORY_FILE));

        let mut repl = Repl {
            editor,
            session,
            history_path,
        };

        if let Some(ref path) = repl.history_path {
            if let Err(e) = repl.editor.load_history(path) {
                log::debug!("no REPL history loaded: {e}");
            }
        }

        Ok(repl)
    }

    /// Run the REPL until `:quit` or end of input
    pub fn run(mut self) -> RlResult<()> {
        println!("BrightScript REPL v{}", env!("CARGO_PKG_VERSION"));
        println!("Type :help for help, :quit to exit.\n");

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();

                    if line.is_empty() {
                        continue;
                    }

                    let _ = self.editor.add_history_entry(line);

                    if line.starts_with(':') || is_exit_word(line) {
                        if self.handle_command(line) {
                            break;
                        }
                        continue;
                    }

                    for message in self.session.eval_line(line) {
                        print_message(&message);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("Goodbye!");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {err}");
                    break;
                }
            }
        }

        if let Some(ref path) = self.history_path {
            if let Err(e) = self.editor.save_history(path) {
                log::warn!("could not save REPL history: {e}");
            }
        }
        self.session.finish();

        Ok(())
    }

    /// Handle REPL commands; returns true when the REPL should exit
    fn handle_command(&mut self, cmd: &str) -> bool {
        match cmd.to_ascii_lowercase().as_str() {
            ":quit" | ":q" | ":exit" | "quit" | "exit" => {
                println!("Goodbye!");
                true
            }
            ":help" | ":h" | ":?" => {
                print_help();
                false
            }
            ":vars" => {
                println!("{}", self.session.interpreter().describe_locals());
                false
            }
            ":bscs" => {
                println!("{}", self.session.interpreter().heap().summary());
                false
            }
            ":clear" => {
                print!("\x1B[2J\x1B[1;1H");
                false
            }
            _ => {
                println!("Unknown command: {cmd}");
                println!("Type :help for help.");
                false
            }
        }
    }
}

fn is_exit_word(line: &str) -> bool {
    line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit")
}

fn print_help() {
    println!("REPL Commands:");
    println!("  :help, :h, :?   Show this help");
    println!("  :quit, :q       Exit the REPL (also: quit, exit)");
    println!("  :vars           List local variables");
    println!("  :bscs           Component allocation statistics");
    println!("  :clear          Clear the screen");
    println!();
    println!("Enter BrightScript statements one line at a time:");
    println!("  x = 1 + 2 : print x");
    println!("  function double(n) : return n * 2 : end function");
}

/// Get home directory
fn dirs_home() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}
