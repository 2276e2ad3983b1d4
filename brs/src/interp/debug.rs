//! Debugger commands arriving through the shared region

use super::Interpreter;
use super::collections::CREATABLE_CLASSES;
use super::error::{EndReason, InterpResult, Signal};
use crate::ast::Location;
use crate::lexer::scan;
use crate::parser::parse;
use crate::task::message::HostMessage;
use crate::task::shared::{DataType, DebugCommand, SharedRegion};
use std::time::Duration;

/// How long a paused interpreter sleeps between checks of the command slot
const PAUSE_POLL: Duration = Duration::from_millis(200);

/// File name reported for statements typed at the debugger prompt
const DEBUG_FILENAME: &str = "debug";

const DEBUG_HELP: &str = "Command List:
   bt              Print backtrace of call function context frames
   classes         List creatable component classes
   cont|c          Continue script execution
   exit|q          Exit shell
   last|l          Show last line that executed
   next|n          Show the next line to execute
   list            List current function
   bscs            Summarize BrightScript Component instances
   stats           Shows statistics
   step|s|t        Step one program statement
   thread|th       Show selected thread
   threads|ths     List all threads of execution
   var             Display local variables and their types/values

   Type any expression for a live compile and run, in the context
   of the current function.";

/// Why execution is pausing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pause {
    /// `stop`, `BREAK` or `PAUSE`
    Break,
    /// The statement after a `STEP`
    Step,
}

impl Interpreter {
    /// Check for a pending debugger command; called before every statement
    /// and on every loop pass
    pub(super) fn poll_debugger(&mut self) -> InterpResult<()> {
        let Some(region) = self.context.region.clone() else {
            return Ok(());
        };
        if self.step_mode {
            self.step_mode = false;
            return self.debug_pause(Pause::Step);
        }
        if !has_pending_command(&region) {
            return Ok(());
        }
        match region.take_debug_command() {
            Some(DebugCommand::Break | DebugCommand::Pause) => self.debug_pause(Pause::Break),
            Some(DebugCommand::Exit) => Err(Signal::End(EndReason::DebugExit)),
            Some(other) => {
                log::debug!("ignoring debug command {other:?} while running");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// `stop` statement: pause for the debugger, or end the app when none is attached
    pub(super) fn stop(&mut self) -> InterpResult<()> {
        match self.context.region {
            Some(_) => self.debug_pause(Pause::Break),
            None => Err(Signal::End(EndReason::Stop)),
        }
    }

    /// Block until the debugger resumes (`CONT`, `STEP`) or ends (`EXIT`) execution
    fn debug_pause(&mut self, cause: Pause) -> InterpResult<()> {
        let Some(region) = self.context.region.clone() else {
            return Ok(());
        };
        log::debug!("execution paused at {}", self.current_loc);
        match cause {
            Pause::Break => self.post_debug(format!("stop,{}", self.current_loc)),
            Pause::Step => self.post_debug(self.numbered_line(&self.current_loc)),
        }
        loop {
            let command = match region.take_debug_command() {
                Some(command) => command,
                None => {
                    region.wait(DataType::Dbg.index(), -1, Some(PAUSE_POLL));
                    if self.context.messages.is_closed() {
                        return Err(Signal::End(EndReason::DebugExit));
                    }
                    continue;
                }
            };
            match command {
                DebugCommand::Cont => {
                    self.post_debug("continue".to_string());
                    return Ok(());
                }
                DebugCommand::Step => {
                    self.step_mode = true;
                    return Ok(());
                }
                DebugCommand::Exit => return Err(Signal::End(EndReason::DebugExit)),
                DebugCommand::Expr => self.debug_expression(&region.read_data())?,
                other => self.debug_report(other),
            }
        }
    }

    /// Answer a command that inspects state without resuming
    fn debug_report(&self, command: DebugCommand) {
        match command {
            DebugCommand::Bt => self.post_debug(self.backtrace()),
            DebugCommand::Var => self.post_debug(self.describe_locals()),
            DebugCommand::Bscs => self.post_debug(self.context.heap.summary()),
            DebugCommand::Help => self.post_debug(DEBUG_HELP.to_string()),
            DebugCommand::Last => self.post_debug(self.numbered_line(&self.last_loc)),
            DebugCommand::Next => self.post_debug(self.numbered_line(&self.current_loc)),
            DebugCommand::List => self.post_debug(self.list_function()),
            DebugCommand::Thread => self.post_debug(format!("Thread selected: {}", self.thread_line())),
            DebugCommand::Threads => self.post_debug(format!(
                "ID    Location                                Source Code\n{}\n  *selected",
                self.thread_line()
            )),
            DebugCommand::Stats => self.post_debug(format!(
                "Call depth: {}\n{}",
                self.stack.len(),
                self.context.heap.summary()
            )),
            DebugCommand::Classes => self.post_debug(CREATABLE_CLASSES.join("\n")),
            DebugCommand::Break => self
                .context
                .post(HostMessage::Warning("Micro Debugger already running!".to_string())),
            DebugCommand::Pause => {}
            DebugCommand::Cont | DebugCommand::Step | DebugCommand::Exit | DebugCommand::Expr => {
                log::debug!("debug command {command:?} handled by the pause loop")
            }
        }
    }

    /// Compile and run a statement typed at the debugger prompt, in the
    /// scope of the paused function
    fn debug_expression(&mut self, text: &str) -> InterpResult<()> {
        let scanned = scan(&format!("{text}\n"), DEBUG_FILENAME);
        if let Some(err) = scanned.errors.first() {
            self.context.post(HostMessage::Error(err.to_string()));
            return Ok(());
        }
        let parsed = parse(&scanned.tokens);
        if let Some(err) = parsed.errors.first() {
            self.context.post(HostMessage::Error(err.to_string()));
            return Ok(());
        }
        if parsed.statements.is_empty() {
            self.context.post(HostMessage::Error(
                "Syntax Error. (compile error &h02) in $LIVECOMPILE".to_string(),
            ));
            return Ok(());
        }

        // Commands arriving meanwhile belong to the pause loop
        let region = self.context.region.take();
        let paused_at = (self.current_loc.clone(), self.last_loc.clone());
        let result = self.run_statements(&parsed.statements);
        (self.current_loc, self.last_loc) = paused_at;
        self.context.region = region;
        match result {
            Ok(_) => Ok(()),
            Err(Signal::Error(err)) => {
                self.context.post(HostMessage::Error(err.to_string()));
                Ok(())
            }
            Err(end) => Err(end),
        }
    }

    /// `NNN: text` for the first line of `loc`
    fn numbered_line(&self, loc: &Location) -> String {
        let text = self
            .context
            .source_line(&loc.file, loc.start.line)
            .unwrap_or_default();
        format!("{:03}: {text}", loc.start.line)
    }

    /// Every line of the innermost function, the current one flagged with `*`
    fn list_function(&self) -> String {
        let Some(frame) = self.stack.last() else {
            return self.numbered_line(&self.current_loc);
        };
        let file = &frame.function_loc.file;
        let current = (self.current_loc.file == *file).then_some(self.current_loc.start.line);
        (frame.function_loc.start.line..=frame.function_loc.end.line)
            .map_while(|line| {
                let text = self.context.source_line(file, line)?;
                let flag = if Some(line) == current { '*' } else { ' ' };
                Some(format!("{line:03}:{flag} {text}"))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn thread_line(&self) -> String {
        let text = self
            .context
            .source_line(&self.current_loc.file, self.current_loc.start.line)
            .unwrap_or_default();
        format!(" 0*   {:<40}{}", self.current_loc.to_string(), text.trim())
    }

    fn post_debug(&self, text: String) {
        self.context.post(HostMessage::Debug(text));
    }

    /// One `name  Type  value` line per local, as the `VAR` command reports
    pub fn describe_locals(&self) -> String {
        let mut lines = vec![format!("{:<16}roAssociativeArray", "global")];
        lines.push(format!("{:<16}roAssociativeArray", "m"));
        for (name, value) in self.env.locals() {
            lines.push(format!(
                "{name:<16}{:<20}{}",
                value.type_name(),
                value.to_nested_string()
            ));
        }
        lines.join("\n")
    }
}

/// Whether an interpreter would see a debugger on `region`
pub fn has_pending_command(region: &SharedRegion) -> bool {
    region.load_type(DataType::Dbg) >= 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::context::RuntimeContext;
    use crate::interp::value::Value;
    use crate::interp::env::Scope;
    use crate::preprocessor::Manifest;
    use crate::runtime::lex_parse;
    use crate::task::message::channel;
    use crate::task::shared::BufferType;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn paused_interpreter(region: &Arc<SharedRegion>) -> (Interpreter, crate::task::message::MessageReceiver) {
        let (tx, rx) = channel();
        let ctx = RuntimeContext::new(tx).with_region(Arc::clone(region));
        (Interpreter::new(ctx), rx)
    }

    /// Drive a paused interpreter: each command is sent once the previous one was taken
    fn send_in_order(region: &Arc<SharedRegion>, commands: Vec<DebugCommand>) -> std::thread::JoinHandle<()> {
        let region = Arc::clone(region);
        std::thread::spawn(move || {
            for command in commands {
                while has_pending_command(&region) {
                    std::thread::sleep(Duration::from_millis(5));
                }
                if command == DebugCommand::Expr {
                    region.write_data("print a + 1", BufferType::DebugExpr);
                }
                region.send_debug_command(command);
            }
        })
    }

    /// Run `source` from `main.brs` with a break pending before the first statement
    fn run_with_debugger(source: &str, commands: Vec<DebugCommand>) -> (InterpResult<Value>, Vec<HostMessage>) {
        let statements = lex_parse("main.brs", source, &Manifest::new()).unwrap();
        let region = Arc::new(SharedRegion::new());
        let (tx, mut rx) = channel();
        let ctx = RuntimeContext::new(tx)
            .with_region(Arc::clone(&region))
            .with_sources(BTreeMap::from([("main.brs".to_string(), source.to_string())]));
        let mut interp = Interpreter::new(ctx);

        region.send_debug_command(DebugCommand::Break);
        let host = send_in_order(&region, commands);
        let result = interp.exec(&statements, None);
        host.join().unwrap();
        interp.release_all();
        (result, rx.drain())
    }

    fn debug_text(messages: &[HostMessage]) -> Vec<&str> {
        messages
            .iter()
            .filter_map(|m| match m {
                HostMessage::Debug(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    const STEPPED: &str = "sub main()\n    a = 41\n    b = 2\nend sub\n";

    #[test]
    fn test_step_pauses_at_next_statement() {
        let (result, messages) = run_with_debugger(
            STEPPED,
            vec![DebugCommand::Step, DebugCommand::Last, DebugCommand::Cont],
        );
        assert!(result.is_ok());
        let debug = debug_text(&messages);
        assert!(debug[0].starts_with("stop,main.brs(2,"), "{debug:?}");
        assert_eq!(debug[1], "003:     b = 2");
        assert_eq!(debug[2], "002:     a = 41");
        assert_eq!(debug[3], "continue");
    }

    #[test]
    fn test_list_flags_current_line() {
        let (_, messages) = run_with_debugger(
            STEPPED,
            vec![DebugCommand::Step, DebugCommand::List, DebugCommand::Cont],
        );
        insta::assert_snapshot!(debug_text(&messages)[2], @r"
        001:  sub main()
        002:      a = 41
        003:*     b = 2
        004:  end sub
        ");
    }

    #[test]
    fn test_expression_runs_in_paused_scope() {
        let (_, messages) = run_with_debugger(
            STEPPED,
            vec![DebugCommand::Step, DebugCommand::Expr, DebugCommand::Cont],
        );
        assert!(messages.contains(&HostMessage::Print(" 42\n".to_string())), "{messages:?}");
    }

    #[test]
    fn test_inspection_commands_answer() {
        let (result, messages) = run_with_debugger(
            STEPPED,
            vec![
                DebugCommand::Help,
                DebugCommand::Threads,
                DebugCommand::Classes,
                DebugCommand::Break,
                DebugCommand::Exit,
            ],
        );
        assert_eq!(result, Err(Signal::End(EndReason::DebugExit)));
        let debug = debug_text(&messages);
        assert!(debug[1].starts_with("Command List:"));
        assert!(debug[2].contains("main.brs(2,") && debug[2].contains("a = 41"));
        assert!(debug[3].contains("roAssociativeArray"));
        assert!(messages.contains(&HostMessage::Warning("Micro Debugger already running!".to_string())));
    }

    #[test]
    fn test_exit_command_ends_execution() {
        let region = Arc::new(SharedRegion::new());
        let (mut interp, _rx) = paused_interpreter(&region);
        region.send_debug_command(DebugCommand::Exit);
        assert!(has_pending_command(&region));
        assert_eq!(interp.poll_debugger(), Err(Signal::End(EndReason::DebugExit)));
        assert!(!has_pending_command(&region));
    }

    #[test]
    fn test_no_region_is_a_no_op() {
        let (tx, _rx) = channel();
        let mut interp = Interpreter::new(RuntimeContext::new(tx));
        assert_eq!(interp.poll_debugger(), Ok(()));
        assert_eq!(interp.stop(), Err(Signal::End(EndReason::Stop)));
    }

    #[test]
    fn test_pause_answers_commands_until_cont() {
        let region = Arc::new(SharedRegion::new());
        let (mut interp, mut rx) = paused_interpreter(&region);
        interp
            .environment_mut()
            .define(Scope::Function, "count", Value::Int32(3), None)
            .unwrap();

        region.send_debug_command(DebugCommand::Break);
        let host = {
            let region = Arc::clone(&region);
            std::thread::spawn(move || {
                for command in [DebugCommand::Var, DebugCommand::Bscs, DebugCommand::Cont] {
                    while has_pending_command(&region) {
                        std::thread::sleep(Duration::from_millis(5));
                    }
                    region.send_debug_command(command);
                }
            })
        };
        assert_eq!(interp.poll_debugger(), Ok(()));
        host.join().unwrap();

        let debug: Vec<String> = rx
            .drain()
            .into_iter()
            .filter_map(|m| match m {
                HostMessage::Debug(text) => Some(text),
                _ => None,
            })
            .collect();
        assert!(debug[0].starts_with("stop,"));
        assert!(debug.iter().any(|d| d.contains("count") && d.contains("Integer")));
        assert!(debug.iter().any(|d| d.starts_with("Components created")));
        assert_eq!(debug.last().map(String::as_str), Some("continue"));
    }
}
