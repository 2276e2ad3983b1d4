//! Task threads
//!
//! A task is an independent interpreter on its own OS thread. It shares
//! nothing with its host but the message channel and a [`SharedRegion`]; the
//! host stops it by issuing `EXIT` on the region.

pub mod message;
pub mod shared;

use crate::ast::Location;
use crate::error::Result;
use crate::extensions::ExtensionRegistry;
use crate::interp::{EndReason, Interpreter, InterpResult, RuntimeContext, Signal, Value};
use crate::runtime::config::TaskPayload;
use crate::runtime::{ParseCache, Program, crash_report, post_compile_errors};
use message::{HostMessage, MessageSender, TaskState};
use shared::{DebugCommand, SharedRegion};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Host-side handle of a running task
#[derive(Debug)]
pub struct TaskHandle {
    id: u32,
    name: String,
    region: Arc<SharedRegion>,
    thread: JoinHandle<TaskState>,
}

impl TaskHandle {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the task to stop at its next statement
    pub fn stop(&self) {
        log::debug!("stopping task {}", self.name);
        self.region.send_debug_command(DebugCommand::Exit);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the task thread; returns its final state
    pub fn join(self) -> TaskState {
        self.thread.join().unwrap_or_else(|_| {
            log::error!("task {} panicked", self.name);
            TaskState::Stop
        })
    }
}

/// Start `payload` on a new thread.
///
/// The thread builds its own pipeline and interpreter; parsed files are
/// shared through `cache`.
pub fn spawn_task(
    payload: TaskPayload,
    sender: MessageSender,
    region: Arc<SharedRegion>,
    registry: ExtensionRegistry,
    cache: Arc<ParseCache>,
) -> Result<TaskHandle> {
    let id = payload.task_data.id;
    let name = payload.task_data.name.clone();
    let thread = {
        let region = Arc::clone(&region);
        std::thread::Builder::new()
            .name(format!("task-{name}"))
            .spawn(move || run_task(&payload, sender, region, &registry, &cache))?
    };
    Ok(TaskHandle {
        id,
        name,
        region,
        thread,
    })
}

/// Body of a task thread; returns the final state it reported
pub fn run_task(
    payload: &TaskPayload,
    sender: MessageSender,
    region: Arc<SharedRegion>,
    registry: &ExtensionRegistry,
    cache: &ParseCache,
) -> TaskState {
    let task = &payload.task_data;
    log::info!("task {} ({}) started", task.name, task.id);
    let post_state = |state: TaskState| {
        sender.send(HostMessage::TaskState { id: task.id, state });
    };
    post_state(TaskState::Init);

    let program = match payload
        .files()
        .map_err(|e| vec![e])
        .and_then(|files| Program::load(&files, &payload.manifest, cache))
    {
        Ok(program) => program,
        Err(errors) => {
            post_compile_errors(&sender, &errors);
            post_state(TaskState::Done);
            return TaskState::Done;
        }
    };

    let context = RuntimeContext::new(sender.clone())
        .with_manifest(payload.manifest.clone())
        .with_device(payload.device.clone())
        .with_options(payload.options.clone())
        .with_sources(program.source_map.clone())
        .with_region(region);
    let mut interp = Interpreter::new(context);
    for mut extension in registry.instantiate(&payload.extensions) {
        extension.update_source_map(&program.source_map);
        interp.add_extension(extension);
    }

    post_state(TaskState::Run);
    let result = run_task_function(&mut interp, &program, payload);
    let state = match result {
        Err(Signal::End(EndReason::DebugExit)) => TaskState::Stop,
        Err(Signal::Error(err)) => {
            sender.send(HostMessage::Error(crash_report(
                &err,
                payload.options.backtrace_on_crash,
            )));
            TaskState::Done
        }
        Ok(_) | Err(Signal::End(_)) => TaskState::Done,
    };
    interp.release_all();
    post_state(state);
    sender.send(HostMessage::Debug(format!("Task {} is done.", task.name)));
    log::info!("task {} ({}) finished: {state}", task.name, task.id);
    state
}

fn run_task_function(
    interp: &mut Interpreter,
    program: &Program,
    payload: &TaskPayload,
) -> InterpResult<Value> {
    let task = &payload.task_data;
    interp.run_statements(&program.statements)?;
    let m = interp.environment().root_m().clone();
    for (key, value) in &task.fields {
        m.set_property(key, Value::string(value))?;
    }
    interp.for_each_extension(|ext, interp| ext.exec_task(interp, task))?;

    let callable = match interp.environment().get(&task.function) {
        Ok(Value::Callable(callable)) => callable,
        _ => {
            interp.warn(&format!(
                "Task function \"{}\" was not found in task {}",
                task.function, task.name
            ));
            return Ok(Value::Invalid);
        }
    };
    log::debug!("task {} calling {}", task.name, task.function);
    interp.call_callable(&callable, Vec::new(), &Location::internal(), None)
}
