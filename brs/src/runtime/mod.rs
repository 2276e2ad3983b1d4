//! Application runtime
//!
//! Turns an [`AppPayload`] into a running program: every source file goes
//! through lexer, preprocessor and parser (memoized in a [`ParseCache`]),
//! then a fresh [`Interpreter`] executes the combined statements and the
//! outcome is classified into an [`AppExitReason`].

pub mod config;

use crate::ast::{Location, Statement};
use crate::error::CompileError;
use crate::extensions::ExtensionRegistry;
use crate::interp::collections::RoAssociativeArray;
use crate::interp::{EndReason, ErrorKind, Interpreter, RuntimeContext, RuntimeError, Signal, Value};
use crate::lexer::scan;
use crate::parser::parse;
use crate::preprocessor::{Manifest, preprocess};
use crate::task::message::{AppExitReason, HostMessage, MessageSender};
use crate::task::shared::SharedRegion;
use chrono::Utc;
use config::AppPayload;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Statements of one parsed file, shared between every context that runs it
pub type ParsedFile = Arc<Vec<Statement>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    path: String,
    /// Hash of the source text and the `bs_const` entry it was preprocessed with
    fingerprint: u64,
}

impl CacheKey {
    fn new(path: &str, source: &str, manifest: &Manifest) -> Self {
        let mut hasher = DefaultHasher::new();
        source.hash(&mut hasher);
        manifest.get("bs_const").hash(&mut hasher);
        Self {
            path: path.to_string(),
            fingerprint: hasher.finish(),
        }
    }
}

/// Memoized parse results, keyed by file path
///
/// Only successful parses are stored. The cache is thread safe so an app and
/// its tasks can share one instance.
#[derive(Debug, Default)]
pub struct ParseCache {
    entries: Mutex<HashMap<CacheKey, ParsedFile>>,
}

impl ParseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `source`, reusing an earlier result for the same path and text
    pub fn parse(
        &self,
        path: &str,
        source: &str,
        manifest: &Manifest,
    ) -> Result<ParsedFile, Vec<CompileError>> {
        let key = CacheKey::new(path, source, manifest);
        if let Some(parsed) = self.entries.lock().get(&key) {
            log::trace!("parse cache hit for {path}");
            return Ok(Arc::clone(parsed));
        }
        let parsed = Arc::new(lex_parse(path, source, manifest)?);
        self.entries.lock().insert(key, Arc::clone(&parsed));
        Ok(parsed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Run one file through lexer, preprocessor and parser.
///
/// Each stage only runs when the previous one reported no errors.
pub fn lex_parse(
    path: &str,
    source: &str,
    manifest: &Manifest,
) -> Result<Vec<Statement>, Vec<CompileError>> {
    log::debug!("lexing {path}");
    let scanned = scan(source, path);
    if !scanned.errors.is_empty() {
        return Err(scanned.errors);
    }
    let filtered = preprocess(&scanned.tokens, manifest).map_err(|e| vec![e])?;
    if !filtered.errors.is_empty() {
        return Err(filtered.errors);
    }
    let parsed = parse(&filtered.processed_tokens);
    if !parsed.errors.is_empty() {
        return Err(parsed.errors);
    }
    Ok(parsed.statements)
}

/// Every file of an application, parsed and ready to execute
#[derive(Debug, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
    /// Source text keyed by path, handed to extensions
    pub source_map: BTreeMap<String, String>,
}

impl Program {
    /// Parse `files` in order, stopping at the first file with errors
    pub fn load(
        files: &[(&str, &str)],
        manifest: &Manifest,
        cache: &ParseCache,
    ) -> Result<Program, Vec<CompileError>> {
        let mut program = Program::default();
        for (path, source) in files {
            let parsed = cache.parse(path, source, manifest)?;
            program.statements.extend(parsed.iter().cloned());
            program
                .source_map
                .insert(path.to_string(), source.to_string());
        }
        Ok(program)
    }
}

/// Post every front-end error to the host
pub fn post_compile_errors(sender: &MessageSender, errors: &[CompileError]) {
    for err in errors {
        log::error!("{err}");
        sender.send(HostMessage::Error(err.to_string()));
    }
}

/// Parameters handed to the entry point: run mode, launch source, splash time
/// and the deep-link entries, which override the defaults
pub fn input_params(interp: &Interpreter, payload: &AppPayload) -> Value {
    let splash_time = (Utc::now() - payload.launch_time).num_milliseconds().max(0);
    let mut entries: BTreeMap<String, String> = BTreeMap::from([
        ("instant_on_run_mode".to_string(), "foreground".to_string()),
        (
            "lastExitOrTerminationReason".to_string(),
            AppExitReason::Unknown.to_string(),
        ),
        ("source".to_string(), "auto-run-dev".to_string()),
        ("splashTime".to_string(), splash_time.to_string()),
    ]);
    entries.extend(payload.deep_link.clone());
    let pairs = entries
        .into_iter()
        .map(|(key, value)| (key, Value::string(value)))
        .collect();
    Value::Object(RoAssociativeArray::create(interp.heap(), pairs))
}

/// Classify how a run ended, posting the error for crashes
pub fn exit_reason(
    result: &Result<Value, Signal>,
    sender: &MessageSender,
    with_backtrace: bool,
) -> AppExitReason {
    match result {
        Ok(_) | Err(Signal::End(EndReason::EndStatement)) => AppExitReason::Finished,
        Err(Signal::End(EndReason::DebugExit)) => AppExitReason::UserNav,
        Err(Signal::End(EndReason::Stop)) => AppExitReason::Stopped,
        Err(Signal::Error(err)) => {
            sender.send(HostMessage::Error(crash_report(err, with_backtrace)));
            if err.kind == ErrorKind::MemberFunctionNotFound {
                AppExitReason::UnknownFunction
            } else {
                AppExitReason::Crashed
            }
        }
    }
}

/// Error text posted when an app crashes
pub fn crash_report(err: &RuntimeError, with_backtrace: bool) -> String {
    let mut text = format!("{err} (runtime error &h{:02x})", err.kind.errno());
    if with_backtrace {
        let location = err.location.clone().unwrap_or_else(Location::internal);
        text.push_str("\nBackTrace:\n");
        text.push_str(&Interpreter::format_backtrace(&err.backtrace, &location));
    }
    text
}

/// Run an application to completion on the current thread.
///
/// Posts `end,<reason>` when done and returns the same reason.
pub fn execute_app(
    payload: &AppPayload,
    sender: MessageSender,
    region: Option<Arc<SharedRegion>>,
    registry: &ExtensionRegistry,
    cache: &ParseCache,
) -> AppExitReason {
    let reason = run_app(payload, sender.clone(), region, registry, cache);
    log::debug!("app finished: {reason}");
    sender.send(HostMessage::End(reason));
    reason
}

fn run_app(
    payload: &AppPayload,
    sender: MessageSender,
    region: Option<Arc<SharedRegion>>,
    registry: &ExtensionRegistry,
    cache: &ParseCache,
) -> AppExitReason {
    let program = match payload
        .files()
        .map_err(|e| vec![e])
        .and_then(|files| Program::load(&files, &payload.manifest, cache))
    {
        Ok(program) => program,
        Err(errors) => {
            post_compile_errors(&sender, &errors);
            return AppExitReason::Crashed;
        }
    };

    let mut context = RuntimeContext::new(sender.clone())
        .with_manifest(payload.manifest.clone())
        .with_device(payload.device.clone())
        .with_options(payload.options.clone())
        .with_sources(program.source_map.clone());
    if let Some(region) = region {
        context = context.with_region(region);
    }
    let mut interp = Interpreter::new(context);
    for mut extension in registry.instantiate(&payload.extensions) {
        extension.update_source_map(&program.source_map);
        interp.add_extension(extension);
    }

    let params = input_params(&interp, payload);
    let result = interp.exec(&program.statements, Some(params));
    let reason = exit_reason(&result, &sender, payload.options.backtrace_on_crash);
    interp.release_all();
    reason
}
