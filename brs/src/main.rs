//! brs CLI

use brs::error::report_error;
use brs::extensions::ExtensionRegistry;
use brs::preprocessor::{Manifest, parse_manifest, preprocess};
use brs::repl::{Repl, Session, print_message};
use brs::runtime::config::{AppPayload, ExecutionOptions, SourceFile};
use brs::runtime::{ParseCache, execute_app};
use brs::task::message::{AppExitReason, channel};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "brs", version, about = "BrightScript runtime")]
struct Cli {
    /// Starts the REPL when omitted
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run an application made of one or more source files
    Run {
        /// Source files, loaded in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Manifest file (`key=value` lines, including `bs_const`)
        #[arg(short, long)]
        manifest: Option<PathBuf>,
        /// TOML file with execution options
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Extension to attach (repeatable)
        #[arg(short = 'x', long = "ext")]
        extensions: Vec<String>,
        /// Deep-link parameter passed to the entry point as `key=value`
        #[arg(short, long = "deep-link", value_parser = parse_key_value)]
        deep_link: Vec<(String, String)>,
    },
    /// Tokenize and dump tokens (debug)
    Tokens {
        /// Source file to tokenize
        file: PathBuf,
    },
    /// Preprocess, parse and dump the AST as JSON (debug)
    Parse {
        /// Source file to parse
        file: PathBuf,
        /// Manifest supplying `bs_const`
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },
    /// Interactive interpreter
    Repl {
        /// Extension to attach (repeatable)
        #[arg(short = 'x', long = "ext")]
        extensions: Vec<String>,
    },
}

fn main() {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Command::Run {
            files,
            manifest,
            config,
            extensions,
            deep_link,
        }) => run_files(&files, manifest.as_deref(), config.as_deref(), extensions, deep_link),
        Some(Command::Tokens { file }) => tokenize_file(&file),
        Some(Command::Parse { file, manifest }) => parse_file(&file, manifest.as_deref()),
        Some(Command::Repl { extensions }) => start_repl(&extensions),
        None => start_repl(&[]),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn parse_key_value(text: &str) -> Result<(String, String), String> {
    text.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{text}'"))
}

fn load_manifest(path: Option<&Path>) -> Result<Manifest, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(parse_manifest(&std::fs::read_to_string(path)?)),
        None => Ok(Manifest::new()),
    }
}

fn run_files(
    files: &[PathBuf],
    manifest: Option<&Path>,
    config: Option<&Path>,
    extensions: Vec<String>,
    deep_link: Vec<(String, String)>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut paths = Vec::new();
    let mut source = Vec::new();
    for (id, file) in files.iter().enumerate() {
        source.push(std::fs::read_to_string(file)?);
        paths.push(SourceFile {
            id: id as u32,
            path: file.display().to_string(),
        });
    }

    let mut payload = AppPayload::new(paths, source).with_manifest(load_manifest(manifest)?);
    if let Some(config) = config {
        payload.options = ExecutionOptions::load(config)?;
    }
    payload.extensions = extensions;
    payload.deep_link.extend(deep_link);

    let (tx, mut rx) = channel();
    let app = std::thread::Builder::new()
        .name("app".to_string())
        .spawn(move || {
            execute_app(
                &payload,
                tx,
                None,
                &ExtensionRegistry::with_builtins(),
                &ParseCache::new(),
            )
        })?;
    while let Some(message) = rx.blocking_recv() {
        print_message(&message);
    }

    let reason = app.join().map_err(|_| "application thread panicked")?;
    match reason {
        AppExitReason::Crashed | AppExitReason::UnknownFunction => {
            Err(format!("application ended with {reason}").into())
        }
        _ => Ok(()),
    }
}

fn tokenize_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    let filename = path.display().to_string();

    let scanned = brs::lexer::scan(&source, &filename);
    for token in &scanned.tokens {
        println!("{:?} {:?} @ {}", token.kind, token.text, token.loc);
    }
    for err in &scanned.errors {
        report_error(&filename, &source, err);
    }

    if scanned.errors.is_empty() {
        Ok(())
    } else {
        Err(format!("{} lexer error(s)", scanned.errors.len()).into())
    }
}

fn parse_file(path: &Path, manifest: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    let filename = path.display().to_string();
    let manifest = load_manifest(manifest)?;

    let scanned = brs::lexer::scan(&source, &filename);
    let mut errors = scanned.errors;
    if errors.is_empty() {
        let filtered = preprocess(&scanned.tokens, &manifest)?;
        errors = filtered.errors;
        if errors.is_empty() {
            let parsed = brs::parser::parse(&filtered.processed_tokens);
            errors = parsed.errors;
            if errors.is_empty() {
                println!("{}", serde_json::to_string_pretty(&parsed.statements)?);
                return Ok(());
            }
        }
    }

    for err in &errors {
        report_error(&filename, &source, err);
    }
    Err(format!("{} error(s) in {filename}", errors.len()).into())
}

fn start_repl(extensions: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::with_extensions(&ExtensionRegistry::with_builtins(), extensions);
    Repl::new(session)?.run()?;
    Ok(())
}
