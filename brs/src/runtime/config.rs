//! Execution options, device information and the payloads that start an app or task

use crate::error::{CompileError, Result};
use crate::preprocessor::Manifest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Interpreter behavior switches, loadable from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExecutionOptions {
    /// Entry point names tried in order (case-insensitive)
    pub entry_points: Vec<String>,
    /// Nested user-function calls allowed before a stack overflow error
    pub max_call_depth: usize,
    /// Post the call-stack backtrace when the app crashes
    pub backtrace_on_crash: bool,
    /// Warn when neither an entry point nor top-level code exists
    pub warn_missing_entry: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            entry_points: vec!["runuserinterface".to_string(), "main".to_string()],
            max_call_depth: 10_000,
            backtrace_on_crash: true,
            warn_missing_entry: true,
        }
    }
}

impl ExecutionOptions {
    /// Parse options from TOML text; missing keys take their defaults
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CompileError::config(e.to_string()))
    }

    /// Load options from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn entry_points(mut self, names: Vec<String>) -> Self {
        self.entry_points = names;
        self
    }

    pub fn backtrace_on_crash(mut self, enable: bool) -> Self {
        self.backtrace_on_crash = enable;
        self
    }
}

/// Static description of the device the app runs on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceInfo {
    pub developer_id: String,
    pub friendly_name: String,
    pub device_model: String,
    pub firmware_version: String,
    pub client_id: String,
    pub country_code: String,
    pub time_zone: String,
    pub locale: String,
    pub clock_format: String,
    pub display_mode: String,
    pub max_simul_streams: u32,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            developer_id: "34c6fceca75e456f25e7e99531e2425c6c1de443".to_string(),
            friendly_name: "BrightScript Runtime".to_string(),
            device_model: "8000X".to_string(),
            firmware_version: "48G.04E05531A".to_string(),
            client_id: "6c5bf3a5-b2a5-4918-824d-7691d5c85364".to_string(),
            country_code: "US".to_string(),
            time_zone: "UTC".to_string(),
            locale: "en_US".to_string(),
            clock_format: "12h".to_string(),
            display_mode: "720p".to_string(),
            max_simul_streams: 2,
        }
    }
}

/// One source file of an application, indexed by `id` in the path table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub id: u32,
    pub path: String,
}

/// Everything needed to start an application
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPayload {
    #[serde(default)]
    pub device: DeviceInfo,
    pub launch_time: DateTime<Utc>,
    #[serde(default)]
    pub manifest: Manifest,
    #[serde(default)]
    pub deep_link: BTreeMap<String, String>,
    /// Path table; `source[i]` is the text of the file whose `id` is `i`
    #[serde(default)]
    pub paths: Vec<SourceFile>,
    #[serde(default)]
    pub source: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub options: ExecutionOptions,
}

impl AppPayload {
    pub fn new(paths: Vec<SourceFile>, source: Vec<String>) -> Self {
        Self {
            device: DeviceInfo::default(),
            launch_time: Utc::now(),
            manifest: Manifest::new(),
            deep_link: BTreeMap::new(),
            paths,
            source,
            extensions: Vec::new(),
            options: ExecutionOptions::default(),
        }
    }

    /// A payload holding one in-memory source file
    pub fn from_source(path: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(
            vec![SourceFile {
                id: 0,
                path: path.into(),
            }],
            vec![source.into()],
        )
    }

    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| CompileError::config(e.to_string()))
    }

    /// (path, text) of every source file, in path-table order
    pub fn files(&self) -> Result<Vec<(&str, &str)>> {
        source_files(&self.paths, &self.source)
    }
}

/// Pair each path-table entry with its source text, keyed by `id`
pub fn source_files<'a>(paths: &'a [SourceFile], source: &'a [String]) -> Result<Vec<(&'a str, &'a str)>> {
    paths
        .iter()
        .map(|file| {
            source
                .get(file.id as usize)
                .map(|text| (file.path.as_str(), text.as_str()))
                .ok_or_else(|| {
                    CompileError::config(format!(
                        "no source text for '{}' (id {})",
                        file.path, file.id
                    ))
                })
        })
        .collect()
}

/// Identity and state of a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskData {
    pub id: u32,
    pub name: String,
    /// Name of the function the task thread runs
    #[serde(default = "default_task_function")]
    pub function: String,
    /// Initial contents of the task's `m` (string fields only)
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

fn default_task_function() -> String {
    "init".to_string()
}

/// Everything needed to start a task thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPayload {
    #[serde(default)]
    pub device: DeviceInfo,
    #[serde(default)]
    pub manifest: Manifest,
    pub task_data: TaskData,
    #[serde(default)]
    pub paths: Vec<SourceFile>,
    #[serde(default)]
    pub source: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub options: ExecutionOptions,
}

impl TaskPayload {
    /// Source files of the task, in path-table order
    pub fn files(&self) -> Result<Vec<(&str, &str)>> {
        source_files(&self.paths, &self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options = ExecutionOptions::default();
        assert_eq!(options.entry_points, vec!["runuserinterface", "main"]);
        assert_eq!(options.max_call_depth, 10_000);
        assert!(options.warn_missing_entry);
    }

    #[test]
    fn test_options_from_partial_toml() {
        let options = ExecutionOptions::from_toml("max-call-depth = 50\n").unwrap();
        assert_eq!(options.max_call_depth, 50);
        assert_eq!(options.entry_points.len(), 2);
    }

    #[test]
    fn test_options_bad_toml() {
        let err = ExecutionOptions::from_toml("max-call-depth = \"lots\"").unwrap_err();
        assert!(matches!(err, CompileError::Config { .. }));
    }

    #[test]
    fn test_options_builder() {
        let options = ExecutionOptions::default()
            .max_call_depth(3)
            .backtrace_on_crash(false)
            .entry_points(vec!["start".into()]);
        assert_eq!(options.max_call_depth, 3);
        assert!(!options.backtrace_on_crash);
        assert_eq!(options.entry_points, vec!["start"]);
    }

    #[test]
    fn test_device_info_camel_case() {
        let device: DeviceInfo =
            serde_json::from_str(r#"{"friendlyName": "Living Room", "maxSimulStreams": 4}"#)
                .unwrap();
        assert_eq!(device.friendly_name, "Living Room");
        assert_eq!(device.max_simul_streams, 4);
        assert_eq!(device.locale, "en_US");
    }

    #[test]
    fn test_payload_files() {
        let payload = AppPayload::from_source("main.brs", "sub main()\nend sub");
        let files = payload.files().unwrap();
        assert_eq!(files, vec![("main.brs", "sub main()\nend sub")]);
    }

    #[test]
    fn test_payload_missing_source() {
        let mut payload = AppPayload::from_source("main.brs", "");
        payload.paths.push(SourceFile {
            id: 7,
            path: "lib.brs".into(),
        });
        assert!(payload.files().is_err());
    }

    #[test]
    fn test_payload_from_json() {
        let json = r#"{
            "launchTime": "2024-01-01T00:00:00Z",
            "manifest": {"title": "Demo"},
            "paths": [{"id": 0, "path": "main.brs"}],
            "source": ["sub main()\nend sub"]
        }"#;
        let payload = AppPayload::from_json(json).unwrap();
        assert_eq!(payload.manifest.get("title").map(String::as_str), Some("Demo"));
        assert_eq!(payload.files().unwrap().len(), 1);
    }

    #[test]
    fn test_source_files_follow_ids() {
        let paths = vec![
            SourceFile { id: 1, path: "lib.brs".into() },
            SourceFile { id: 0, path: "main.brs".into() },
        ];
        let source = vec!["' main".to_string(), "' lib".to_string()];
        let files = source_files(&paths, &source).unwrap();
        assert_eq!(files, vec![("lib.brs", "' lib"), ("main.brs", "' main")]);
    }

    #[test]
    fn test_task_data_default_function() {
        let data: TaskData = serde_json::from_str(r#"{"id": 1, "name": "loader"}"#).unwrap();
        assert_eq!(data.function, "init");
    }
}
