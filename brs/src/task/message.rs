//! Host-visible messages and the channel that carries them

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Why an application or task stopped running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppExitReason {
    #[serde(rename = "EXIT_UNKNOWN")]
    Unknown,
    #[serde(rename = "EXIT_FINISHED")]
    Finished,
    #[serde(rename = "EXIT_BRIGHTSCRIPT_CRASH")]
    Crashed,
    #[serde(rename = "EXIT_BRIGHTSCRIPT_UNK_FUNC")]
    UnknownFunction,
    #[serde(rename = "EXIT_USER_NAV")]
    UserNav,
    #[serde(rename = "EXIT_BRIGHTSCRIPT_STOP")]
    Stopped,
    #[serde(rename = "EXIT_SETTINGS_UPDATE")]
    SettingsUpdate,
    #[serde(rename = "EXIT_POWER_MODE")]
    PowerMode,
    #[serde(rename = "EXIT_PACKAGER_DONE")]
    PackagerDone,
    #[serde(rename = "EXIT_INVALID_PCODE")]
    InvalidPcode,
    #[serde(rename = "EXIT_MISSING_PASSWORD")]
    MissingPassword,
    #[serde(rename = "EXIT_UNPACK_FAILED")]
    UnpackFailed,
}

impl AppExitReason {
    const ALL: [AppExitReason; 12] = [
        AppExitReason::Unknown,
        AppExitReason::Finished,
        AppExitReason::Crashed,
        AppExitReason::UnknownFunction,
        AppExitReason::UserNav,
        AppExitReason::Stopped,
        AppExitReason::SettingsUpdate,
        AppExitReason::PowerMode,
        AppExitReason::PackagerDone,
        AppExitReason::InvalidPcode,
        AppExitReason::MissingPassword,
        AppExitReason::UnpackFailed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AppExitReason::Unknown => "EXIT_UNKNOWN",
            AppExitReason::Finished => "EXIT_FINISHED",
            AppExitReason::Crashed => "EXIT_BRIGHTSCRIPT_CRASH",
            AppExitReason::UnknownFunction => "EXIT_BRIGHTSCRIPT_UNK_FUNC",
            AppExitReason::UserNav => "EXIT_USER_NAV",
            AppExitReason::Stopped => "EXIT_BRIGHTSCRIPT_STOP",
            AppExitReason::SettingsUpdate => "EXIT_SETTINGS_UPDATE",
            AppExitReason::PowerMode => "EXIT_POWER_MODE",
            AppExitReason::PackagerDone => "EXIT_PACKAGER_DONE",
            AppExitReason::InvalidPcode => "EXIT_INVALID_PCODE",
            AppExitReason::MissingPassword => "EXIT_MISSING_PASSWORD",
            AppExitReason::UnpackFailed => "EXIT_UNPACK_FAILED",
        }
    }

    /// Parse a reason string; unrecognized text maps to `Unknown`
    pub fn parse(text: &str) -> AppExitReason {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == text)
            .unwrap_or(AppExitReason::Unknown)
    }
}

impl fmt::Display for AppExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a task thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    Init,
    Run,
    Stop,
    Done,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TaskState::Init => "INIT",
            TaskState::Run => "RUN",
            TaskState::Stop => "STOP",
            TaskState::Done => "DONE",
        };
        f.write_str(text)
    }
}

/// A message posted from an execution context to its host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum HostMessage {
    Print(String),
    Warning(String),
    Error(String),
    Debug(String),
    Start(String),
    End(AppExitReason),
    Version(String),
    /// Structured record from an extension
    Extension {
        name: String,
        info: serde_json::Value,
    },
    /// Task lifecycle change
    TaskState { id: u32, state: TaskState },
}

impl fmt::Display for HostMessage {
    /// The `kind,payload` wire form
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostMessage::Print(text) => write!(f, "print,{text}"),
            HostMessage::Warning(text) => write!(f, "warning,{text}"),
            HostMessage::Error(text) => write!(f, "error,{text}"),
            HostMessage::Debug(text) => write!(f, "debug,{text}"),
            HostMessage::Start(text) => write!(f, "start,{text}"),
            HostMessage::End(reason) => write!(f, "end,{reason}"),
            HostMessage::Version(text) => write!(f, "version,{text}"),
            HostMessage::Extension { name, info } => write!(f, "extension,{name},{info}"),
            HostMessage::TaskState { id, state } => write!(f, "task,{id},{state}"),
        }
    }
}

/// Sending half of a message channel; cheap to clone
#[derive(Debug, Clone)]
pub struct MessageSender {
    inner: UnboundedSender<HostMessage>,
}

impl MessageSender {
    /// Post a message; returns false once the receiver is gone
    pub fn send(&self, message: HostMessage) -> bool {
        match self.inner.send(message) {
            Ok(()) => true,
            Err(e) => {
                log::trace!("message dropped, receiver closed: {}", e.0);
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Receiving half of a message channel
#[derive(Debug)]
pub struct MessageReceiver {
    inner: UnboundedReceiver<HostMessage>,
}

impl MessageReceiver {
    /// Next message if one is already queued
    pub fn try_recv(&mut self) -> Option<HostMessage> {
        self.inner.try_recv().ok()
    }

    /// Block the current (non-async) thread until a message arrives or all senders are gone
    pub fn blocking_recv(&mut self) -> Option<HostMessage> {
        self.inner.blocking_recv()
    }

    pub async fn recv(&mut self) -> Option<HostMessage> {
        self.inner.recv().await
    }

    /// Every message queued right now
    pub fn drain(&mut self) -> Vec<HostMessage> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

/// An unbounded, ordered message channel
pub fn channel() -> (MessageSender, MessageReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MessageSender { inner: tx }, MessageReceiver { inner: rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        assert_eq!(HostMessage::Print("hi\n".into()).to_string(), "print,hi\n");
        assert_eq!(
            HostMessage::End(AppExitReason::UserNav).to_string(),
            "end,EXIT_USER_NAV"
        );
        assert_eq!(
            HostMessage::TaskState {
                id: 2,
                state: TaskState::Run
            }
            .to_string(),
            "task,2,RUN"
        );
    }

    #[test]
    fn test_exit_reason_parse() {
        assert_eq!(
            AppExitReason::parse("EXIT_BRIGHTSCRIPT_CRASH"),
            AppExitReason::Crashed
        );
        assert_eq!(AppExitReason::parse("nonsense"), AppExitReason::Unknown);
    }

    #[test]
    fn test_exit_reason_serde_names() {
        let json = serde_json::to_string(&AppExitReason::UnknownFunction).unwrap();
        assert_eq!(json, "\"EXIT_BRIGHTSCRIPT_UNK_FUNC\"");
        let back: AppExitReason = serde_json::from_str("\"EXIT_POWER_MODE\"").unwrap();
        assert_eq!(back, AppExitReason::PowerMode);
    }

    #[test]
    fn test_structured_message_json() {
        let msg = HostMessage::Extension {
            name: "sg".into(),
            info: serde_json::json!({"nodes": 3}),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["kind"], "extension");
        assert_eq!(json["payload"]["name"], "sg");
    }

    #[test]
    fn test_channel_preserves_order() {
        let (tx, mut rx) = channel();
        tx.send(HostMessage::Start("app".into()));
        tx.send(HostMessage::Print("1".into()));
        tx.send(HostMessage::End(AppExitReason::Finished));
        let kinds: Vec<String> = rx.drain().iter().map(ToString::to_string).collect();
        assert_eq!(kinds, vec!["start,app", "print,1", "end,EXIT_FINISHED"]);
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (tx, rx) = channel();
        drop(rx);
        assert!(!tx.send(HostMessage::Print("lost".into())));
        assert!(tx.is_closed());
    }

    #[test]
    fn test_blocking_recv_across_threads() {
        let (tx, mut rx) = channel();
        let handle = std::thread::spawn(move || {
            tx.send(HostMessage::Debug("paused".into()));
        });
        assert_eq!(rx.blocking_recv(), Some(HostMessage::Debug("paused".into())));
        handle.join().unwrap();
        assert_eq!(rx.blocking_recv(), None);
    }
}
