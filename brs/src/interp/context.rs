//! Per-interpreter runtime context: device, manifest, host channel, heap statistics

use super::component::HeapStats;
use crate::preprocessor::Manifest;
use crate::runtime::config::{DeviceInfo, ExecutionOptions};
use crate::task::message::{HostMessage, MessageSender};
use crate::task::shared::SharedRegion;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

/// Everything an interpreter needs from its host
pub struct RuntimeContext {
    pub device: DeviceInfo,
    pub manifest: Manifest,
    /// Control region shared with the host; enables debugger commands
    pub region: Option<Arc<SharedRegion>>,
    pub messages: MessageSender,
    pub heap: Rc<HeapStats>,
    pub options: ExecutionOptions,
    /// Source text keyed by path, for debugger listings
    pub sources: BTreeMap<String, String>,
}

impl RuntimeContext {
    pub fn new(messages: MessageSender) -> Self {
        Self {
            device: DeviceInfo::default(),
            manifest: Manifest::new(),
            region: None,
            messages,
            heap: HeapStats::new(),
            options: ExecutionOptions::default(),
            sources: BTreeMap::new(),
        }
    }

    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn with_device(mut self, device: DeviceInfo) -> Self {
        self.device = device;
        self
    }

    pub fn with_region(mut self, region: Arc<SharedRegion>) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_sources(mut self, sources: BTreeMap<String, String>) -> Self {
        self.sources = sources;
        self
    }

    /// Text of `line` (1-based) in `file`, without its line ending
    pub fn source_line(&self, file: &str, line: u32) -> Option<&str> {
        let index = usize::try_from(line).ok()?.checked_sub(1)?;
        self.sources
            .get(file)?
            .lines()
            .nth(index)
            .map(|text| text.trim_end_matches('\r'))
    }

    pub fn post(&self, message: HostMessage) {
        self.messages.send(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::message::channel;

    #[test]
    fn test_builder_and_post() {
        let (tx, mut rx) = channel();
        let region = Arc::new(SharedRegion::new());
        let ctx = RuntimeContext::new(tx)
            .with_region(Arc::clone(&region))
            .with_options(ExecutionOptions::default().max_call_depth(5));
        assert!(ctx.region.is_some());
        assert_eq!(ctx.options.max_call_depth, 5);
        ctx.post(HostMessage::Warning("careful".into()));
        assert_eq!(rx.try_recv(), Some(HostMessage::Warning("careful".into())));
    }

    #[test]
    fn test_source_line_lookup() {
        let (tx, _rx) = channel();
        let ctx = RuntimeContext::new(tx).with_sources(BTreeMap::from([(
            "main.brs".to_string(),
            "sub main()\r\n  print 1\r\nend sub\r\n".to_string(),
        )]));
        assert_eq!(ctx.source_line("main.brs", 2), Some("  print 1"));
        assert_eq!(ctx.source_line("main.brs", 0), None);
        assert_eq!(ctx.source_line("main.brs", 9), None);
        assert_eq!(ctx.source_line("other.brs", 1), None);
    }
}
