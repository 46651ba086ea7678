//! Console output of rendered pages.
//!
//! Messages logged by server scripts are captured per page so the runtime
//! can forward them to `tracing` and attach console errors to a failed
//! render.

use chromiumoxide::cdp::js_protocol::runtime::{ConsoleApiCalledType, EventConsoleApiCalled};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleLevel {
    Log,
    Info,
    Warning,
    Error,
    Debug,
    Other,
}

impl ConsoleLevel {
    pub fn is_error(&self) -> bool {
        matches!(self, ConsoleLevel::Error)
    }
}

impl From<&EventConsoleApiCalled> for ConsoleLevel {
    fn from(event: &EventConsoleApiCalled) -> Self {
        match event.r#type {
            ConsoleApiCalledType::Log => ConsoleLevel::Log,
            ConsoleApiCalledType::Info => ConsoleLevel::Info,
            ConsoleApiCalledType::Warning => ConsoleLevel::Warning,
            ConsoleApiCalledType::Error => ConsoleLevel::Error,
            ConsoleApiCalledType::Debug => ConsoleLevel::Debug,
            _ => ConsoleLevel::Other,
        }
    }
}

/// A captured console message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleMessage {
    pub level: ConsoleLevel,
    /// Arguments joined with spaces
    pub text: String,
    /// `url:line:column` of the call, if known
    pub source: Option<String>,
}

impl ConsoleMessage {
    pub fn new(level: ConsoleLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            source: None,
        }
    }
}

impl fmt::Display for ConsoleMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{} ({source})", self.text),
            None => f.write_str(&self.text),
        }
    }
}

/// Shared, append-only message buffer. Clones share the buffer.
#[derive(Debug, Clone, Default)]
pub struct ConsoleCapture {
    messages: Arc<Mutex<Vec<ConsoleMessage>>>,
}

impl ConsoleCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, message: ConsoleMessage) {
        self.messages.lock().push(message);
    }

    /// Snapshot of every message in arrival order.
    pub fn messages(&self) -> Vec<ConsoleMessage> {
        self.messages.lock().clone()
    }

    pub fn errors(&self) -> Vec<ConsoleMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.level.is_error())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn parse_console_event(event: &EventConsoleApiCalled) -> ConsoleMessage {
    let text = event
        .args
        .iter()
        .map(|arg| match &arg.value {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(value) => value.to_string(),
            None => arg
                .description
                .clone()
                .unwrap_or_else(|| "<object>".to_string()),
        })
        .collect::<Vec<_>>()
        .join(" ");

    let mut message = ConsoleMessage::new(ConsoleLevel::from(event), text);
    if let Some(frame) = event
        .stack_trace
        .as_ref()
        .and_then(|trace| trace.call_frames.first())
    {
        message.source = Some(format!(
            "{}:{}:{}",
            frame.url, frame.line_number, frame.column_number
        ));
    }
    message
}
