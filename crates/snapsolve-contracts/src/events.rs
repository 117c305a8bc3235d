use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::problem::{ProblemInfo, SolutionSet};

pub type EventPayload = Map<String, Value>;

pub const NO_SCREENSHOTS: &str = "processing-no-screenshots";
pub const INITIAL_START: &str = "initial-start";
pub const PROBLEM_EXTRACTED: &str = "problem-extracted";
pub const SOLUTION_SUCCESS: &str = "solution-success";
pub const INITIAL_SOLUTION_ERROR: &str = "solution-error";
pub const DEBUG_START: &str = "debug-start";
pub const DEBUG_SUCCESS: &str = "debug-success";
pub const DEBUG_ERROR: &str = "debug-error";
pub const API_KEY_OUT_OF_CREDITS: &str = "processing-api-key-out-of-credits";
pub const API_KEY_INVALID: &str = "processing-api-key-invalid";
pub const RESET_VIEW: &str = "reset-view";
pub const SCREENSHOT_TAKEN: &str = "screenshot-taken";
pub const SCREENSHOT_DELETED: &str = "screenshot-deleted";

/// Lifecycle notifications pushed toward the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingEvent {
    NoScreenshots,
    InitialStart,
    ProblemExtracted(ProblemInfo),
    SolutionSuccess(SolutionSet),
    InitialSolutionError(String),
    DebugStart,
    DebugSuccess(SolutionSet),
    DebugError(String),
    ApiKeyOutOfCredits,
    ApiKeyInvalid,
    ResetView,
    ScreenshotTaken { path: PathBuf },
    ScreenshotDeleted { path: PathBuf },
}

impl ProcessingEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::NoScreenshots => NO_SCREENSHOTS,
            Self::InitialStart => INITIAL_START,
            Self::ProblemExtracted(_) => PROBLEM_EXTRACTED,
            Self::SolutionSuccess(_) => SOLUTION_SUCCESS,
            Self::InitialSolutionError(_) => INITIAL_SOLUTION_ERROR,
            Self::DebugStart => DEBUG_START,
            Self::DebugSuccess(_) => DEBUG_SUCCESS,
            Self::DebugError(_) => DEBUG_ERROR,
            Self::ApiKeyOutOfCredits => API_KEY_OUT_OF_CREDITS,
            Self::ApiKeyInvalid => API_KEY_INVALID,
            Self::ResetView => RESET_VIEW,
            Self::ScreenshotTaken { .. } => SCREENSHOT_TAKEN,
            Self::ScreenshotDeleted { .. } => SCREENSHOT_DELETED,
        }
    }

    pub fn payload(&self) -> EventPayload {
        let mut payload = EventPayload::new();
        match self {
            Self::ProblemExtracted(problem) => {
                payload.insert(
                    "problem_info".to_string(),
                    serde_json::to_value(problem).unwrap_or(Value::Null),
                );
            }
            Self::SolutionSuccess(solution) | Self::DebugSuccess(solution) => {
                payload.insert(
                    "solution".to_string(),
                    serde_json::to_value(solution).unwrap_or(Value::Null),
                );
            }
            Self::InitialSolutionError(message) | Self::DebugError(message) => {
                payload.insert("error".to_string(), Value::String(message.clone()));
            }
            Self::ScreenshotTaken { path } | Self::ScreenshotDeleted { path } => {
                payload.insert(
                    "path".to_string(),
                    Value::String(path.to_string_lossy().to_string()),
                );
            }
            Self::NoScreenshots
            | Self::InitialStart
            | Self::DebugStart
            | Self::ApiKeyOutOfCredits
            | Self::ApiKeyInvalid
            | Self::ResetView => {}
        }
        payload
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::InitialSolutionError(_)
                | Self::DebugError(_)
                | Self::ApiKeyOutOfCredits
                | Self::ApiKeyInvalid
        )
    }
}

/// Receiver of lifecycle events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &ProcessingEvent) -> anyhow::Result<()>;
}

/// Append-only writer for `events.jsonl`.
///
/// Each line is the event payload wrapped in an envelope of `type`,
/// `session_id`, `seq` and `ts`. Envelope keys are reserved: a payload key
/// with the same name is replaced. `seq` counts up from 0 per writer.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    session_id: String,
    seq: Mutex<u64>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                session_id: session_id.into(),
                seq: Mutex::new(0),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn write(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut seq = self
            .inner
            .seq
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut event = payload;
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        event.insert("seq".to_string(), Value::from(*seq));
        event.insert("ts".to_string(), Value::String(now_utc_iso()));

        let line = serde_json::to_string(&event)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        *seq += 1;

        Ok(Value::Object(event))
    }
}

impl EventSink for EventWriter {
    fn emit(&self, event: &ProcessingEvent) -> anyhow::Result<()> {
        self.write(event.event_type(), event.payload())?;
        Ok(())
    }
}

/// Forwards each event to every inner sink; the first failure is returned
/// after all sinks have been tried.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &ProcessingEvent) -> anyhow::Result<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(err) = sink.emit(event) {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Keeps events in memory, for embedders that poll instead of subscribing.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ProcessingEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<ProcessingEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn drain(&self) -> Vec<ProcessingEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.snapshot()
            .iter()
            .map(ProcessingEvent::event_type)
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &ProcessingEvent) -> anyhow::Result<()> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
