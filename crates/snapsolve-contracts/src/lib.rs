pub mod events;
pub mod problem;
pub mod screenshots;
pub mod view;

pub use events::{EventPayload, EventSink, EventWriter, FanoutSink, MemorySink, ProcessingEvent};
pub use problem::{CodeSnippet, ProblemExample, ProblemInfo, SolutionSet};
pub use screenshots::{QueueKind, ScreenshotQueues, ScreenshotRef, DEFAULT_MAX_SCREENSHOTS};
pub use view::{ParseViewError, View};
