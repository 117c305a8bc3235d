pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod session;
pub mod state;
pub mod store;
pub mod transport;
pub mod window;

pub use cancel::{CancelHandle, CancelToken, RunGuard, RunTokens, Track};
pub use client::{ProblemSolver, SolverClient, DEBUG_ROUTE, EXTRACT_ROUTE, GENERATE_ROUTE};
pub use config::{AppConfig, WindowConfig};
pub use error::{classify_message, classify_status, ErrorKind, SolveError};
pub use orchestrator::{Orchestrator, ProcessOutcome};
pub use retry::RetryPolicy;
pub use session::Session;
pub use state::AppState;
pub use store::{ScreenshotStore, StoreError, StoreResult};
pub use transport::{HttpTransport, Transport, TransportResponse};
pub use window::{Bounds, WindowGeometry};
