use std::sync::Arc;

use snapsolve_contracts::{EventSink, ProcessingEvent, SolutionSet, View};

use crate::cancel::{CancelHandle, RunGuard, RunTokens, Track};
use crate::client::ProblemSolver;
use crate::error::{ErrorKind, SolveError, DEBUG_CANCELED_MESSAGE};
use crate::state::AppState;
use crate::store::encode_screenshots;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    NoScreenshots,
    Solved,
    Debugged,
    Canceled,
    Failed(ErrorKind),
}

/// Drives screenshot -> extract -> generate, or screenshot -> debug once
/// solutions are showing.
///
/// Results reach the UI only as `ProcessingEvent`s. On failure the state is
/// left consistent: primary failures return to the queue view, debug failures
/// leave the view alone. A canceled run on either track forgets the problem
/// and the debug flag; a timeout additionally empties the queues.
pub struct Orchestrator {
    solver: Arc<dyn ProblemSolver>,
    events: Arc<dyn EventSink>,
    tokens: RunTokens,
}

impl Orchestrator {
    pub fn new(solver: Arc<dyn ProblemSolver>, events: Arc<dyn EventSink>) -> Self {
        Self {
            solver,
            events,
            tokens: RunTokens::new(),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::new(self.tokens.clone())
    }

    pub fn is_processing(&self, track: Track) -> bool {
        self.tokens.is_live(track)
    }

    pub fn process(&self, state: &mut AppState) -> ProcessOutcome {
        tracing::info!(view = %state.view(), "processing screenshots");
        match state.view() {
            View::Queue => self.process_primary(state),
            View::Solutions | View::Debug => self.process_debug(state),
        }
    }

    /// Aborts in-flight runs, resets the debug flag, forgets the problem and
    /// returns to the queue view. Queued screenshots are kept. Returns whether
    /// a run was in flight.
    pub fn cancel(&self, state: &mut AppState) -> bool {
        let was_live = self.tokens.cancel_all();
        if was_live {
            tracing::info!("canceled in-flight processing");
        }
        state.reset_problem();
        was_live
    }

    fn process_primary(&self, state: &mut AppState) -> ProcessOutcome {
        if state.screenshots().main_paths().is_empty() {
            self.notify(ProcessingEvent::NoScreenshots);
            return ProcessOutcome::NoScreenshots;
        }

        self.notify(ProcessingEvent::InitialStart);
        let run = self.tokens.begin(Track::Primary);
        match self.run_primary(state, &run) {
            Ok(solution) => {
                let cleared = state.screenshots_mut().clear_extra();
                tracing::debug!(cleared, "extra queue cleared before showing solutions");
                state.set_view(View::Solutions);
                self.notify(ProcessingEvent::SolutionSuccess(solution));
                ProcessOutcome::Solved
            }
            Err(err) => self.fail_primary(state, settle(&run, err)),
        }
    }

    fn run_primary(&self, state: &mut AppState, run: &RunGuard) -> Result<SolutionSet, SolveError> {
        let images = encode_screenshots(&state.screenshots().main_paths())?;

        let problem = self.solver.extract(&images, run.token())?;
        run.ensure_current()?;
        state.set_problem_info(Some(problem.clone()));
        self.notify(ProcessingEvent::ProblemExtracted(problem.clone()));

        let solution = self.solver.generate(&problem, run.token())?;
        run.ensure_current()?;
        Ok(solution)
    }

    fn fail_primary(&self, state: &mut AppState, err: SolveError) -> ProcessOutcome {
        let kind = err.kind();
        tracing::warn!(?kind, error = %err, "primary pipeline failed");
        match kind {
            ErrorKind::Canceled => {
                state.reset_problem();
                self.notify(ProcessingEvent::InitialSolutionError(err.user_message()));
                return ProcessOutcome::Canceled;
            }
            ErrorKind::Timeout => {
                state.clear_queues();
                self.notify(ProcessingEvent::ResetView);
                self.notify(ProcessingEvent::InitialSolutionError(err.user_message()));
            }
            ErrorKind::CreditsExhausted => {
                state.set_view(View::Queue);
                self.notify(ProcessingEvent::ApiKeyOutOfCredits);
            }
            ErrorKind::InvalidCredential => {
                state.set_view(View::Queue);
                self.notify(ProcessingEvent::ApiKeyInvalid);
                self.notify(ProcessingEvent::InitialSolutionError(err.user_message()));
            }
            _ => {
                state.set_view(View::Queue);
                self.notify(ProcessingEvent::InitialSolutionError(err.user_message()));
            }
        }
        ProcessOutcome::Failed(kind)
    }

    fn process_debug(&self, state: &mut AppState) -> ProcessOutcome {
        if state.screenshots().extra_paths().is_empty() {
            self.notify(ProcessingEvent::NoScreenshots);
            return ProcessOutcome::NoScreenshots;
        }

        self.notify(ProcessingEvent::DebugStart);
        let run = self.tokens.begin(Track::Debug);
        match self.run_debug(state, &run) {
            Ok(solution) => {
                state.set_has_debugged(true);
                self.notify(ProcessingEvent::DebugSuccess(solution));
                ProcessOutcome::Debugged
            }
            Err(err) => self.fail_debug(state, settle(&run, err)),
        }
    }

    fn run_debug(&self, state: &AppState, run: &RunGuard) -> Result<SolutionSet, SolveError> {
        let problem = state
            .problem_info()
            .cloned()
            .ok_or(SolveError::MissingProblemInfo)?;
        let mut paths = state.screenshots().main_paths();
        paths.extend(state.screenshots().extra_paths());
        let images = encode_screenshots(&paths)?;
        tracing::debug!(images = images.len(), "debugging with combined screenshots");

        let solution = self.solver.debug(&images, &problem, run.token())?;
        run.ensure_current()?;
        Ok(solution)
    }

    fn fail_debug(&self, state: &mut AppState, err: SolveError) -> ProcessOutcome {
        let kind = err.kind();
        tracing::warn!(?kind, error = %err, "debug pipeline failed");
        match kind {
            ErrorKind::Canceled => {
                state.reset_problem();
                self.notify(ProcessingEvent::DebugError(
                    DEBUG_CANCELED_MESSAGE.to_string(),
                ));
                return ProcessOutcome::Canceled;
            }
            ErrorKind::Timeout => {
                state.clear_queues();
                self.notify(ProcessingEvent::ResetView);
            }
            ErrorKind::CreditsExhausted => self.notify(ProcessingEvent::ApiKeyOutOfCredits),
            ErrorKind::InvalidCredential => self.notify(ProcessingEvent::ApiKeyInvalid),
            _ => {}
        }
        self.notify(ProcessingEvent::DebugError(err.user_message()));
        ProcessOutcome::Failed(kind)
    }

    fn notify(&self, event: ProcessingEvent) {
        tracing::debug!(event = event.event_type(), "lifecycle event");
        if let Err(err) = self.events.emit(&event) {
            tracing::warn!(?err, event = event.event_type(), "event sink rejected event");
        }
    }
}

/// A run whose token was aborted reports `Canceled`, whatever the transport
/// made of the dropped connection.
fn settle(run: &RunGuard, err: SolveError) -> SolveError {
    if run.token().is_canceled() {
        SolveError::Canceled
    } else {
        err
    }
}
