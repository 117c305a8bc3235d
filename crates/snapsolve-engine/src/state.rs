use snapsolve_contracts::{ProblemInfo, View};

use crate::store::ScreenshotStore;
use crate::window::WindowGeometry;

/// Everything the overlay knows about the current session.
///
/// Constructed once by the owning `Session` and lent to the orchestrator as
/// `&mut AppState` for the length of a run.
#[derive(Debug, Clone)]
pub struct AppState {
    view: View,
    problem_info: Option<ProblemInfo>,
    has_debugged: bool,
    window: WindowGeometry,
    screenshots: ScreenshotStore,
}

impl AppState {
    pub fn new(screenshots: ScreenshotStore, window: WindowGeometry) -> Self {
        let mut state = Self {
            view: View::Queue,
            problem_info: None,
            has_debugged: false,
            window,
            screenshots,
        };
        state.set_view(View::Queue);
        state
    }

    pub fn view(&self) -> View {
        self.view
    }

    /// Also switches which screenshot queue is active.
    pub fn set_view(&mut self, view: View) {
        if self.view != view {
            tracing::debug!(from = %self.view, to = %view, "view change");
        }
        self.view = view;
        self.screenshots.set_view(view);
    }

    pub fn problem_info(&self) -> Option<&ProblemInfo> {
        self.problem_info.as_ref()
    }

    pub fn set_problem_info(&mut self, problem_info: Option<ProblemInfo>) {
        self.problem_info = problem_info;
    }

    pub fn has_debugged(&self) -> bool {
        self.has_debugged
    }

    pub fn set_has_debugged(&mut self, value: bool) {
        self.has_debugged = value;
    }

    pub fn window(&self) -> &WindowGeometry {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut WindowGeometry {
        &mut self.window
    }

    pub fn screenshots(&self) -> &ScreenshotStore {
        &self.screenshots
    }

    pub fn screenshots_mut(&mut self) -> &mut ScreenshotStore {
        &mut self.screenshots
    }

    /// Resizes the window to fit rendered content.
    pub fn set_content_dimensions(&mut self, width: f64, height: f64) {
        if width <= 0.0 || height <= 0.0 {
            return;
        }
        let has_debugged = self.has_debugged;
        self.window
            .set_content_dimensions(width, height, has_debugged);
    }

    /// Forgets the problem and any debug pass, and returns to the queue view.
    /// Queued screenshots are kept.
    pub fn reset_problem(&mut self) {
        self.has_debugged = false;
        self.problem_info = None;
        self.set_view(View::Queue);
    }

    /// `reset_problem` plus emptying both queues (deleting their files).
    pub fn clear_queues(&mut self) {
        let removed = self.screenshots.clear_all();
        tracing::debug!(removed, "queues cleared");
        self.reset_problem();
    }
}
