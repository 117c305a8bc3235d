use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use snapsolve_contracts::{EventSink, ProcessingEvent, ScreenshotRef};

use crate::cancel::CancelHandle;
use crate::client::{ProblemSolver, SolverClient};
use crate::config::AppConfig;
use crate::orchestrator::{Orchestrator, ProcessOutcome};
use crate::state::AppState;
use crate::store::ScreenshotStore;
use crate::window::WindowGeometry;

/// One overlay session: the state plus the pipeline that mutates it.
///
/// This is the surface a shell (CLI, hotkey daemon) drives.
pub struct Session {
    state: AppState,
    orchestrator: Orchestrator,
    events: Arc<dyn EventSink>,
}

impl Session {
    pub fn new(
        config: &AppConfig,
        solver: Arc<dyn ProblemSolver>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let state = AppState::new(
            ScreenshotStore::new(config.screenshot_dir(), config.max_screenshots()),
            WindowGeometry::from_config(&config.window),
        );
        Self {
            state,
            orchestrator: Orchestrator::new(solver, events.clone()),
            events,
        }
    }

    /// Session backed by the HTTP solving client.
    pub fn from_config(config: &AppConfig, events: Arc<dyn EventSink>) -> Self {
        tracing::info!(api_base = %config.api_base(), language = %config.language, "starting session");
        Self::new(config, Arc::new(SolverClient::from_config(config)), events)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.orchestrator.cancel_handle()
    }

    /// Queues a captured image on whichever queue the current view uses.
    pub fn take_screenshot(&mut self, source: &Path) -> Result<ScreenshotRef> {
        let shot = self
            .state
            .screenshots_mut()
            .import(source)
            .with_context(|| format!("failed to queue {}", source.display()))?;
        self.notify(ProcessingEvent::ScreenshotTaken {
            path: shot.path.clone(),
        });
        Ok(shot)
    }

    /// Screenshots of the active queue, oldest first, with previews.
    pub fn screenshots(&self) -> Vec<ScreenshotRef> {
        self.state.screenshots().list()
    }

    pub fn delete_screenshot(&mut self, path: &Path) -> Result<bool> {
        let removed = self
            .state
            .screenshots_mut()
            .delete(path)
            .with_context(|| format!("failed to delete {}", path.display()))?;
        if removed {
            self.notify(ProcessingEvent::ScreenshotDeleted {
                path: path.to_path_buf(),
            });
        }
        Ok(removed)
    }

    pub fn process(&mut self) -> ProcessOutcome {
        self.orchestrator.process(&mut self.state)
    }

    pub fn cancel(&mut self) -> bool {
        self.orchestrator.cancel(&mut self.state)
    }

    /// Cancel, drop every queued screenshot and tell the UI to start over.
    pub fn reset(&mut self) {
        self.orchestrator.cancel(&mut self.state);
        self.state.clear_queues();
        self.notify(ProcessingEvent::ResetView);
    }

    pub fn set_content_dimensions(&mut self, width: f64, height: f64) {
        self.state.set_content_dimensions(width, height);
    }

    pub fn move_left(&mut self) {
        self.state.window_mut().move_left();
    }

    pub fn move_right(&mut self) {
        self.state.window_mut().move_right();
    }

    pub fn move_up(&mut self) {
        self.state.window_mut().move_up();
    }

    pub fn move_down(&mut self) {
        self.state.window_mut().move_down();
    }

    /// Returns whether the window is visible afterwards.
    pub fn toggle_window(&mut self) -> bool {
        self.state.window_mut().toggle()
    }

    fn notify(&self, event: ProcessingEvent) {
        if let Err(err) = self.events.emit(&event) {
            tracing::warn!(?err, event = event.event_type(), "event sink rejected event");
        }
    }
}
