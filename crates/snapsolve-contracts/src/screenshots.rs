use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::view::View;

pub const DEFAULT_MAX_SCREENSHOTS: usize = 5;

/// A captured screenshot: the file on disk plus an encoded preview thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotRef {
    pub path: PathBuf,
    pub preview: Vec<u8>,
}

impl ScreenshotRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            preview: Vec::new(),
        }
    }

    pub fn with_preview(mut self, preview: Vec<u8>) -> Self {
        self.preview = preview;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Main,
    Extra,
}

/// Two bounded FIFO queues of screenshots.
///
/// The main queue holds the problem screenshots, the extra queue holds
/// follow-up screenshots taken once solutions are showing. The current view
/// decides which one is "active" for `enqueue` and `list`.
#[derive(Debug, Clone)]
pub struct ScreenshotQueues {
    main: VecDeque<ScreenshotRef>,
    extra: VecDeque<ScreenshotRef>,
    view: View,
    max_len: usize,
}

impl Default for ScreenshotQueues {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SCREENSHOTS)
    }
}

impl ScreenshotQueues {
    pub fn new(max_len: usize) -> Self {
        Self {
            main: VecDeque::new(),
            extra: VecDeque::new(),
            view: View::Queue,
            max_len: max_len.max(1),
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn set_view(&mut self, view: View) {
        self.view = view;
    }

    pub fn active_kind(&self) -> QueueKind {
        if self.view.uses_extra_queue() {
            QueueKind::Extra
        } else {
            QueueKind::Main
        }
    }

    /// Appends to the active queue and returns whatever fell off the front.
    pub fn enqueue(&mut self, shot: ScreenshotRef) -> Vec<ScreenshotRef> {
        self.enqueue_into(self.active_kind(), shot)
    }

    pub fn enqueue_into(&mut self, kind: QueueKind, shot: ScreenshotRef) -> Vec<ScreenshotRef> {
        let max_len = self.max_len;
        let queue = self.queue_mut(kind);
        queue.retain(|existing| existing.path != shot.path);
        queue.push_back(shot);
        let mut evicted = Vec::new();
        while queue.len() > max_len {
            if let Some(oldest) = queue.pop_front() {
                evicted.push(oldest);
            }
        }
        evicted
    }

    /// Snapshot of the active queue in insertion order.
    pub fn list(&self) -> Vec<ScreenshotRef> {
        self.snapshot(self.active_kind())
    }

    pub fn snapshot(&self, kind: QueueKind) -> Vec<ScreenshotRef> {
        self.queue(kind).iter().cloned().collect()
    }

    pub fn paths(&self, kind: QueueKind) -> Vec<PathBuf> {
        self.queue(kind)
            .iter()
            .map(|shot| shot.path.clone())
            .collect()
    }

    pub fn len(&self, kind: QueueKind) -> usize {
        self.queue(kind).len()
    }

    pub fn is_empty(&self, kind: QueueKind) -> bool {
        self.queue(kind).is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.main
            .iter()
            .chain(self.extra.iter())
            .any(|shot| shot.path == path)
    }

    /// Removes `path` from whichever queue holds it. Returns `false` when absent.
    pub fn remove(&mut self, path: &Path) -> bool {
        let before = self.main.len() + self.extra.len();
        self.main.retain(|shot| shot.path != path);
        self.extra.retain(|shot| shot.path != path);
        self.main.len() + self.extra.len() != before
    }

    pub fn clear_extra(&mut self) -> Vec<ScreenshotRef> {
        self.extra.drain(..).collect()
    }

    pub fn clear_all(&mut self) -> Vec<ScreenshotRef> {
        let mut removed: Vec<ScreenshotRef> = self.main.drain(..).collect();
        removed.extend(self.extra.drain(..));
        removed
    }

    fn queue(&self, kind: QueueKind) -> &VecDeque<ScreenshotRef> {
        match kind {
            QueueKind::Main => &self.main,
            QueueKind::Extra => &self.extra,
        }
    }

    fn queue_mut(&mut self, kind: QueueKind) -> &mut VecDeque<ScreenshotRef> {
        match kind {
            QueueKind::Main => &mut self.main,
            QueueKind::Extra => &mut self.extra,
        }
    }
}
