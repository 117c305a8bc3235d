use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::SolveError;

const SLEEP_SLICE: Duration = Duration::from_millis(25);

/// Shared abort flag threaded through every request of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    canceled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), SolveError> {
        if self.is_canceled() {
            Err(SolveError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Sleeps for `duration` unless canceled first. Returns `false` on cancel.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_canceled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    Primary,
    Debug,
}

#[derive(Debug, Default)]
struct TokenSlot {
    generation: u64,
    live: Option<CancelToken>,
}

#[derive(Debug, Default)]
struct Slots {
    primary: TokenSlot,
    debug: TokenSlot,
}

impl Slots {
    fn slot_mut(&mut self, track: Track) -> &mut TokenSlot {
        match track {
            Track::Primary => &mut self.primary,
            Track::Debug => &mut self.debug,
        }
    }
}

/// Live run tokens for both pipeline tracks.
///
/// Beginning a run on a track cancels whatever token that track still holds
/// and bumps its generation, so an older run can tell it has been superseded.
#[derive(Debug, Clone, Default)]
pub struct RunTokens {
    slots: Arc<Mutex<Slots>>,
}

impl RunTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, track: Track) -> RunGuard {
        let token = CancelToken::new();
        let generation = {
            let mut slots = self.lock();
            let slot = slots.slot_mut(track);
            if let Some(previous) = slot.live.take() {
                tracing::debug!(?track, "superseding in-flight run");
                previous.cancel();
            }
            slot.generation += 1;
            slot.live = Some(token.clone());
            slot.generation
        };
        RunGuard {
            tokens: self.clone(),
            track,
            generation,
            token,
        }
    }

    /// Cancels every live token. Returns whether anything was in flight.
    pub fn cancel_all(&self) -> bool {
        let mut slots = self.lock();
        let mut canceled = false;
        for track in [Track::Primary, Track::Debug] {
            if let Some(token) = slots.slot_mut(track).live.take() {
                token.cancel();
                canceled = true;
            }
        }
        canceled
    }

    pub fn is_live(&self, track: Track) -> bool {
        self.lock().slot_mut(track).live.is_some()
    }

    fn generation(&self, track: Track) -> u64 {
        self.lock().slot_mut(track).generation
    }

    fn release(&self, track: Track, generation: u64) {
        let mut slots = self.lock();
        let slot = slots.slot_mut(track);
        if slot.generation == generation {
            slot.live = None;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One run's claim on a track. Dropping it clears the slot unless a newer run
/// has already replaced it.
#[derive(Debug)]
pub struct RunGuard {
    tokens: RunTokens,
    track: Track,
    generation: u64,
    token: CancelToken,
}

impl RunGuard {
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn track(&self) -> Track {
        self.track
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True while this run is neither canceled nor superseded.
    pub fn is_current(&self) -> bool {
        !self.token.is_canceled() && self.tokens.generation(self.track) == self.generation
    }

    pub fn ensure_current(&self) -> Result<(), SolveError> {
        if self.is_current() {
            Ok(())
        } else {
            Err(SolveError::Canceled)
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.tokens.release(self.track, self.generation);
    }
}

/// Cloneable handle that aborts in-flight runs from another thread.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tokens: RunTokens,
}

impl CancelHandle {
    pub(crate) fn new(tokens: RunTokens) -> Self {
        Self { tokens }
    }

    pub fn cancel(&self) -> bool {
        self.tokens.cancel_all()
    }
}
