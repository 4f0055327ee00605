//! Device appearance mode and the signal that reports it.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// OS appearance mode. Each mode keeps its own preferred theme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Light,
    Dark,
}

/// Callback invoked with the new mode on every appearance change.
pub type ModeChangeHandler = Arc<dyn Fn(Mode) + Send + Sync>;

/// Handle for a registered mode-change listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModeSubscription(u64);

/// Source of the device's current appearance mode and change events.
///
/// The emitter is process-wide; subscribers must unsubscribe on teardown or
/// the listener leaks for the process lifetime.
pub trait ModeSignal: Send + Sync {
    fn current_mode(&self) -> Mode;
    fn subscribe(&self, handler: ModeChangeHandler) -> ModeSubscription;
    fn unsubscribe(&self, subscription: ModeSubscription);
}

struct EmitterInner {
    mode: Mode,
    handlers: Vec<(u64, ModeChangeHandler)>,
    next_id: u64,
}

/// In-process [`ModeSignal`] implementation.
///
/// The mobile shell forwards native appearance events into [`set_mode`];
/// tests drive it directly.
///
/// [`set_mode`]: ModeEmitter::set_mode
pub struct ModeEmitter {
    inner: Mutex<EmitterInner>,
}

impl ModeEmitter {
    pub fn new(mode: Mode) -> Self {
        Self {
            inner: Mutex::new(EmitterInner {
                mode,
                handlers: Vec::new(),
                next_id: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EmitterInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the new mode and notify every registered handler.
    pub fn set_mode(&self, mode: Mode) {
        let handlers: Vec<ModeChangeHandler> = {
            let mut inner = self.lock();
            inner.mode = mode;
            inner
                .handlers
                .iter()
                .map(|(_, handler)| handler.clone())
                .collect()
        };
        for handler in handlers {
            handler(mode);
        }
    }

    /// Number of live listeners; teardown tests assert this drops to zero.
    pub fn handler_count(&self) -> usize {
        self.lock().handlers.len()
    }
}

impl Default for ModeEmitter {
    fn default() -> Self {
        Self::new(Mode::Light)
    }
}

impl ModeSignal for ModeEmitter {
    fn current_mode(&self) -> Mode {
        self.lock().mode
    }

    fn subscribe(&self, handler: ModeChangeHandler) -> ModeSubscription {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.handlers.push((id, handler));
        ModeSubscription(id)
    }

    fn unsubscribe(&self, subscription: ModeSubscription) {
        self.lock()
            .handlers
            .retain(|(id, _)| *id != subscription.0);
    }
}
