//! Reading/navigation controller.
//!
//! `ReaderState` is a pure state machine over `(current_index, is_auto_playing)`
//! driven by `ReaderEvent`s. `Reader` wraps it with an auto-play timer that
//! emits `Tick` every `AUTO_PLAY_INTERVAL`; the timer is cancelled on stop,
//! on drop and when the last page is reached.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

pub const AUTO_PLAY_INTERVAL: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderEvent {
    Next,
    Prev,
    ToggleAutoPlay(bool),
    Tick,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Changed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReaderState {
    pub page_count: usize,
    pub current_index: usize,
    pub is_auto_playing: bool,
}

impl ReaderState {
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            current_index: 0,
            is_auto_playing: false,
        }
    }

    fn last_index(&self) -> usize {
        self.page_count.saturating_sub(1)
    }

    pub fn at_last_page(&self) -> bool {
        self.current_index >= self.last_index()
    }

    pub fn apply(&mut self, event: ReaderEvent) -> Transition {
        let before = *self;
        match event {
            ReaderEvent::Next => {
                if !self.at_last_page() {
                    self.current_index += 1;
                }
            }
            ReaderEvent::Prev => {
                self.current_index = self.current_index.saturating_sub(1);
            }
            ReaderEvent::ToggleAutoPlay(true) => {
                self.current_index = 0;
                self.is_auto_playing = !self.at_last_page();
            }
            ReaderEvent::ToggleAutoPlay(false) | ReaderEvent::Stop => {
                self.is_auto_playing = false;
            }
            ReaderEvent::Tick => {
                if self.is_auto_playing {
                    if !self.at_last_page() {
                        self.current_index += 1;
                    }
                    if self.at_last_page() {
                        self.is_auto_playing = false;
                    }
                }
            }
        }
        if *self == before {
            Transition::Unchanged
        } else {
            Transition::Changed
        }
    }
}

/// A reading session: shared state, change notifications and the auto-play timer.
pub struct Reader {
    state: Arc<Mutex<ReaderState>>,
    updates: Arc<watch::Sender<ReaderState>>,
    interval: Duration,
    player: Option<JoinHandle<()>>,
}

fn apply_shared(
    state: &Mutex<ReaderState>,
    updates: &watch::Sender<ReaderState>,
    event: ReaderEvent,
) -> ReaderState {
    let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
    if guard.apply(event) == Transition::Changed {
        updates.send_replace(*guard);
    }
    *guard
}

impl Reader {
    pub fn new(page_count: usize) -> Self {
        Self::with_interval(page_count, AUTO_PLAY_INTERVAL)
    }

    pub fn with_interval(page_count: usize, interval: Duration) -> Self {
        let initial = ReaderState::new(page_count);
        let (updates, _) = watch::channel(initial);
        Self {
            state: Arc::new(Mutex::new(initial)),
            updates: Arc::new(updates),
            interval,
            player: None,
        }
    }

    pub fn state(&self) -> ReaderState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> watch::Receiver<ReaderState> {
        self.updates.subscribe()
    }

    /// Applies a user event. Starting auto-play spawns the timer; stopping it
    /// (or toggling off) cancels the timer. Must be called inside a Tokio runtime.
    pub fn handle(&mut self, event: ReaderEvent) -> ReaderState {
        let next = apply_shared(&self.state, &self.updates, event);
        match event {
            ReaderEvent::ToggleAutoPlay(true) => {
                self.cancel_timer();
                if next.is_auto_playing {
                    self.player = Some(self.spawn_timer());
                }
            }
            ReaderEvent::ToggleAutoPlay(false) | ReaderEvent::Stop => self.cancel_timer(),
            _ => {}
        }
        next
    }

    pub fn is_timer_running(&self) -> bool {
        self.player.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn spawn_timer(&self) -> JoinHandle<()> {
        let state = self.state.clone();
        let updates = self.updates.clone();
        let period = self.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let now = apply_shared(&state, &updates, ReaderEvent::Tick);
                debug!(page = now.current_index, "Auto-play advanced");
                if !now.is_auto_playing {
                    break;
                }
            }
        })
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.player.take() {
            handle.abort();
        }
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
