use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, bounded, select, tick};

use super::controller::{AnimationController, TickOutcome, Transition};

/// Default tick period, roughly one display refresh.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Drives one transition to completion on a background thread.
///
/// The thread ticks the controller by wall-clock elapsed time and exits once
/// the transition completes, goes stale, or is cancelled.
pub struct TransitionTimer {
    transition: Transition,
    cancel_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl TransitionTimer {
    pub fn spawn(
        controller: Arc<AnimationController>,
        transition: Transition,
        frame_interval: Duration,
    ) -> std::io::Result<Self> {
        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let thread = thread::Builder::new()
            .name(format!("circle-video-{}", transition.direction.label()))
            .spawn(move || {
                let started = Instant::now();
                let ticker = tick(frame_interval);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            match controller.tick_elapsed(transition.id, started.elapsed()) {
                                TickOutcome::Progress(_) => {}
                                TickOutcome::Completed(_) | TickOutcome::Stale => break,
                            }
                        }
                        recv(cancel_rx) -> _ => {
                            controller.cancel_transition(transition.id);
                            break;
                        }
                    }
                }
            })?;
        Ok(Self {
            transition,
            cancel_tx: Some(cancel_tx),
            thread: Some(thread),
        })
    }

    pub fn transition(&self) -> Transition {
        self.transition
    }

    /// Stop the transition without flipping the mode, and join the thread.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(handle) = self.thread.take() {
            // Listener callbacks run on this thread and may replace the timer.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for TransitionTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
