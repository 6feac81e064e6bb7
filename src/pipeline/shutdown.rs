//! Set-once cancellation and the Running -> Draining -> Stopped lifecycle.

use crate::types::{Event, PipelineState, ShutdownReason};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Cancellation signal that fires at most once
///
/// Any number of callers may race to trigger it; exactly one wins and every
/// waiter observes the same single transition.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    fired: Arc<AtomicBool>,
    token: CancellationToken,
}

impl ShutdownSignal {
    /// Create an untriggered signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal
    ///
    /// Returns `true` only for the caller that actually fired it.
    pub fn trigger(&self) -> bool {
        let won = self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.token.cancel();
        }
        won
    }

    /// Whether the signal has fired
    pub fn is_triggered(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Resolves once the signal has fired
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Token observed by queue operations
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Owns the pipeline state and the one path into draining
#[derive(Clone, Debug)]
pub struct ShutdownCoordinator {
    inner: Arc<CoordinatorInner>,
}

#[derive(Debug)]
struct CoordinatorInner {
    signal: ShutdownSignal,
    state: watch::Sender<PipelineState>,
    reason: OnceLock<ShutdownReason>,
    event_tx: broadcast::Sender<Event>,
}

impl ShutdownCoordinator {
    /// Create a coordinator in the Running state
    pub fn new(event_tx: broadcast::Sender<Event>) -> Self {
        let (state, _) = watch::channel(PipelineState::Running);
        Self {
            inner: Arc::new(CoordinatorInner {
                signal: ShutdownSignal::new(),
                state,
                reason: OnceLock::new(),
                event_tx,
            }),
        }
    }

    /// The signal every pipeline task listens on
    pub fn signal(&self) -> &ShutdownSignal {
        &self.inner.signal
    }

    /// Current state
    pub fn state(&self) -> PipelineState {
        *self.inner.state.borrow()
    }

    /// Receiver that sees every state change
    pub fn watch_state(&self) -> watch::Receiver<PipelineState> {
        self.inner.state.subscribe()
    }

    /// What started the drain, once one has started
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.inner.reason.get().copied()
    }

    /// Move from Running to Draining
    ///
    /// Only the first caller has any effect; it fires the signal, records the
    /// reason and emits [`Event::StateChanged`]. Later calls return `false`.
    pub fn begin_drain(&self, reason: ShutdownReason) -> bool {
        if !self.inner.signal.trigger() {
            tracing::debug!(?reason, "Drain already in progress");
            return false;
        }

        let _ = self.inner.reason.set(reason);
        self.inner.state.send_replace(PipelineState::Draining);
        tracing::info!(?reason, "Sending stop signal, draining in-flight downloads");
        let _ = self.inner.event_tx.send(Event::StateChanged {
            state: PipelineState::Draining,
        });
        true
    }

    /// Move from Draining to Stopped
    ///
    /// Called once every worker has exited. Has no effect outside Draining.
    pub fn mark_stopped(&self) -> bool {
        let changed = self.inner.state.send_if_modified(|state| {
            if *state == PipelineState::Draining {
                *state = PipelineState::Stopped;
                true
            } else {
                false
            }
        });

        if changed {
            tracing::info!("All workers exited");
            let _ = self.inner.event_tx.send(Event::StateChanged {
                state: PipelineState::Stopped,
            });
            let _ = self.inner.event_tx.send(Event::Shutdown);
        } else {
            tracing::warn!(state = %self.state(), "Stop requested outside of draining");
        }
        changed
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn signal_fires_once() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());

        assert!(signal.trigger());
        assert!(!signal.trigger());
        assert!(signal.is_triggered());
        assert!(signal.token().is_cancelled());
    }

    #[tokio::test]
    async fn clones_share_the_signal() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();

        let waiter = tokio::spawn(async move { clone.cancelled().await });
        assert!(signal.trigger());

        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_triggers_have_one_winner() {
        let signal = ShutdownSignal::new();

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let signal = signal.clone();
                tokio::spawn(async move { signal.trigger() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[test]
    fn coordinator_starts_running() {
        let (tx, _rx) = broadcast::channel(16);
        let coordinator = ShutdownCoordinator::new(tx);

        assert_eq!(coordinator.state(), PipelineState::Running);
        assert_eq!(coordinator.reason(), None);
        assert!(!coordinator.signal().is_triggered());
    }

    #[test]
    fn begin_drain_moves_to_draining_and_keeps_first_reason() {
        let (tx, mut rx) = broadcast::channel(16);
        let coordinator = ShutdownCoordinator::new(tx);

        assert!(coordinator.begin_drain(ShutdownReason::Signal));
        assert!(!coordinator.begin_drain(ShutdownReason::Completed));

        assert_eq!(coordinator.state(), PipelineState::Draining);
        assert_eq!(coordinator.reason(), Some(ShutdownReason::Signal));
        assert!(coordinator.signal().is_triggered());

        match rx.try_recv().unwrap() {
            Event::StateChanged { state } => assert_eq!(state, PipelineState::Draining),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(rx.try_recv().is_err(), "only one transition is announced");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_drains_emit_a_single_transition() {
        let (tx, mut rx) = broadcast::channel(256);
        let coordinator = ShutdownCoordinator::new(tx);

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let coordinator = coordinator.clone();
                let reason = if i % 2 == 0 {
                    ShutdownReason::Signal
                } else {
                    ShutdownReason::Completed
                };
                tokio::spawn(async move { coordinator.begin_drain(reason) })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        let mut transitions = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, Event::StateChanged { .. }) {
                transitions += 1;
            }
        }
        assert_eq!(transitions, 1);
    }

    #[test]
    fn stop_requires_draining_first() {
        let (tx, mut rx) = broadcast::channel(16);
        let coordinator = ShutdownCoordinator::new(tx);

        assert!(!coordinator.mark_stopped());
        assert_eq!(coordinator.state(), PipelineState::Running);
        assert!(rx.try_recv().is_err());

        coordinator.begin_drain(ShutdownReason::Completed);
        assert!(coordinator.mark_stopped());
        assert!(!coordinator.mark_stopped());
        assert_eq!(coordinator.state(), PipelineState::Stopped);

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(matches!(
            events.as_slice(),
            [
                Event::StateChanged {
                    state: PipelineState::Draining
                },
                Event::StateChanged {
                    state: PipelineState::Stopped
                },
                Event::Shutdown,
            ]
        ));
    }

    #[tokio::test]
    async fn state_watchers_see_stopped() {
        let (tx, _rx) = broadcast::channel(16);
        let coordinator = ShutdownCoordinator::new(tx);
        let mut watcher = coordinator.watch_state();

        let waiter = tokio::spawn(async move {
            watcher
                .wait_for(|state| *state == PipelineState::Stopped)
                .await
                .map(|state| *state)
        });

        coordinator.begin_drain(ShutdownReason::Signal);
        coordinator.mark_stopped();

        let seen = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("watcher should observe the stop")
            .unwrap()
            .unwrap();
        assert_eq!(seen, PipelineState::Stopped);
    }
}
