use std::future::{pending, Future};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use super::{Fetcher, PollingOptions, ResourceState, SessionEvent, SessionPhase};

pub(super) enum Command<T> {
    Refetch,
    SetEnabled(bool),
    SetFetcher(Arc<dyn Fetcher<T>>),
    Teardown,
}

type AttemptFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

struct Attempt<T> {
    id: u64,
    cancel: CancellationToken,
    future: AttemptFuture<T>,
}

enum Wake<T> {
    Command(Option<Command<T>>),
    Settled(u64, Result<T>),
    Timer,
}

/// Owns a polling session. The only writer of the resource state.
pub(super) struct Driver<T> {
    fetcher: Arc<dyn Fetcher<T>>,
    options: PollingOptions<T>,
    enabled: bool,
    phase: SessionPhase,
    attempts: u64,
    in_flight: Option<Attempt<T>>,
    next_tick: Option<Instant>,
    session: CancellationToken,
    state: watch::Sender<ResourceState<T>>,
    commands: mpsc::UnboundedReceiver<Command<T>>,
}

impl<T> Driver<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(super) fn new(
        fetcher: Arc<dyn Fetcher<T>>,
        options: PollingOptions<T>,
        state: watch::Sender<ResourceState<T>>,
        commands: mpsc::UnboundedReceiver<Command<T>>,
    ) -> Self {
        Self {
            fetcher,
            enabled: options.enabled,
            options,
            phase: SessionPhase::Idle,
            attempts: 0,
            in_flight: None,
            next_tick: None,
            session: CancellationToken::new(),
            state,
            commands,
        }
    }

    pub(super) async fn run(mut self) {
        if self.enabled {
            self.tick(false);
        }

        loop {
            let wake = tokio::select! {
                biased;
                command = self.commands.recv() => Wake::Command(command),
                (id, result) = settle(&mut self.in_flight) => Wake::Settled(id, result),
                _ = timer(self.next_tick) => Wake::Timer,
            };

            match wake {
                Wake::Command(None) | Wake::Command(Some(Command::Teardown)) => {
                    self.teardown();
                    break;
                }
                Wake::Command(Some(Command::Refetch)) => {
                    debug!("Manual refetch requested");
                    self.tick(true);
                }
                Wake::Command(Some(Command::SetEnabled(enabled))) => self.set_enabled(enabled),
                Wake::Command(Some(Command::SetFetcher(fetcher))) => {
                    debug!("Fetch operation replaced, restarting session");
                    self.fetcher = fetcher;
                    self.cancel_outstanding();
                    self.phase = SessionPhase::Idle;
                    if self.enabled {
                        self.tick(true);
                    } else {
                        self.publish(|s| s.loading = false);
                    }
                }
                Wake::Settled(id, result) => {
                    let token_fired = self
                        .in_flight
                        .take()
                        .is_some_and(|attempt| attempt.cancel.is_cancelled());
                    self.settled(id, result, token_fired);
                }
                Wake::Timer => {
                    self.next_tick = None;
                    self.tick(false);
                }
            }
        }
    }

    /// Start an attempt, superseding any outstanding one
    fn tick(&mut self, manual: bool) {
        let next = self.phase.on(SessionEvent::Tick { manual });
        if next != SessionPhase::Fetching {
            debug!("Session stopped, scheduled attempt skipped");
            return;
        }

        if let Some(previous) = self.in_flight.take() {
            previous.cancel.cancel();
            debug!("Attempt {} superseded", previous.id);
        }
        self.next_tick = None;
        self.phase = next;
        self.attempts += 1;

        let id = self.attempts;
        let cancel = self.session.child_token();
        let fetcher = self.fetcher.clone();
        let token = cancel.clone();
        let future: AttemptFuture<T> = Box::pin(async move { fetcher.fetch(token).await });

        debug!("Starting attempt {}", id);
        self.in_flight = Some(Attempt { id, cancel, future });
        self.publish(|s| s.loading = true);
    }

    /// Apply the result of the current attempt. `token_fired` tells whether
    /// the attempt's own token was cancelled before it returned.
    fn settled(&mut self, id: u64, result: Result<T>, token_fired: bool) {
        match result {
            Ok(value) => {
                let stop = self
                    .options
                    .should_stop
                    .as_ref()
                    .is_some_and(|should_stop| should_stop(&value));
                let reschedule = !stop && self.enabled;
                self.phase = self.phase.on(SessionEvent::Success { stop, reschedule });

                let callback_value = self.options.on_success.as_ref().map(|_| value.clone());
                self.publish(move |s| {
                    s.data = Some(value);
                    s.error = None;
                    s.loading = false;
                });
                if let (Some(on_success), Some(value)) = (&self.options.on_success, callback_value) {
                    on_success(&value);
                }
                self.notify_settled();

                if stop {
                    info!("Polling stopped after attempt {}", id);
                } else if reschedule {
                    self.schedule();
                }
            }
            Err(e) if e.is_cancelled() && token_fired => {
                debug!("Attempt {} cancelled, result discarded", id);
                let reschedule = self.enabled;
                self.phase = self.phase.on(SessionEvent::Failure { reschedule });
                self.publish(|s| s.loading = false);
                if reschedule {
                    self.schedule();
                }
            }
            Err(e) => {
                warn!("Attempt {} failed: {}", id, e);
                let reschedule = self.enabled;
                self.phase = self.phase.on(SessionEvent::Failure { reschedule });

                let error = Arc::new(e);
                let stored = error.clone();
                self.publish(move |s| {
                    s.error = Some(stored);
                    s.loading = false;
                });
                if let Some(on_error) = &self.options.on_error {
                    on_error(error.as_ref());
                }
                self.notify_settled();

                if reschedule {
                    self.schedule();
                }
            }
        }
    }

    fn notify_settled(&self) {
        if let Some(on_settled) = &self.options.on_settled {
            let snapshot = self.state.borrow().clone();
            on_settled(&snapshot);
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        if enabled == self.enabled {
            return;
        }
        self.enabled = enabled;

        if enabled {
            debug!("Polling enabled, starting fresh attempt");
            self.tick(true);
        } else {
            debug!("Polling disabled");
            self.cancel_outstanding();
            self.phase = self.phase.on(SessionEvent::Cancel);
            self.publish(|s| s.loading = false);
        }
    }

    fn schedule(&mut self) {
        self.next_tick = Some(Instant::now() + self.options.interval);
    }

    fn cancel_outstanding(&mut self) {
        if let Some(attempt) = self.in_flight.take() {
            attempt.cancel.cancel();
            debug!("Attempt {} cancelled", attempt.id);
        }
        self.next_tick = None;
    }

    fn teardown(&mut self) {
        self.cancel_outstanding();
        self.session.cancel();
        self.phase = self.phase.on(SessionEvent::Teardown);
        debug!("Polling session torn down after {} attempts", self.attempts);
    }

    fn publish<F>(&self, update: F)
    where
        F: FnOnce(&mut ResourceState<T>),
    {
        let phase = self.phase;
        let attempts = self.attempts;
        self.state.send_modify(|state| {
            update(state);
            state.phase = phase;
            state.attempts = attempts;
        });
    }
}

async fn settle<T>(in_flight: &mut Option<Attempt<T>>) -> (u64, Result<T>) {
    match in_flight.as_mut() {
        Some(attempt) => {
            let result = attempt.future.as_mut().await;
            (attempt.id, result)
        }
        None => pending().await,
    }
}

async fn timer(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}
