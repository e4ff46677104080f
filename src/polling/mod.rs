// Resource polling
//
// A PollingResource repeatedly invokes a fetch operation, publishes the
// (data, loading, error) triple through a watch channel and stops once a
// predicate is satisfied. One driver task per resource owns the session
// state; handles talk to it through commands.
//
// - State: session phases, events and the observable resource state
// - Driver: the attempt/schedule loop

pub mod state;
mod driver;

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use state::*;
use crate::error::{Result, ClientError};
use driver::{Command, Driver};

/// Default interval between the end of one attempt and the next
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);

/// Operation invoked on every attempt.
///
/// Implementations must return promptly once `cancel` fires.
#[async_trait]
pub trait Fetcher<T>: Send + Sync {
    async fn fetch(&self, cancel: CancellationToken) -> Result<T>;
}

#[async_trait]
impl<T, F, Fut> Fetcher<T> for F
where
    T: Send + 'static,
    F: Fn(CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send,
{
    async fn fetch(&self, cancel: CancellationToken) -> Result<T> {
        (self)(cancel).await
    }
}

pub type StopPredicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
pub type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&ClientError) + Send + Sync>;
pub type SettledCallback<T> = Arc<dyn Fn(&ResourceState<T>) + Send + Sync>;

/// Polling behaviour of a resource
pub struct PollingOptions<T> {
    pub interval: Duration,
    /// Whether attempts are scheduled automatically
    pub enabled: bool,
    /// Evaluated after each success; `true` halts polling
    pub should_stop: Option<StopPredicate<T>>,
    /// Invoked after the state holds the new value
    pub on_success: Option<SuccessCallback<T>>,
    /// Invoked after the state holds the new error
    pub on_error: Option<ErrorCallback>,
    /// Invoked with the published state after every success or failure.
    /// Unlike the watch channel, no settled attempt is skipped.
    pub on_settled: Option<SettledCallback<T>>,
}

impl<T> Default for PollingOptions<T> {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            enabled: true,
            should_stop: None,
            on_success: None,
            on_error: None,
            on_settled: None,
        }
    }
}

impl<T> Clone for PollingOptions<T> {
    fn clone(&self) -> Self {
        Self {
            interval: self.interval,
            enabled: self.enabled,
            should_stop: self.should_stop.clone(),
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            on_settled: self.on_settled.clone(),
        }
    }
}

impl<T> PollingOptions<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn stop_when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.should_stop = Some(Arc::new(predicate));
        self
    }

    pub fn on_success<C>(mut self, callback: C) -> Self
    where
        C: Fn(&T) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error<C>(mut self, callback: C) -> Self
    where
        C: Fn(&ClientError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn on_settled<C>(mut self, callback: C) -> Self
    where
        C: Fn(&ResourceState<T>) + Send + Sync + 'static,
    {
        self.on_settled = Some(Arc::new(callback));
        self
    }
}

/// Handle to a polled resource.
///
/// Dropping the handle tears the session down: the in-flight request is
/// cancelled and no further attempts or state updates happen.
pub struct PollingResource<T> {
    commands: mpsc::UnboundedSender<Command<T>>,
    state: watch::Receiver<ResourceState<T>>,
    task: Option<JoinHandle<()>>,
}

impl<T> PollingResource<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start a session; the first attempt runs immediately when enabled
    pub fn spawn<F>(fetcher: F, options: PollingOptions<T>) -> Self
    where
        F: Fetcher<T> + 'static,
    {
        Self::spawn_shared(Arc::new(fetcher), options)
    }

    pub fn spawn_shared(fetcher: Arc<dyn Fetcher<T>>, options: PollingOptions<T>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ResourceState::new(options.enabled));

        let driver = Driver::new(fetcher, options, state_tx, command_rx);
        let task = tokio::spawn(driver.run());

        Self {
            commands: command_tx,
            state: state_rx,
            task: Some(task),
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> ResourceState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ResourceState<T>> {
        self.state.clone()
    }

    /// Run an attempt now, clearing any stopped state and ignoring `enabled`
    pub fn refetch(&self) {
        self.send(Command::Refetch);
    }

    /// `false` stops scheduling and keeps the data; `true` restarts with a fresh attempt
    pub fn set_enabled(&self, enabled: bool) {
        self.send(Command::SetEnabled(enabled));
    }

    /// Replace the fetch operation, restarting the session
    pub fn set_fetcher<F>(&self, fetcher: F)
    where
        F: Fetcher<T> + 'static,
    {
        self.send(Command::SetFetcher(Arc::new(fetcher)));
    }

    /// Follow an external enabled signal (e.g. visibility of the consuming view)
    pub fn bind_enabled(&self, mut signal: watch::Receiver<bool>) -> JoinHandle<()> {
        let commands = self.commands.clone();
        tokio::spawn(async move {
            let initial = *signal.borrow_and_update();
            if commands.send(Command::SetEnabled(initial)).is_err() {
                return;
            }
            while signal.changed().await.is_ok() {
                let enabled = *signal.borrow_and_update();
                if commands.send(Command::SetEnabled(enabled)).is_err() {
                    break;
                }
            }
        })
    }

    /// Wait until the state satisfies `predicate`.
    ///
    /// Fails with `ClientError::Cancelled` if the session ends first.
    pub async fn wait_for<P>(&self, predicate: P) -> Result<ResourceState<T>>
    where
        P: FnMut(&ResourceState<T>) -> bool,
    {
        let mut state = self.state.clone();
        let matched = state
            .wait_for(predicate)
            .await
            .map_err(|_| ClientError::Cancelled)?;
        Ok(matched.clone())
    }

    /// End the session and wait for the driver to finish
    pub async fn teardown(mut self) {
        self.send(Command::Teardown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn send(&self, command: Command<T>) {
        if self.commands.send(command).is_err() {
            tracing::debug!("Polling session already ended, command ignored");
        }
    }
}

impl<T> Drop for PollingResource<T> {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Teardown);
    }
}
