use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use log::error;
use tiller_actor::actor::ActorHandle;
use tokio::sync::{mpsc, oneshot, watch, Mutex};

use crate::connection::AgentConnection;
use crate::error::{DriverError, DriverResult};
use crate::executor::actor::{ExecutorActor, ExecutorActorOptions};
use crate::executor::event::{ExecutorCallback, ExecutorEvent};
use crate::executor::options::ExecutorOptions;
use crate::executor::Executor;
use crate::types::{FrameworkMessage, TaskStatus};

/// Node-side session manager.
///
/// The driver owns the task table and the unacknowledged status updates in
/// an internal actor; callbacks are delivered from a dedicated dispatcher
/// task. Cloning the driver is cheap and all clones share the same session.
#[derive(Clone)]
pub struct ExecutorDriver {
    inner: Arc<ExecutorDriverInner>,
}

struct ExecutorDriverInner {
    executor: Arc<dyn Executor>,
    connection: Arc<dyn AgentConnection>,
    options: ExecutorOptions,
    lifecycle: Mutex<Lifecycle>,
    /// Set by [ExecutorDriver::stop]; the dispatcher discards queued
    /// callbacks once this is set.
    halted: AtomicBool,
    done: watch::Sender<bool>,
}

enum Lifecycle {
    Created,
    Running { handle: ActorHandle<ExecutorActor> },
    Terminated,
}

impl ExecutorDriver {
    pub fn new(
        executor: Arc<dyn Executor>,
        connection: Arc<dyn AgentConnection>,
        options: ExecutorOptions,
    ) -> Self {
        Self {
            inner: Arc::new(ExecutorDriverInner {
                executor,
                connection,
                options,
                lifecycle: Mutex::new(Lifecycle::Created),
                halted: AtomicBool::new(false),
                done: watch::channel(false).0,
            }),
        }
    }

    /// Connects to the agent and begins the registration handshake.
    /// The `init` callback fires when the agent delivers the executor's
    /// context. On error, only [ExecutorDriver::stop] and
    /// [ExecutorDriver::join] remain valid.
    pub async fn start(&self) -> DriverResult<()> {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        if !matches!(*lifecycle, Lifecycle::Created) {
            return Err(DriverError::InvalidArgument(
                "the driver has already been started".to_string(),
            ));
        }
        let (events_tx, events_rx) = mpsc::channel(self.inner.options.event_buffer);
        let connection = Arc::clone(&self.inner.connection);
        let connect = self
            .inner
            .options
            .registration_retry
            .run(|| {
                let connection = Arc::clone(&connection);
                let events = events_tx.clone();
                async move { connection.connect(events).await }
            })
            .await;
        if let Err(e) = connect {
            *lifecycle = Lifecycle::Terminated;
            self.inner.done.send_replace(true);
            return Err(e);
        }
        let (callbacks_tx, callbacks_rx) = mpsc::unbounded_channel();
        let handle = ActorHandle::new(ExecutorActorOptions {
            options: self.inner.options.clone(),
            connection,
            events: events_rx,
            callbacks: callbacks_tx,
        });
        let dispatcher = tokio::spawn(Self::dispatch(
            self.clone(),
            Arc::clone(&self.inner.executor),
            callbacks_rx,
        ));
        {
            let handle = handle.clone();
            let done = self.inner.done.clone();
            tokio::spawn(async move {
                handle.wait_for_stop().await;
                let _ = dispatcher.await;
                done.send_replace(true);
            });
        }
        *lifecycle = Lifecycle::Running { handle };
        Ok(())
    }

    /// Stops the driver. Idempotent, and safe to call from a callback or
    /// from any other task. Callbacks still queued are discarded.
    pub async fn stop(&self) {
        let handle = {
            let lifecycle = self.inner.lifecycle.lock().await;
            match &*lifecycle {
                Lifecycle::Running { handle } => handle.clone(),
                _ => return,
            }
        };
        self.inner.halted.store(true, Ordering::SeqCst);
        let _ = handle.send(ExecutorEvent::Shutdown).await;
    }

    /// Blocks until the driver terminates. No callback is delivered after
    /// this returns.
    pub async fn join(&self) -> DriverResult<()> {
        {
            let lifecycle = self.inner.lifecycle.lock().await;
            if matches!(*lifecycle, Lifecycle::Created) {
                return Err(DriverError::NotRunning);
            }
        }
        let mut done = self.inner.done.subscribe();
        let _ = done.wait_for(|x| *x).await;
        Ok(())
    }

    /// Starts the driver and blocks until it terminates.
    pub async fn run(&self) -> DriverResult<()> {
        self.start().await?;
        self.join().await
    }

    /// Queues a status update for delivery to the agent. An `Ok` result
    /// means the update was accepted locally; delivery is retried until the
    /// agent acknowledges it or the attempt cap is reached, after which the
    /// `error` callback fires with [DriverError::Undeliverable].
    pub async fn send_status_update(&self, status: TaskStatus) -> DriverResult<()> {
        self.command(|result| ExecutorEvent::SendStatus { status, result })
            .await
    }

    /// Sends an opaque payload to the framework's scheduler. Delivery is
    /// unordered, best-effort, and unacknowledged.
    pub async fn send_framework_message(&self, message: FrameworkMessage) -> DriverResult<()> {
        self.command(|result| ExecutorEvent::SendMessage { message, result })
            .await
    }

    async fn command(
        &self,
        event: impl FnOnce(oneshot::Sender<DriverResult<()>>) -> ExecutorEvent,
    ) -> DriverResult<()> {
        let handle = {
            let lifecycle = self.inner.lifecycle.lock().await;
            match &*lifecycle {
                Lifecycle::Running { handle } => handle.clone(),
                _ => return Err(DriverError::NotRunning),
            }
        };
        let (tx, rx) = oneshot::channel();
        handle
            .send(event(tx))
            .await
            .map_err(|_| DriverError::NotRunning)?;
        rx.await.unwrap_or(Err(DriverError::NotRunning))
    }

    async fn dispatch(
        driver: ExecutorDriver,
        executor: Arc<dyn Executor>,
        mut callbacks: mpsc::UnboundedReceiver<ExecutorCallback>,
    ) {
        while let Some(callback) = callbacks.recv().await {
            if driver.inner.halted.load(Ordering::SeqCst) {
                break;
            }
            let delivery = Self::deliver(&driver, executor.as_ref(), callback);
            if AssertUnwindSafe(delivery).catch_unwind().await.is_err() {
                error!("an executor callback panicked");
            }
        }
    }

    async fn deliver(driver: &ExecutorDriver, executor: &dyn Executor, callback: ExecutorCallback) {
        match callback {
            ExecutorCallback::Init { context } => executor.init(driver, context).await,
            ExecutorCallback::LaunchTask { task } => executor.launch_task(driver, task).await,
            ExecutorCallback::KillTask { task_id } => executor.kill_task(driver, task_id).await,
            ExecutorCallback::FrameworkMessage { message } => {
                executor.framework_message(driver, message).await
            }
            ExecutorCallback::Shutdown => executor.shutdown(driver).await,
            ExecutorCallback::Error { error } => executor.error(driver, error).await,
        }
    }
}
