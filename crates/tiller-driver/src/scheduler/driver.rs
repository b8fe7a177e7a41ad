use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use log::error;
use tiller_actor::actor::ActorHandle;
use tokio::sync::{mpsc, oneshot, watch, Mutex};

use crate::connection::MasterConnection;
use crate::error::{DriverError, DriverResult};
use crate::id::{OfferId, TaskId};
use crate::scheduler::actor::{SchedulerActor, SchedulerActorOptions};
use crate::scheduler::event::{SchedulerCallback, SchedulerEvent};
use crate::scheduler::options::SchedulerOptions;
use crate::scheduler::Scheduler;
use crate::types::{FrameworkMessage, Params, TaskSpec};

/// Framework-side session manager.
///
/// The driver owns the offer table and the task view in an internal actor;
/// the public methods send commands to the actor and callbacks are delivered
/// from a dedicated dispatcher task. Cloning the driver is cheap and all
/// clones share the same session.
#[derive(Clone)]
pub struct SchedulerDriver {
    inner: Arc<SchedulerDriverInner>,
}

struct SchedulerDriverInner {
    scheduler: Arc<dyn Scheduler>,
    connection: Arc<dyn MasterConnection>,
    options: SchedulerOptions,
    lifecycle: Mutex<Lifecycle>,
    /// Set by [SchedulerDriver::stop]; the dispatcher discards queued
    /// callbacks once this is set.
    halted: AtomicBool,
    done: watch::Sender<bool>,
}

enum Lifecycle {
    Created,
    Running { handle: ActorHandle<SchedulerActor> },
    Terminated,
}

impl SchedulerDriver {
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        connection: Arc<dyn MasterConnection>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerDriverInner {
                scheduler,
                connection,
                options,
                lifecycle: Mutex::new(Lifecycle::Created),
                halted: AtomicBool::new(false),
                done: watch::channel(false).0,
            }),
        }
    }

    /// Connects to the master and begins the registration handshake.
    /// Returns once the connection is established; the `registered` callback
    /// fires when the master assigns the framework its identifier. On error,
    /// only [SchedulerDriver::stop] and [SchedulerDriver::join] remain
    /// valid.
    pub async fn start(&self) -> DriverResult<()> {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        if !matches!(*lifecycle, Lifecycle::Created) {
            return Err(DriverError::InvalidArgument(
                "the driver has already been started".to_string(),
            ));
        }
        let framework_name = self.inner.scheduler.framework_name();
        let executor_info = self.inner.scheduler.executor_info();
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
        let handle = ActorHandle::new(SchedulerActorOptions {
            options: self.inner.options.clone(),
            connection,
            events: events_rx,
            callbacks: callbacks_tx,
            framework_name,
            executor_info,
        });
        let dispatcher = tokio::spawn(Self::dispatch(
            self.clone(),
            Arc::clone(&self.inner.scheduler),
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
        let _ = handle.send(SchedulerEvent::Shutdown).await;
    }

    /// Blocks until the driver terminates: an explicit stop, a fatal
    /// registration failure, or an unrecoverable connection error. No
    /// callback is delivered after this returns.
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

    /// Consumes the offer batch, launching the given tasks. An empty task
    /// list declines the offer. `params` carries scheduling hints applied to
    /// the unused portion of the offer. Fails without side effects if the
    /// offer is unknown or already consumed, rescinded, or expired.
    pub async fn reply_to_offer(
        &self,
        offer_id: OfferId,
        tasks: Vec<TaskSpec>,
        params: Params,
    ) -> DriverResult<()> {
        self.command(|result| SchedulerEvent::ReplyToOffer {
            offer_id,
            tasks,
            params,
            result,
        })
        .await
    }

    /// Best-effort request to terminate a running task. The authoritative
    /// outcome arrives later as a status update.
    pub async fn kill_task(&self, task_id: TaskId) -> DriverResult<()> {
        self.command(|result| SchedulerEvent::KillTask { task_id, result })
            .await
    }

    /// Asks the master to re-offer previously declined or expired resources
    /// immediately.
    pub async fn revive_offers(&self) -> DriverResult<()> {
        self.command(|result| SchedulerEvent::ReviveOffers { result })
            .await
    }

    /// Sends an opaque payload to the framework's executor. Delivery is
    /// unordered, best-effort, and unacknowledged.
    pub async fn send_framework_message(&self, message: FrameworkMessage) -> DriverResult<()> {
        self.command(|result| SchedulerEvent::SendMessage { message, result })
            .await
    }

    async fn command(
        &self,
        event: impl FnOnce(oneshot::Sender<DriverResult<()>>) -> SchedulerEvent,
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
        driver: SchedulerDriver,
        scheduler: Arc<dyn Scheduler>,
        mut callbacks: mpsc::UnboundedReceiver<SchedulerCallback>,
    ) {
        while let Some(callback) = callbacks.recv().await {
            if driver.inner.halted.load(Ordering::SeqCst) {
                break;
            }
            let delivery = Self::deliver(&driver, scheduler.as_ref(), callback);
            if AssertUnwindSafe(delivery).catch_unwind().await.is_err() {
                error!("a scheduler callback panicked");
            }
        }
    }

    async fn deliver(
        driver: &SchedulerDriver,
        scheduler: &dyn Scheduler,
        callback: SchedulerCallback,
    ) {
        match callback {
            SchedulerCallback::Registered { framework_id } => {
                scheduler.registered(driver, framework_id).await
            }
            SchedulerCallback::ResourceOffer { offer_id, offers } => {
                scheduler.resource_offer(driver, offer_id, offers).await
            }
            SchedulerCallback::OfferRescinded { offer_id } => {
                scheduler.offer_rescinded(driver, offer_id).await
            }
            SchedulerCallback::StatusUpdate { status } => {
                scheduler.status_update(driver, status).await
            }
            SchedulerCallback::FrameworkMessage { message } => {
                scheduler.framework_message(driver, message).await
            }
            SchedulerCallback::SlaveLost { slave_id } => {
                scheduler.slave_lost(driver, slave_id).await
            }
            SchedulerCallback::Error { error } => scheduler.error(driver, error).await,
        }
    }
}
