use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use log::{error, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

const ACTOR_CHANNEL_SIZE: usize = 8;

/// A single-threaded event loop owning its mutable state.
/// Messages are processed one at a time; anything that must not block the
/// loop is moved to a task via [ActorContext::spawn].
#[async_trait]
pub trait Actor: Sized + Send + 'static {
    type Message: Send + 'static;
    type Options: Send + 'static;

    fn new(options: Self::Options) -> Self;
    async fn start(&mut self, ctx: &mut ActorContext<Self>);
    fn receive(&mut self, ctx: &mut ActorContext<Self>, message: Self::Message) -> ActorAction;
    async fn stop(self, ctx: &mut ActorContext<Self>);
}

pub enum ActorAction {
    Continue,
    /// Log a warning and keep processing messages.
    Warn(String),
    /// Log an error and stop the actor.
    Fail(String),
    Stop,
}

impl ActorAction {
    pub fn warn(message: impl Display) -> Self {
        Self::Warn(message.to_string())
    }

    pub fn fail(message: impl Display) -> Self {
        Self::Fail(message.to_string())
    }
}

pub struct ActorContext<T>
where
    T: Actor,
{
    handle: ActorHandle<T>,
}

impl<T: Actor> ActorContext<T> {
    fn new(handle: &ActorHandle<T>) -> Self {
        Self {
            handle: handle.clone(),
        }
    }

    pub fn handle(&self) -> &ActorHandle<T> {
        &self.handle
    }

    /// Sends a message to the actor itself.
    /// The send happens on a separate task so that the event loop is never
    /// blocked on its own (bounded) channel.
    pub fn send(&mut self, message: T::Message) {
        let handle = self.handle.clone();
        tokio::spawn(async move {
            if handle.send(message).await.is_err() {
                warn!("failed to send message to a stopped actor");
            }
        });
    }

    /// Sends a message to the actor itself after a delay.
    /// The message is silently dropped if the actor stops in the meantime.
    pub fn send_with_delay(&mut self, message: T::Message, delay: Duration) {
        let handle = self.handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = handle.send(message).await;
        });
    }

    pub fn spawn<F>(&mut self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(future)
    }
}

pub struct ActorHandle<T>
where
    T: Actor,
{
    sender: mpsc::Sender<T::Message>,
    stopped: watch::Receiver<bool>,
}

impl<T> Clone for ActorHandle<T>
where
    T: Actor,
{
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            stopped: self.stopped.clone(),
        }
    }
}

impl<T: Actor> ActorHandle<T> {
    pub fn new(options: T::Options) -> Self {
        let (tx, mut rx) = mpsc::channel(ACTOR_CHANNEL_SIZE);
        let (stopped_tx, stopped_rx) = watch::channel::<bool>(false);
        let out = Self {
            sender: tx,
            stopped: stopped_rx,
        };
        let handle = out.clone();
        tokio::spawn(async move {
            let mut actor = T::new(options);
            let mut ctx = ActorContext::new(&handle);
            actor.start(&mut ctx).await;
            while let Some(message) = rx.recv().await {
                match actor.receive(&mut ctx, message) {
                    ActorAction::Continue => {}
                    ActorAction::Warn(message) => {
                        warn!("{message}");
                    }
                    ActorAction::Fail(message) => {
                        error!("{message}");
                        break;
                    }
                    ActorAction::Stop => {
                        break;
                    }
                }
            }
            rx.close();
            actor.stop(&mut ctx).await;
            let _ = stopped_tx.send(true);
        });
        out
    }

    pub async fn send(
        &self,
        message: T::Message,
    ) -> Result<(), mpsc::error::SendError<T::Message>> {
        self.sender.send(message).await
    }

    pub async fn wait_for_stop(mut self) {
        // We ignore the receiver error since the sender must have been dropped in this case,
        // which means the actor has stopped.
        let _ = self.stopped.wait_for(|x| *x).await;
    }
}
