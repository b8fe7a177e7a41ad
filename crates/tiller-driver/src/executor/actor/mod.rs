mod core;
mod handler;

pub(crate) use self::core::{ExecutorActor, ExecutorActorOptions};
