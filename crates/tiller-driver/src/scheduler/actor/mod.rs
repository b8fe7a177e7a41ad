mod core;
mod handler;

pub(crate) use self::core::{SchedulerActor, SchedulerActorOptions};
