use std::collections::{HashMap, HashSet};

use log::warn;

use crate::error::{DriverError, DriverResult};
use crate::id::{FrameworkId, OfferId, SlaveId, TaskId};
use crate::types::{ResourceOffer, TaskSpec, TaskState, TaskStatus};

/// The scheduler driver's view of the session: the offer table and the task
/// table. Owned exclusively by the driver actor.
#[derive(Debug)]
pub struct SchedulerState {
    framework_id: Option<FrameworkId>,
    offers: HashMap<OfferId, OfferDescriptor>,
    tasks: HashMap<TaskId, TaskDescriptor>,
}

#[derive(Debug)]
pub struct OfferDescriptor {
    pub offers: Vec<ResourceOffer>,
    pub state: OfferState,
}

/// Lifecycle of one offer batch.
/// Every state other than `Offered` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferState {
    Offered,
    /// Consumed by exactly one reply (launching tasks or declining).
    Claimed,
    /// Withdrawn by the master before a reply.
    Rescinded,
    /// Declined locally after the configured window elapsed with no reply.
    Expired,
}

impl OfferState {
    pub fn is_open(&self) -> bool {
        matches!(self, OfferState::Offered)
    }
}

#[derive(Debug)]
pub struct TaskDescriptor {
    pub slave_id: SlaveId,
    pub state: TaskState,
}

/// How an incoming status update relates to the task table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusDisposition {
    /// The update advances the task and must reach the scheduler.
    Applied,
    /// A repeat of the terminal state already recorded. Suppressed so that
    /// at-least-once delivery stays idempotent for the scheduler.
    Duplicate,
    /// An update that would move the task backwards. Suppressed.
    Stale,
    /// The task was never introduced by a reply. Informational only.
    Unknown,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self {
            framework_id: None,
            offers: HashMap::new(),
            tasks: HashMap::new(),
        }
    }

    pub fn framework_id(&self) -> Option<&FrameworkId> {
        self.framework_id.as_ref()
    }

    pub fn set_framework_id(&mut self, framework_id: FrameworkId) {
        self.framework_id = Some(framework_id);
    }

    pub fn add_offer(&mut self, offer_id: OfferId, offers: Vec<ResourceOffer>) -> bool {
        if self.offers.contains_key(&offer_id) {
            warn!("offer {offer_id} already exists");
            return false;
        }
        self.offers.insert(
            offer_id,
            OfferDescriptor {
                offers,
                state: OfferState::Offered,
            },
        );
        true
    }

    /// Claims an open offer batch with a reply.
    /// Validation happens before any mutation, so a failed claim leaves the
    /// offer and the task table untouched.
    pub fn claim_offer(&mut self, offer_id: &OfferId, tasks: &[TaskSpec]) -> DriverResult<()> {
        let Some(offer) = self.offers.get(offer_id) else {
            return Err(DriverError::OfferNotOpen(offer_id.clone()));
        };
        if !offer.state.is_open() {
            return Err(DriverError::OfferNotOpen(offer_id.clone()));
        }
        let mut seen = HashSet::new();
        for task in tasks {
            if self.tasks.contains_key(&task.task_id) || !seen.insert(task.task_id) {
                return Err(DriverError::InvalidArgument(format!(
                    "task {} already exists",
                    task.task_id
                )));
            }
            if !offer.offers.iter().any(|o| o.slave_id == task.slave_id) {
                return Err(DriverError::InvalidArgument(format!(
                    "slave {} is not part of offer {offer_id}",
                    task.slave_id
                )));
            }
        }
        if let Some(offer) = self.offers.get_mut(offer_id) {
            offer.state = OfferState::Claimed;
        }
        for task in tasks {
            self.tasks.insert(
                task.task_id,
                TaskDescriptor {
                    slave_id: task.slave_id.clone(),
                    state: TaskState::Staging,
                },
            );
        }
        Ok(())
    }

    /// Returns whether the offer was open and is now rescinded.
    pub fn rescind_offer(&mut self, offer_id: &OfferId) -> bool {
        let Some(offer) = self.offers.get_mut(offer_id) else {
            warn!("offer {offer_id} not found");
            return false;
        };
        if !offer.state.is_open() {
            return false;
        }
        offer.state = OfferState::Rescinded;
        true
    }

    /// Returns whether the offer was open and is now expired.
    pub fn expire_offer(&mut self, offer_id: &OfferId) -> bool {
        let Some(offer) = self.offers.get_mut(offer_id) else {
            return false;
        };
        if !offer.state.is_open() {
            return false;
        }
        offer.state = OfferState::Expired;
        true
    }

    pub fn record_status(&mut self, status: &TaskStatus) -> StatusDisposition {
        let Some(task) = self.tasks.get_mut(&status.task_id) else {
            return StatusDisposition::Unknown;
        };
        if task.state.is_terminal() {
            if task.state == status.state {
                StatusDisposition::Duplicate
            } else {
                StatusDisposition::Stale
            }
        } else if task.state.may_precede(status.state) {
            task.state = status.state;
            StatusDisposition::Applied
        } else {
            StatusDisposition::Stale
        }
    }

    /// Forces tasks on a lost slave out of the live set and drops the
    /// slave's capacity from open offer batches.
    /// Returns the affected tasks and the offer batches emptied by the loss.
    pub fn mark_slave_lost(&mut self, slave_id: &SlaveId) -> (Vec<TaskId>, Vec<OfferId>) {
        let mut lost_tasks = vec![];
        for (&task_id, task) in self.tasks.iter_mut() {
            if task.slave_id == *slave_id && !task.state.is_terminal() {
                task.state = TaskState::Lost;
                lost_tasks.push(task_id);
            }
        }
        lost_tasks.sort();
        let mut emptied_offers = vec![];
        for (offer_id, offer) in self.offers.iter_mut() {
            if !offer.state.is_open() {
                continue;
            }
            offer.offers.retain(|o| o.slave_id != *slave_id);
            if offer.offers.is_empty() {
                offer.state = OfferState::Rescinded;
                emptied_offers.push(offer_id.clone());
            }
        }
        (lost_tasks, emptied_offers)
    }

    pub fn has_task(&self, task_id: TaskId) -> bool {
        self.tasks.contains_key(&task_id)
    }

    #[cfg(test)]
    pub fn offer_state(&self, offer_id: &OfferId) -> Option<OfferState> {
        self.offers.get(offer_id).map(|offer| offer.state)
    }

    #[cfg(test)]
    pub fn task_state(&self, task_id: TaskId) -> Option<TaskState> {
        self.tasks.get(&task_id).map(|task| task.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Params;

    fn offer(slave_id: &str) -> ResourceOffer {
        ResourceOffer {
            slave_id: SlaveId::new(slave_id),
            host: format!("{slave_id}.example.com"),
            params: Params::from([
                ("cpus".to_string(), "4".to_string()),
                ("mem".to_string(), "512".to_string()),
            ]),
        }
    }

    fn task(task_id: u64, slave_id: &str) -> TaskSpec {
        TaskSpec {
            task_id: TaskId::from(task_id),
            slave_id: SlaveId::new(slave_id),
            name: format!("task {task_id}"),
            params: Params::new(),
            data: vec![],
        }
    }

    #[test]
    fn test_claim_offer_once() {
        let mut state = SchedulerState::new();
        let offer_id = OfferId::new("o-1");
        assert!(state.add_offer(offer_id.clone(), vec![offer("s-1")]));
        assert!(state
            .claim_offer(&offer_id, &[task(0, "s-1"), task(1, "s-1")])
            .is_ok());
        assert_eq!(state.offer_state(&offer_id), Some(OfferState::Claimed));
        assert_eq!(state.task_state(TaskId::from(0)), Some(TaskState::Staging));
        // The second reply fails and has no side effects.
        assert_eq!(
            state.claim_offer(&offer_id, &[task(2, "s-1")]),
            Err(DriverError::OfferNotOpen(offer_id.clone()))
        );
        assert!(!state.has_task(TaskId::from(2)));
    }

    #[test]
    fn test_claim_unknown_offer() {
        let mut state = SchedulerState::new();
        let offer_id = OfferId::new("o-404");
        assert_eq!(
            state.claim_offer(&offer_id, &[]),
            Err(DriverError::OfferNotOpen(offer_id))
        );
    }

    #[test]
    fn test_claim_with_empty_task_list_is_a_decline() {
        let mut state = SchedulerState::new();
        let offer_id = OfferId::new("o-1");
        state.add_offer(offer_id.clone(), vec![offer("s-1")]);
        assert!(state.claim_offer(&offer_id, &[]).is_ok());
        assert_eq!(state.offer_state(&offer_id), Some(OfferState::Claimed));
    }

    #[test]
    fn test_claim_rejects_duplicate_tasks() {
        let mut state = SchedulerState::new();
        let offer_id = OfferId::new("o-1");
        state.add_offer(offer_id.clone(), vec![offer("s-1")]);
        let result = state.claim_offer(&offer_id, &[task(0, "s-1"), task(0, "s-1")]);
        assert!(matches!(result, Err(DriverError::InvalidArgument(_))));
        // A failed claim leaves the offer open.
        assert_eq!(state.offer_state(&offer_id), Some(OfferState::Offered));
    }

    #[test]
    fn test_claim_rejects_foreign_slave() {
        let mut state = SchedulerState::new();
        let offer_id = OfferId::new("o-1");
        state.add_offer(offer_id.clone(), vec![offer("s-1")]);
        let result = state.claim_offer(&offer_id, &[task(0, "s-2")]);
        assert!(matches!(result, Err(DriverError::InvalidArgument(_))));
        assert_eq!(state.offer_state(&offer_id), Some(OfferState::Offered));
    }

    #[test]
    fn test_rescind_then_claim() {
        let mut state = SchedulerState::new();
        let offer_id = OfferId::new("o-1");
        state.add_offer(offer_id.clone(), vec![offer("s-1")]);
        assert!(state.rescind_offer(&offer_id));
        assert!(!state.rescind_offer(&offer_id));
        assert_eq!(
            state.claim_offer(&offer_id, &[task(0, "s-1")]),
            Err(DriverError::OfferNotOpen(offer_id))
        );
    }

    #[test]
    fn test_expire_offer() {
        let mut state = SchedulerState::new();
        let offer_id = OfferId::new("o-1");
        state.add_offer(offer_id.clone(), vec![offer("s-1")]);
        assert!(state.expire_offer(&offer_id));
        assert_eq!(state.offer_state(&offer_id), Some(OfferState::Expired));
        // A claimed offer does not expire.
        let claimed = OfferId::new("o-2");
        state.add_offer(claimed.clone(), vec![offer("s-1")]);
        state.claim_offer(&claimed, &[]).unwrap();
        assert!(!state.expire_offer(&claimed));
        assert_eq!(state.offer_state(&claimed), Some(OfferState::Claimed));
    }

    #[test]
    fn test_record_status_progression() {
        let mut state = SchedulerState::new();
        let offer_id = OfferId::new("o-1");
        state.add_offer(offer_id.clone(), vec![offer("s-1")]);
        state.claim_offer(&offer_id, &[task(7, "s-1")]).unwrap();
        let task_id = TaskId::from(7);
        for task_state in [TaskState::Staging, TaskState::Running, TaskState::Finished] {
            assert_eq!(
                state.record_status(&TaskStatus::new(task_id, task_state)),
                StatusDisposition::Applied
            );
        }
        assert_eq!(
            state.record_status(&TaskStatus::new(task_id, TaskState::Finished)),
            StatusDisposition::Duplicate
        );
        assert_eq!(
            state.record_status(&TaskStatus::new(task_id, TaskState::Running)),
            StatusDisposition::Stale
        );
        assert_eq!(state.task_state(task_id), Some(TaskState::Finished));
    }

    #[test]
    fn test_record_status_unknown_task() {
        let mut state = SchedulerState::new();
        assert_eq!(
            state.record_status(&TaskStatus::new(TaskId::from(42), TaskState::Running)),
            StatusDisposition::Unknown
        );
    }

    #[test]
    fn test_mark_slave_lost() {
        let mut state = SchedulerState::new();
        let claimed = OfferId::new("o-1");
        state.add_offer(claimed.clone(), vec![offer("s-1")]);
        state.claim_offer(&claimed, &[task(3, "s-1")]).unwrap();
        let open = OfferId::new("o-2");
        state.add_offer(open.clone(), vec![offer("s-1"), offer("s-2")]);
        let emptied = OfferId::new("o-3");
        state.add_offer(emptied.clone(), vec![offer("s-1")]);

        let (lost_tasks, emptied_offers) = state.mark_slave_lost(&SlaveId::new("s-1"));
        assert_eq!(lost_tasks, vec![TaskId::from(3)]);
        assert_eq!(emptied_offers, vec![emptied.clone()]);
        assert_eq!(state.task_state(TaskId::from(3)), Some(TaskState::Lost));
        // The partially affected batch stays open with the remaining slave.
        assert_eq!(state.offer_state(&open), Some(OfferState::Offered));
        assert_eq!(state.offer_state(&emptied), Some(OfferState::Rescinded));
        // A late terminal status for the lost task is no longer applied.
        assert_eq!(
            state.record_status(&TaskStatus::new(TaskId::from(3), TaskState::Finished)),
            StatusDisposition::Stale
        );
    }
}
