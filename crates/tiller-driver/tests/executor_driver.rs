use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tiller_actor::RetryStrategy;
use tiller_driver::connection::{AgentConnection, AgentEvent, ExecutorCall};
use tiller_driver::error::{DriverError, DriverResult};
use tiller_driver::executor::{Executor, ExecutorDriver, ExecutorOptions};
use tiller_driver::{
    ExecutorContext, FrameworkId, FrameworkMessage, Params, SlaveId, TaskId, TaskSpec, TaskState,
    TaskStatus,
};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, timeout};

struct MockAgent {
    calls: mpsc::UnboundedSender<ExecutorCall>,
    events: Mutex<Option<mpsc::Sender<AgentEvent>>>,
    connect_failures: Mutex<usize>,
}

impl MockAgent {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ExecutorCall>) {
        Self::failing(0)
    }

    fn failing(failures: usize) -> (Arc<Self>, mpsc::UnboundedReceiver<ExecutorCall>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let agent = Arc::new(Self {
            calls: tx,
            events: Mutex::new(None),
            connect_failures: Mutex::new(failures),
        });
        (agent, rx)
    }

    async fn push(&self, event: AgentEvent) {
        let events = self.events.lock().await;
        if let Some(events) = events.as_ref() {
            let _ = events.send(event).await;
        }
    }
}

#[async_trait]
impl AgentConnection for MockAgent {
    async fn connect(&self, events: mpsc::Sender<AgentEvent>) -> DriverResult<()> {
        {
            let mut failures = self.connect_failures.lock().await;
            if *failures > 0 {
                *failures -= 1;
                return Err(DriverError::ConnectionFailed(
                    "mock connect failure".to_string(),
                ));
            }
        }
        *self.events.lock().await = Some(events);
        Ok(())
    }

    async fn call(&self, call: ExecutorCall) -> DriverResult<()> {
        self.calls
            .send(call)
            .map_err(|_| DriverError::ConnectionFailed("mock agent is gone".to_string()))
    }
}

#[derive(Debug)]
enum Callback {
    Init(ExecutorContext),
    LaunchTask(TaskSpec),
    KillTask(TaskId),
    FrameworkMessage(FrameworkMessage),
    Shutdown,
    Error(DriverError),
}

struct TestExecutor {
    callbacks: mpsc::UnboundedSender<Callback>,
}

impl TestExecutor {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Callback>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { callbacks: tx }), rx)
    }
}

#[async_trait]
impl Executor for TestExecutor {
    async fn init(&self, _driver: &ExecutorDriver, context: ExecutorContext) {
        let _ = self.callbacks.send(Callback::Init(context));
    }

    async fn launch_task(&self, _driver: &ExecutorDriver, task: TaskSpec) {
        let _ = self.callbacks.send(Callback::LaunchTask(task));
    }

    async fn kill_task(&self, _driver: &ExecutorDriver, task_id: TaskId) {
        let _ = self.callbacks.send(Callback::KillTask(task_id));
    }

    async fn framework_message(&self, _driver: &ExecutorDriver, message: FrameworkMessage) {
        let _ = self.callbacks.send(Callback::FrameworkMessage(message));
    }

    async fn shutdown(&self, _driver: &ExecutorDriver) {
        let _ = self.callbacks.send(Callback::Shutdown);
    }

    async fn error(&self, _driver: &ExecutorDriver, error: DriverError) {
        let _ = self.callbacks.send(Callback::Error(error));
    }
}

fn options() -> ExecutorOptions {
    ExecutorOptions {
        event_buffer: 16,
        // Long enough that tests without acknowledgements see no resends.
        status_retry_interval: Duration::from_secs(10),
        status_retry_max_attempts: 3,
        registration_retry: RetryStrategy::Fixed {
            max_count: 2,
            delay: Duration::from_millis(10),
        },
    }
}

async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("channel closed")
}

fn context() -> ExecutorContext {
    ExecutorContext {
        slave_id: SlaveId::new("s-1"),
        host: "s-1.example.com".to_string(),
        framework_id: FrameworkId::new("f-1"),
        framework_name: "test framework".to_string(),
        data: vec![],
    }
}

async fn register(agent: &MockAgent, calls: &mut mpsc::UnboundedReceiver<ExecutorCall>) {
    let call = recv(calls).await;
    assert!(matches!(call, ExecutorCall::Register));
    agent
        .push(AgentEvent::Registered { context: context() })
        .await;
}

fn task(task_id: u64) -> TaskSpec {
    TaskSpec {
        task_id: TaskId::from(task_id),
        slave_id: SlaveId::new("s-1"),
        name: format!("task {task_id}"),
        params: Params::new(),
        data: vec![],
    }
}

fn message(task_id: u64) -> FrameworkMessage {
    FrameworkMessage {
        slave_id: SlaveId::new("s-1"),
        task_id: TaskId::from(task_id),
        data: b"pong".to_vec(),
    }
}

#[tokio::test]
async fn test_init_is_delivered_before_launch() {
    let (agent, mut calls) = MockAgent::new();
    let (executor, mut callbacks) = TestExecutor::new();
    let driver = ExecutorDriver::new(executor, agent.clone(), options());
    driver.start().await.unwrap();
    register(&agent, &mut calls).await;
    match recv(&mut callbacks).await {
        Callback::Init(context) => {
            assert_eq!(context.slave_id, SlaveId::new("s-1"));
            assert_eq!(context.framework_name, "test framework");
        }
        other => panic!("unexpected callback: {other:?}"),
    }

    agent.push(AgentEvent::RunTask { task: task(7) }).await;
    match recv(&mut callbacks).await {
        Callback::LaunchTask(task) => assert_eq!(task.task_id, TaskId::from(7)),
        other => panic!("unexpected callback: {other:?}"),
    }

    driver.stop().await;
    driver.join().await.unwrap();
}

#[tokio::test]
async fn test_launch_before_init_is_dropped() {
    let (agent, mut calls) = MockAgent::new();
    let (executor, mut callbacks) = TestExecutor::new();
    let driver = ExecutorDriver::new(executor, agent.clone(), options());
    driver.start().await.unwrap();
    let call = recv(&mut calls).await;
    assert!(matches!(call, ExecutorCall::Register));

    // A task arriving before the registration reply violates the protocol
    // and is not forwarded.
    agent.push(AgentEvent::RunTask { task: task(7) }).await;
    agent
        .push(AgentEvent::Registered { context: context() })
        .await;
    agent.push(AgentEvent::Message { message: message(7) }).await;
    match recv(&mut callbacks).await {
        Callback::Init(_) => {}
        other => panic!("unexpected callback: {other:?}"),
    }
    match recv(&mut callbacks).await {
        Callback::FrameworkMessage(_) => {}
        other => panic!("unexpected callback: {other:?}"),
    }

    driver.stop().await;
    driver.join().await.unwrap();
}

#[tokio::test]
async fn test_status_updates_carry_increasing_sequences() {
    let (agent, mut calls) = MockAgent::new();
    let (executor, mut callbacks) = TestExecutor::new();
    let driver = ExecutorDriver::new(executor, agent.clone(), options());
    driver.start().await.unwrap();
    register(&agent, &mut calls).await;
    recv(&mut callbacks).await;
    agent.push(AgentEvent::RunTask { task: task(7) }).await;
    recv(&mut callbacks).await;

    let task_id = TaskId::from(7);
    for state in [TaskState::Staging, TaskState::Running, TaskState::Finished] {
        driver
            .send_status_update(TaskStatus::new(task_id, state))
            .await
            .unwrap();
    }
    let mut last_sequence = 0;
    for expected in [TaskState::Staging, TaskState::Running, TaskState::Finished] {
        match recv(&mut calls).await {
            ExecutorCall::StatusUpdate { status, sequence } => {
                assert_eq!(status.task_id, task_id);
                assert_eq!(status.state, expected);
                assert!(sequence > last_sequence);
                last_sequence = sequence;
            }
            other => panic!("unexpected call: {other:?}"),
        }
    }

    driver.stop().await;
    driver.join().await.unwrap();
}

#[tokio::test]
async fn test_status_update_is_resent_until_acknowledged() {
    let (agent, mut calls) = MockAgent::new();
    let (executor, mut callbacks) = TestExecutor::new();
    let mut options = options();
    options.status_retry_interval = Duration::from_millis(30);
    options.status_retry_max_attempts = 100;
    let driver = ExecutorDriver::new(executor, agent.clone(), options);
    driver.start().await.unwrap();
    register(&agent, &mut calls).await;
    recv(&mut callbacks).await;
    agent.push(AgentEvent::RunTask { task: task(7) }).await;
    recv(&mut callbacks).await;

    let task_id = TaskId::from(7);
    driver
        .send_status_update(TaskStatus::new(task_id, TaskState::Running))
        .await
        .unwrap();

    // The update is delivered and then redelivered with the same sequence.
    let sequence = match recv(&mut calls).await {
        ExecutorCall::StatusUpdate { sequence, .. } => sequence,
        other => panic!("unexpected call: {other:?}"),
    };
    match recv(&mut calls).await {
        ExecutorCall::StatusUpdate {
            sequence: resent, ..
        } => assert_eq!(resent, sequence),
        other => panic!("unexpected call: {other:?}"),
    }

    agent.push(AgentEvent::StatusAck { task_id, sequence }).await;
    // Resends already in flight may still arrive; after a quiet period the
    // stream dries up.
    sleep(Duration::from_millis(150)).await;
    while calls.try_recv().is_ok() {}
    sleep(Duration::from_millis(150)).await;
    assert!(calls.try_recv().is_err());

    driver.stop().await;
    driver.join().await.unwrap();
}

#[tokio::test]
async fn test_status_update_undeliverable_after_attempt_cap() {
    let (agent, mut calls) = MockAgent::new();
    let (executor, mut callbacks) = TestExecutor::new();
    let mut options = options();
    options.status_retry_interval = Duration::from_millis(20);
    options.status_retry_max_attempts = 2;
    let driver = ExecutorDriver::new(executor, agent.clone(), options);
    driver.start().await.unwrap();
    register(&agent, &mut calls).await;
    recv(&mut callbacks).await;
    agent.push(AgentEvent::RunTask { task: task(7) }).await;
    recv(&mut callbacks).await;

    let task_id = TaskId::from(7);
    driver
        .send_status_update(TaskStatus::new(task_id, TaskState::Running))
        .await
        .unwrap();

    match recv(&mut callbacks).await {
        Callback::Error(DriverError::Undeliverable {
            task_id: id,
            attempts,
        }) => {
            assert_eq!(id, task_id);
            assert_eq!(attempts, 2);
        }
        other => panic!("unexpected callback: {other:?}"),
    }

    driver.stop().await;
    driver.join().await.unwrap();
}

#[tokio::test]
async fn test_status_update_validation() {
    let (agent, mut calls) = MockAgent::new();
    let (executor, mut callbacks) = TestExecutor::new();
    let driver = ExecutorDriver::new(executor, agent.clone(), options());
    driver.start().await.unwrap();
    register(&agent, &mut calls).await;
    recv(&mut callbacks).await;

    // Status updates for tasks that were never launched are rejected.
    let result = driver
        .send_status_update(TaskStatus::new(TaskId::from(1), TaskState::Running))
        .await;
    assert_eq!(result, Err(DriverError::UnknownTask(TaskId::from(1))));

    agent.push(AgentEvent::RunTask { task: task(7) }).await;
    recv(&mut callbacks).await;
    let task_id = TaskId::from(7);
    driver
        .send_status_update(TaskStatus::new(task_id, TaskState::Finished))
        .await
        .unwrap();
    // A task never leaves its terminal state.
    let result = driver
        .send_status_update(TaskStatus::new(task_id, TaskState::Running))
        .await;
    assert!(matches!(result, Err(DriverError::InvalidArgument(_))));

    driver.stop().await;
    driver.join().await.unwrap();
}

#[tokio::test]
async fn test_kill_of_terminal_task_is_noop() {
    let (agent, mut calls) = MockAgent::new();
    let (executor, mut callbacks) = TestExecutor::new();
    let driver = ExecutorDriver::new(executor, agent.clone(), options());
    driver.start().await.unwrap();
    register(&agent, &mut calls).await;
    recv(&mut callbacks).await;

    agent.push(AgentEvent::RunTask { task: task(7) }).await;
    recv(&mut callbacks).await;
    agent.push(AgentEvent::RunTask { task: task(8) }).await;
    recv(&mut callbacks).await;

    driver
        .send_status_update(TaskStatus::new(TaskId::from(7), TaskState::Finished))
        .await
        .unwrap();

    // The finished task keeps its reported status; only the active task
    // sees a kill request.
    agent
        .push(AgentEvent::KillTask {
            task_id: TaskId::from(7),
        })
        .await;
    agent
        .push(AgentEvent::KillTask {
            task_id: TaskId::from(8),
        })
        .await;
    match recv(&mut callbacks).await {
        Callback::KillTask(task_id) => assert_eq!(task_id, TaskId::from(8)),
        other => panic!("unexpected callback: {other:?}"),
    }

    driver.stop().await;
    driver.join().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_requested_by_agent() {
    let (agent, mut calls) = MockAgent::new();
    let (executor, mut callbacks) = TestExecutor::new();
    let driver = ExecutorDriver::new(executor, agent.clone(), options());
    driver.start().await.unwrap();
    register(&agent, &mut calls).await;
    recv(&mut callbacks).await;

    agent.push(AgentEvent::Shutdown).await;
    match recv(&mut callbacks).await {
        Callback::Shutdown => {}
        other => panic!("unexpected callback: {other:?}"),
    }
    // The driver terminates without an explicit stop.
    driver.join().await.unwrap();
}

#[tokio::test]
async fn test_framework_messages_flow_both_ways() {
    let (agent, mut calls) = MockAgent::new();
    let (executor, mut callbacks) = TestExecutor::new();
    let driver = ExecutorDriver::new(executor, agent.clone(), options());
    driver.start().await.unwrap();
    register(&agent, &mut calls).await;
    recv(&mut callbacks).await;

    driver.send_framework_message(message(0)).await.unwrap();
    match recv(&mut calls).await {
        ExecutorCall::Message { message } => assert_eq!(message.data, b"pong".to_vec()),
        other => panic!("unexpected call: {other:?}"),
    }

    agent.push(AgentEvent::Message { message: message(0) }).await;
    match recv(&mut callbacks).await {
        Callback::FrameworkMessage(message) => assert_eq!(message.data, b"pong".to_vec()),
        other => panic!("unexpected callback: {other:?}"),
    }

    driver.stop().await;
    driver.join().await.unwrap();
}

#[tokio::test]
async fn test_registration_retries_transient_connect_failures() {
    let (agent, mut calls) = MockAgent::failing(2);
    let (executor, mut callbacks) = TestExecutor::new();
    let driver = ExecutorDriver::new(executor, agent.clone(), options());
    driver.start().await.unwrap();
    register(&agent, &mut calls).await;
    assert!(matches!(recv(&mut callbacks).await, Callback::Init(_)));
    driver.stop().await;
    driver.join().await.unwrap();
}

#[tokio::test]
async fn test_stop_discards_queued_callbacks() {
    let (agent, mut calls) = MockAgent::new();
    let (executor, mut callbacks) = TestExecutor::new();
    let driver = ExecutorDriver::new(executor, agent.clone(), options());
    driver.start().await.unwrap();
    register(&agent, &mut calls).await;
    recv(&mut callbacks).await;

    driver.stop().await;
    driver.join().await.unwrap();
    agent.push(AgentEvent::RunTask { task: task(7) }).await;
    sleep(Duration::from_millis(100)).await;
    assert!(callbacks.try_recv().is_err());

    // Commands fail once the driver has stopped.
    assert_eq!(
        driver
            .send_status_update(TaskStatus::new(TaskId::from(7), TaskState::Running))
            .await,
        Err(DriverError::NotRunning)
    );
}
