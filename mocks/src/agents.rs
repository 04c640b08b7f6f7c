//! Stub agent substrates for testing the orchestration core without a real
//! agent backend.
//!
//! Every stub records its invocations so tests can assert call counts,
//! ordering, and timing (the recorded instants respect a paused tokio clock).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use workflow_core::{AgentContext, AgentResponse, AgentSubstrate, Result, WorkflowError};

/// One recorded agent invocation
#[derive(Debug, Clone)]
pub struct AgentCall {
    pub task_id: String,
    pub agent_type: String,
    pub prompt: String,
    pub at: tokio::time::Instant,
}

#[derive(Default)]
struct CallLog {
    calls: Mutex<Vec<AgentCall>>,
}

impl CallLog {
    fn record(&self, prompt: &str, context: &AgentContext) {
        self.calls.lock().push(AgentCall {
            task_id: context.task_id.clone(),
            agent_type: context.agent_type.clone(),
            prompt: prompt.to_string(),
            at: tokio::time::Instant::now(),
        });
    }

    fn all(&self) -> Vec<AgentCall> {
        self.calls.lock().clone()
    }
}

macro_rules! call_log_accessors {
    () => {
        /// All recorded invocations, in call order
        pub fn calls(&self) -> Vec<AgentCall> {
            self.log.all()
        }

        /// Total number of invocations
        pub fn call_count(&self) -> usize {
            self.log.calls.lock().len()
        }

        /// Recorded invocations for one task
        pub fn calls_for(&self, task_id: &str) -> Vec<AgentCall> {
            self.log
                .all()
                .into_iter()
                .filter(|call| call.task_id == task_id)
                .collect()
        }
    };
}

/// Echoes the prompt back as the output
#[derive(Default)]
pub struct EchoAgent {
    log: CallLog,
}

impl EchoAgent {
    pub fn new() -> Self {
        Self::default()
    }

    call_log_accessors!();
}

#[async_trait]
impl AgentSubstrate for EchoAgent {
    async fn run(&self, prompt: &str, context: &AgentContext) -> Result<AgentResponse> {
        self.log.record(prompt, context);
        Ok(AgentResponse::new(prompt))
    }
}

/// Produces `"ok:<task_id>"` for every call, the conventional stub for
/// end-to-end scenarios
pub struct StubAgent {
    log: CallLog,
    respond: Box<dyn Fn(&AgentContext) -> Result<String> + Send + Sync>,
}

impl StubAgent {
    /// Stub returning `"ok:<task_id>"`
    pub fn ok_for_task() -> Self {
        Self::with(|context| Ok(format!("ok:{}", context.task_id)))
    }

    /// Stub with a custom response function
    pub fn with(respond: impl Fn(&AgentContext) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            log: CallLog::default(),
            respond: Box::new(respond),
        }
    }

    call_log_accessors!();
}

#[async_trait]
impl AgentSubstrate for StubAgent {
    async fn run(&self, prompt: &str, context: &AgentContext) -> Result<AgentResponse> {
        self.log.record(prompt, context);
        (self.respond)(context).map(AgentResponse::new)
    }
}

/// Fails the first `failures` calls per task with the given message, then
/// succeeds with `"ok:<task_id>"`
pub struct FlakyAgent {
    log: CallLog,
    failures: u32,
    message: String,
    attempts: Mutex<HashMap<String, u32>>,
}

impl FlakyAgent {
    pub fn new(failures: u32, message: impl Into<String>) -> Self {
        Self {
            log: CallLog::default(),
            failures,
            message: message.into(),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    call_log_accessors!();
}

#[async_trait]
impl AgentSubstrate for FlakyAgent {
    async fn run(&self, prompt: &str, context: &AgentContext) -> Result<AgentResponse> {
        self.log.record(prompt, context);
        let attempt = {
            let mut attempts = self.attempts.lock();
            let counter = attempts.entry(context.task_id.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        if attempt <= self.failures {
            Err(WorkflowError::task_execution(self.message.clone()))
        } else {
            Ok(AgentResponse::new(format!("ok:{}", context.task_id)))
        }
    }
}

/// Always fails with the given message
pub struct FailingAgent {
    log: CallLog,
    message: String,
}

impl FailingAgent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            log: CallLog::default(),
            message: message.into(),
        }
    }

    call_log_accessors!();
}

#[async_trait]
impl AgentSubstrate for FailingAgent {
    async fn run(&self, prompt: &str, context: &AgentContext) -> Result<AgentResponse> {
        self.log.record(prompt, context);
        Err(WorkflowError::task_execution(self.message.clone()))
    }
}

/// Sleeps for a fixed duration before answering `"ok:<task_id>"`; useful for
/// timeout and concurrency tests under a paused clock
pub struct SlowAgent {
    log: CallLog,
    delay: Duration,
}

impl SlowAgent {
    pub fn new(delay: Duration) -> Self {
        Self {
            log: CallLog::default(),
            delay,
        }
    }

    call_log_accessors!();
}

#[async_trait]
impl AgentSubstrate for SlowAgent {
    async fn run(&self, prompt: &str, context: &AgentContext) -> Result<AgentResponse> {
        self.log.record(prompt, context);
        tokio::time::sleep(self.delay).await;
        Ok(AgentResponse::new(format!("ok:{}", context.task_id)))
    }
}
