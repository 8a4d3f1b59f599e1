// ABOUTME: Shared mocks for coordinator tests - a prompt-scripted agent service
// ABOUTME: and a session service that fails its first N child creations.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ExecutionContext, ExecutionController, RetryPolicy};
use crate::agent::{
    Agent, AgentOutput, AgentService, CapabilityRegistry, RegistryToolset, RunRequest,
    SubagentCapability,
};
use crate::error::{AgentError, SessionError};
use crate::llm::Usage;
use crate::session::{InMemorySessionService, Session, SessionService};
use crate::task::TaskRequest;
use crate::tool::Registry;

/// Cost each successful mock run records on its session.
pub const RUN_COST: f64 = 0.25;
pub const RUN_USAGE: Usage = Usage {
    input_tokens: 100,
    output_tokens: 40,
};

/// Agent service whose agents act on their prompt:
///
/// - `reply:TEXT` answers TEXT
/// - `slow:MS:TEXT` answers TEXT after MS milliseconds
/// - `fail:MSG` fails with MSG
/// - `hang` waits until cancelled
pub struct MockAgentService {
    sessions: Arc<dyn SessionService>,
    pub fail_build: bool,
    pub build_delay: Duration,
    pub running: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
    pub cancelled_sessions: Arc<Mutex<Vec<String>>>,
}

impl MockAgentService {
    pub fn new(sessions: Arc<dyn SessionService>) -> Self {
        Self {
            sessions,
            fail_build: false,
            build_delay: Duration::ZERO,
            running: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            cancelled_sessions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentService for MockAgentService {
    async fn build(
        &self,
        capability: &SubagentCapability,
        _tools: Registry,
    ) -> Result<Arc<dyn Agent>, AgentError> {
        tokio::time::sleep(self.build_delay).await;
        if self.fail_build {
            return Err(AgentError::Build(format!("no agent for {}", capability.name)));
        }
        Ok(Arc::new(MockAgent {
            sessions: Arc::clone(&self.sessions),
            running: Arc::clone(&self.running),
            peak: Arc::clone(&self.peak),
            cancelled_sessions: Arc::clone(&self.cancelled_sessions),
        }))
    }
}

struct MockAgent {
    sessions: Arc<dyn SessionService>,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    cancelled_sessions: Arc<Mutex<Vec<String>>>,
}

struct RunningGuard(Arc<AtomicUsize>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockAgent {
    async fn reply(&self, request: &RunRequest, text: &str) -> Result<AgentOutput, AgentError> {
        let mut session = self.sessions.get(&request.session_id).await?;
        session.record_usage(&RUN_USAGE, RUN_COST);
        self.sessions.save(session).await?;
        Ok(AgentOutput {
            content: text.to_string(),
            usage: RUN_USAGE,
            tool_use_count: 0,
            iterations: 1,
        })
    }
}

#[async_trait]
impl Agent for MockAgent {
    async fn run(&self, request: RunRequest) -> Result<AgentOutput, AgentError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = RunningGuard(Arc::clone(&self.running));

        let prompt = request.prompt.clone();
        if let Some(text) = prompt.strip_prefix("reply:") {
            return self.reply(&request, text).await;
        }
        if let Some(rest) = prompt.strip_prefix("slow:") {
            let (ms, text) = rest.split_once(':').unwrap_or((rest, ""));
            let ms: u64 = ms.parse().unwrap_or(0);
            tokio::select! {
                () = request.cancel.cancelled() => return Err(AgentError::Cancelled),
                () = tokio::time::sleep(Duration::from_millis(ms)) => {}
            }
            return self.reply(&request, text).await;
        }
        if let Some(msg) = prompt.strip_prefix("fail:") {
            return Err(AgentError::Failed(msg.to_string()));
        }
        request.cancel.cancelled().await;
        Err(AgentError::Cancelled)
    }

    fn cancel(&self, session_id: &str) {
        self.cancelled_sessions.lock().push(session_id.to_string());
    }
}

/// In-memory sessions whose first `failures` child creations fail.
pub struct FlakySessions {
    pub inner: InMemorySessionService,
    failures_left: AtomicU32,
    pub create_calls: AtomicU32,
}

impl FlakySessions {
    pub fn new(failures: u32) -> Self {
        Self {
            inner: InMemorySessionService::new(),
            failures_left: AtomicU32::new(failures),
            create_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl SessionService for FlakySessions {
    async fn create(&self, title: &str) -> Result<Session, SessionError> {
        self.inner.create(title).await
    }

    async fn create_child(&self, parent_id: &str, title: &str) -> Result<Session, SessionError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SessionError::Storage("store unavailable".into()));
        }
        self.inner.create_child(parent_id, title).await
    }

    async fn get(&self, id: &str) -> Result<Session, SessionError> {
        self.inner.get(id).await
    }

    async fn save(&self, session: Session) -> Result<Session, SessionError> {
        self.inner.save(session).await
    }
}

pub fn task(prompt: &str) -> TaskRequest {
    TaskRequest {
        description: format!("run {prompt}"),
        prompt: prompt.to_string(),
        subagent_type: "general".to_string(),
    }
}

/// A controller over the built-in capabilities with no retry policy set.
pub fn controller(
    sessions: Arc<dyn SessionService>,
    agents: Arc<MockAgentService>,
) -> ExecutionController {
    ExecutionController::new(
        CapabilityRegistry::builtin(),
        sessions,
        agents,
        Arc::new(RegistryToolset::new(Registry::new())),
    )
}

/// A controller over `sessions` plus a fresh parent session.
pub struct Harness {
    pub sessions: Arc<dyn SessionService>,
    pub agents: Arc<MockAgentService>,
    pub controller: Arc<ExecutionController>,
    pub parent: Session,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_sessions(Arc::new(InMemorySessionService::new()), false).await
    }

    pub async fn with_sessions(sessions: Arc<dyn SessionService>, fail_build: bool) -> Self {
        let mut agents = MockAgentService::new(Arc::clone(&sessions));
        agents.fail_build = fail_build;
        Self::with_agents(sessions, agents).await
    }

    pub async fn with_agents(sessions: Arc<dyn SessionService>, agents: MockAgentService) -> Self {
        let agents = Arc::new(agents);
        let controller = controller(Arc::clone(&sessions), agents.clone())
            .with_retry_policy(RetryPolicy::no_backoff(3));

        let parent = sessions.create("parent").await.unwrap();
        Self {
            sessions,
            agents,
            controller: Arc::new(controller),
            parent,
        }
    }

    pub fn context(&self, timeout: Duration) -> ExecutionContext {
        ExecutionContext::new(&self.parent.id, timeout)
    }

    pub async fn parent_now(&self) -> Session {
        self.sessions.get(&self.parent.id).await.unwrap()
    }
}
