use crate::agents::{Agent, AgentEvent};
use crate::error::LogError;
use crate::log::{InteractionLog, TurnRecord};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const CANCELLED_MESSAGE: &str = "turn cancelled";

/// Read-only view of a growing transcript, polled by the presentation layer.
pub trait Transcript {
    fn turn_count(&self) -> usize;
    fn turn_at(&self, index: usize) -> Result<TurnRecord, LogError>;
}

#[derive(Default)]
struct SessionState {
    log: InteractionLog,
    /// `Some` exactly while a drain task owns the current subscription.
    in_flight: Option<CancellationToken>,
}

impl SessionState {
    fn is_running(&self) -> bool {
        self.in_flight.is_some()
    }
}

/// Owns the conversation log and admits one agent turn at a time.
///
/// `submit` returns immediately; the agent is driven by a drain task on the
/// runtime handed to [`Controller::new`]. Every lock taken here is released
/// before any `.await`, so the render loop never waits on the provider.
pub struct Controller {
    agent: Arc<dyn Agent>,
    state: Arc<RwLock<SessionState>>,
    runtime: Handle,
}

impl Controller {
    pub fn new(agent: Arc<dyn Agent>, runtime: Handle) -> Self {
        Self {
            agent,
            state: Arc::new(RwLock::new(SessionState::default())),
            runtime,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn can_submit(&self, prompt: &str) -> bool {
        !self.read().is_running() && !prompt.trim().is_empty()
    }

    /// Start a turn for `prompt`. Returns `false`, changing nothing, when the
    /// prompt is blank or a turn is already running.
    pub fn submit(&self, prompt: &str) -> bool {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return false;
        }

        let cancel = CancellationToken::new();
        {
            let mut state = write(&self.state);
            if state.is_running() {
                debug!("submit rejected: a turn is already running");
                return false;
            }
            state.in_flight = Some(cancel.clone());
            state.log.append(TurnRecord::prompt(prompt));
        }
        info!("started processing prompt ({} chars)", prompt.len());

        let drain = Drain {
            agent: Arc::clone(&self.agent),
            state: Arc::clone(&self.state),
            cancel,
        };
        self.runtime.spawn(drain.run(prompt.to_string()));
        true
    }

    /// Abort the in-flight turn. Returns `false` when idle.
    pub fn stop(&self) -> bool {
        match &self.read().in_flight {
            Some(cancel) => {
                info!("cancelling in-flight turn");
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.read().is_running()
    }

    pub fn turn_count(&self) -> usize {
        self.read().log.count()
    }

    pub fn turn_at(&self, index: usize) -> Result<TurnRecord, LogError> {
        self.read().log.at(index)
    }
}

impl Transcript for Controller {
    fn turn_count(&self) -> usize {
        Controller::turn_count(self)
    }

    fn turn_at(&self, index: usize) -> Result<TurnRecord, LogError> {
        Controller::turn_at(self, index)
    }
}

fn write(state: &RwLock<SessionState>) -> RwLockWriteGuard<'_, SessionState> {
    state.write().unwrap_or_else(|e| e.into_inner())
}

/// Background task that owns one subscription and appends what it yields.
struct Drain {
    agent: Arc<dyn Agent>,
    state: Arc<RwLock<SessionState>>,
    cancel: CancellationToken,
}

impl Drain {
    async fn run(self, prompt: String) {
        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.append(TurnRecord::error(CANCELLED_MESSAGE));
                return self.finish();
            }
            opened = self.agent.ask(&prompt) => opened,
        };
        let mut subscription = match opened {
            Ok(s) => s,
            Err(e) => {
                error!("{e}");
                self.append(TurnRecord::error(e.to_string()));
                return self.finish();
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.append(TurnRecord::error(CANCELLED_MESSAGE));
                    break;
                }
                next = subscription.next() => next,
            };
            match next {
                None => break,
                Some(AgentEvent::Error(message)) => {
                    warn!("agent stream ended with error: {message}");
                    self.append(TurnRecord::error(message));
                    break;
                }
                Some(event) => self.append(event.into()),
            }
        }
        drop(subscription);
        self.finish();
    }

    fn append(&self, record: TurnRecord) {
        write(&self.state).log.append(record);
    }

    fn finish(&self) {
        write(&self.state).in_flight = None;
        debug!("drain finished, controller idle");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{OrenoAgentBuilder, Subscription};
    use crate::config::OrenoConfig;
    use crate::error::SessionError;
    use crate::providers::scripted::{ScriptStep, ScriptedProvider};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn controller_for(provider: ScriptedProvider) -> Controller {
        controller_sharing(Arc::new(provider))
    }

    fn controller_sharing(provider: Arc<ScriptedProvider>) -> Controller {
        let agent = OrenoAgentBuilder::new(OrenoConfig::default(), provider).build();
        Controller::new(agent, Handle::current())
    }

    async fn wait_idle(controller: &Controller) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while controller.is_running() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("drain did not finish");
    }

    fn records(controller: &Controller) -> Vec<TurnRecord> {
        (0..controller.turn_count())
            .map(|i| controller.turn_at(i).unwrap())
            .collect()
    }

    // ── validation ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn blank_prompts_cannot_be_submitted() {
        let controller = controller_for(ScriptedProvider::new());
        assert!(!controller.can_submit(""));
        assert!(!controller.can_submit("   "));
        assert!(controller.can_submit("hello"));

        assert!(!controller.submit(" \t\n"));
        assert_eq!(controller.turn_count(), 0);
        assert!(!controller.is_running());
    }

    #[tokio::test]
    async fn submit_trims_the_prompt() {
        let controller = controller_for(ScriptedProvider::new().round(vec![]));
        assert!(controller.submit("  hello  "));
        assert_eq!(controller.turn_at(0).unwrap(), TurnRecord::prompt("hello"));
        wait_idle(&controller).await;
    }

    // ── single in-flight turn ────────────────────────────────────────────────

    #[tokio::test]
    async fn submits_while_running_are_rejected() {
        let gate = Arc::new(Notify::new());
        let controller = controller_for(ScriptedProvider::new().round(vec![
            ScriptStep::text("working"),
            ScriptStep::Wait(Arc::clone(&gate)),
            ScriptStep::text("done"),
        ]));

        assert!(controller.submit("first"));
        assert!(controller.is_running());
        assert!(!controller.can_submit("second"));
        for _ in 0..10 {
            assert!(!controller.submit("second"));
        }
        assert!(records(&controller)
            .iter()
            .all(|r| *r != TurnRecord::prompt("second")));

        gate.notify_one();
        wait_idle(&controller).await;
        assert!(controller.can_submit("second"));
        assert_eq!(
            records(&controller),
            vec![
                TurnRecord::prompt("first"),
                TurnRecord::message("working"),
                TurnRecord::message("done"),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_submits_admit_exactly_one() {
        let gate = Arc::new(Notify::new());
        let controller = Arc::new(controller_for(
            ScriptedProvider::new().round(vec![ScriptStep::Wait(Arc::clone(&gate))]),
        ));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let c = Arc::clone(&controller);
                tokio::task::spawn_blocking(move || c.submit(&format!("prompt {i}")))
            })
            .collect();
        let mut accepted = 0;
        for h in handles {
            if h.await.unwrap() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(controller.turn_count(), 1);
        gate.notify_one();
        wait_idle(&controller).await;
    }

    // ── ordering and reads ───────────────────────────────────────────────────

    #[tokio::test]
    async fn records_follow_arrival_order() {
        let controller = controller_for(ScriptedProvider::new().round(vec![
            ScriptStep::text("a"),
            ScriptStep::reasoning("b"),
            ScriptStep::text("c"),
            ScriptStep::done(),
        ]));

        assert!(controller.submit("go"));
        wait_idle(&controller).await;

        assert_eq!(controller.turn_count(), 4);
        assert_eq!(controller.turn_at(1).unwrap(), TurnRecord::message("a"));
        assert_eq!(controller.turn_at(2).unwrap(), TurnRecord::reasoning("b"));
        assert_eq!(controller.turn_at(3).unwrap(), TurnRecord::message("c"));
        assert_eq!(controller.turn_at(2).unwrap(), controller.turn_at(2).unwrap());
    }

    #[tokio::test]
    async fn reading_past_the_end_is_out_of_range() {
        let controller = controller_for(ScriptedProvider::new());
        assert_eq!(
            controller.turn_at(controller.turn_count()),
            Err(LogError::IndexOutOfRange { index: 0, len: 0 })
        );
    }

    #[tokio::test]
    async fn partial_content_is_visible_before_the_turn_ends() {
        let gate = Arc::new(Notify::new());
        let controller = controller_for(ScriptedProvider::new().round(vec![
            ScriptStep::text("Hel"),
            ScriptStep::Wait(Arc::clone(&gate)),
            ScriptStep::text("lo"),
        ]));

        controller.submit("hi");
        tokio::time::timeout(Duration::from_secs(5), async {
            while controller.turn_count() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(controller.is_running());
        assert_eq!(controller.turn_at(1).unwrap().text(), "Hel");

        gate.notify_one();
        wait_idle(&controller).await;
        assert_eq!(controller.turn_count(), 3);
    }

    // ── tools ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn what_time_is_it() {
        let controller = controller_for(
            ScriptedProvider::new()
                .round(vec![ScriptStep::tool_call("call_1", "currentTime", "{}")])
                .round(vec![ScriptStep::text("It is noon."), ScriptStep::done()]),
        );

        assert!(controller.submit("What time is it?"));
        assert_eq!(controller.turn_count(), 1);
        assert!(controller.is_running());

        wait_idle(&controller).await;
        assert_eq!(
            records(&controller),
            vec![
                TurnRecord::prompt("What time is it?"),
                TurnRecord::tool_call("currentTime", "{}"),
                TurnRecord::message("It is noon."),
            ]
        );
    }

    #[tokio::test]
    async fn malformed_tool_arguments_keep_the_drain_going() {
        let controller = controller_for(
            ScriptedProvider::new()
                .round(vec![ScriptStep::tool_call("c1", "webSearch", "{oops")])
                .round(vec![ScriptStep::text("The search failed.")]),
        );

        controller.submit("search something");
        wait_idle(&controller).await;
        assert_eq!(
            controller.turn_at(2).unwrap(),
            TurnRecord::message("The search failed.")
        );
    }

    // ── failures ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn stream_error_is_appended_and_session_returns_idle() {
        let controller = controller_for(ScriptedProvider::new().round(vec![
            ScriptStep::text("partial"),
            ScriptStep::Fail("connection reset".into()),
        ]));

        controller.submit("hi");
        wait_idle(&controller).await;
        assert_eq!(
            records(&controller),
            vec![
                TurnRecord::prompt("hi"),
                TurnRecord::message("partial"),
                TurnRecord::error("connection reset"),
            ]
        );
        assert!(controller.can_submit("again"));
    }

    #[tokio::test]
    async fn session_creation_failure_is_visible() {
        let controller = controller_for(ScriptedProvider::new().refuse("provider unreachable"));

        assert!(controller.submit("hi"));
        wait_idle(&controller).await;

        assert_eq!(controller.turn_count(), 2);
        let rec = controller.turn_at(1).unwrap();
        assert!(matches!(rec, TurnRecord::Error { ref message } if message.contains("provider unreachable")));
    }

    // ── cancellation ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn stop_cancels_a_stuck_turn() {
        let gate = Arc::new(Notify::new());
        let controller = controller_for(ScriptedProvider::new().round(vec![
            ScriptStep::text("thinking"),
            ScriptStep::Wait(gate),
        ]));

        assert!(!controller.stop());
        controller.submit("hi");
        assert!(controller.stop());
        wait_idle(&controller).await;

        let last = controller.turn_at(controller.turn_count() - 1).unwrap();
        assert_eq!(last, TurnRecord::error(CANCELLED_MESSAGE));
        assert!(controller.can_submit("next"));
    }

    #[tokio::test]
    async fn stopped_turn_stays_out_of_later_history() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(
            ScriptedProvider::new()
                .round(vec![
                    ScriptStep::text("x"),
                    ScriptStep::Wait(Arc::clone(&gate)),
                    ScriptStep::done(),
                ])
                .round(vec![ScriptStep::text("y")])
                .round(vec![ScriptStep::text("z")]),
        );
        let controller = controller_sharing(Arc::clone(&provider));

        controller.submit("first");
        tokio::time::timeout(Duration::from_secs(5), async {
            while controller.turn_count() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(controller.stop());
        wait_idle(&controller).await;

        assert!(controller.submit("second"));
        wait_idle(&controller).await;
        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(controller.submit("third"));
        wait_idle(&controller).await;

        let third = &provider.requests()[2];
        let contents: Vec<&str> = third
            .iter()
            .filter(|m| m.role != crate::providers::Role::System)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["second", "y", "third"]);
    }

    /// An agent whose `ask` never resolves.
    struct HangingAgent;

    #[async_trait]
    impl Agent for HangingAgent {
        async fn ask(&self, _prompt: &str) -> Result<Subscription, SessionError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn stop_works_while_the_session_is_still_opening() {
        let controller = Controller::new(Arc::new(HangingAgent), Handle::current());
        controller.submit("hi");
        assert!(controller.stop());
        wait_idle(&controller).await;
        assert_eq!(
            records(&controller),
            vec![TurnRecord::prompt("hi"), TurnRecord::error(CANCELLED_MESSAGE)]
        );
    }

    #[tokio::test]
    async fn transcript_trait_matches_inherent_reads() {
        let controller = controller_for(ScriptedProvider::new().round(vec![ScriptStep::text("x")]));
        controller.submit("hi");
        wait_idle(&controller).await;

        let view: &dyn Transcript = &controller;
        assert_eq!(view.turn_count(), 2);
        assert_eq!(view.turn_at(1).unwrap(), TurnRecord::message("x"));
    }
}
