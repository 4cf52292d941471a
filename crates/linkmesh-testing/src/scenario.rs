//! Test scenario runner for connection lifecycle testing.
//!
//! A [`TestScenario`] is a named sequence of steps run against a
//! [`crate::client::TestPeer`]: resolve a connection, send a message,
//! expect a reply, wait, or assert. Each step produces a [`StepResult`];
//! the whole run produces a [`ScenarioResult`].

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use linkmesh_conn::ConnectionHandle;
use linkmesh_core::message::WireMessage;
use linkmesh_core::metadata::Metadata;

use crate::client::TestPeer;

/// Type alias for custom message matcher functions.
pub type MessageMatcherFn = Arc<dyn Fn(&WireMessage) -> Result<(), String> + Send + Sync>;

/// A single step in a scenario.
#[derive(Clone)]
pub enum TestStep {
    /// Resolve a connection to `descriptor`, binding it under `label` for
    /// later steps.
    Resolve {
        /// Name this connection is referenced by in later steps.
        label: String,
        /// Descriptor to find-or-create against.
        descriptor: Metadata,
    },
    /// Send an application payload on the connection bound to `label`.
    Send {
        /// Label of the connection to send on.
        label: String,
        /// Payload to send.
        payload: serde_json::Value,
    },
    /// Expect the peer's recording handlers to have received a message
    /// matching `matcher` within `timeout`.
    ExpectMessage {
        /// Matcher applied to the next unconsumed recorded message.
        matcher: MessageMatcher,
        /// How long to poll before failing.
        timeout: Duration,
    },
    /// Expect the peer's recording handlers to have recorded a disconnect
    /// within `timeout`.
    ExpectDisconnect {
        /// How long to poll before failing.
        timeout: Duration,
    },
    /// Wait for a fixed duration (e.g. to let a spawned event loop drain).
    Wait(Duration),
    /// Custom assertion.
    Assert {
        /// Description shown on failure.
        description: String,
        /// Assertion function.
        check: Arc<dyn Fn() -> Result<(), String> + Send + Sync>,
    },
}

impl fmt::Debug for TestStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve { label, descriptor } => {
                f.debug_struct("Resolve").field("label", label).field("descriptor", descriptor).finish()
            }
            Self::Send { label, payload } => f.debug_struct("Send").field("label", label).field("payload", payload).finish(),
            Self::ExpectMessage { timeout, .. } => f.debug_struct("ExpectMessage").field("timeout", timeout).finish(),
            Self::ExpectDisconnect { timeout } => f.debug_struct("ExpectDisconnect").field("timeout", timeout).finish(),
            Self::Wait(duration) => f.debug_tuple("Wait").field(duration).finish(),
            Self::Assert { description, .. } => {
                f.debug_struct("Assert").field("description", description).field("check", &"<fn>").finish()
            }
        }
    }
}

/// Matcher for validating a received application message.
#[derive(Clone)]
pub struct MessageMatcher {
    /// Expected payload, if any (structural equality).
    pub expect_payload: Option<serde_json::Value>,
    /// Custom matcher.
    pub custom: Option<MessageMatcherFn>,
}

impl fmt::Debug for MessageMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageMatcher")
            .field("expect_payload", &self.expect_payload)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

impl Default for MessageMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageMatcher {
    /// A matcher with no expectations (matches any application message).
    #[must_use]
    pub fn new() -> Self {
        Self { expect_payload: None, custom: None }
    }

    /// Match an exact application payload.
    #[must_use]
    pub fn payload(payload: serde_json::Value) -> Self {
        Self { expect_payload: Some(payload), custom: None }
    }

    /// Add a custom matcher function.
    #[must_use]
    pub fn with_custom<F>(mut self, f: F) -> Self
    where
        F: Fn(&WireMessage) -> Result<(), String> + Send + Sync + 'static,
    {
        self.custom = Some(Arc::new(f));
        self
    }

    /// Validate a message against this matcher.
    ///
    /// # Errors
    ///
    /// Returns a description of the mismatch.
    pub fn validate(&self, msg: &WireMessage) -> Result<(), String> {
        if let Some(expected) = &self.expect_payload {
            match msg {
                WireMessage::Application(actual) if actual == expected => {}
                WireMessage::Application(actual) => {
                    return Err(format!("expected payload {expected:?}, got {actual:?}"));
                }
                other => return Err(format!("expected an Application message, got {other:?}")),
            }
        }
        if let Some(custom) = &self.custom {
            custom(msg)?;
        }
        Ok(())
    }
}

/// A named test scenario consisting of multiple steps.
#[derive(Debug)]
pub struct TestScenario {
    /// Scenario name.
    pub name: String,
    /// Scenario description.
    pub description: Option<String>,
    /// Steps to execute in order.
    pub steps: Vec<TestStep>,
}

impl TestScenario {
    /// A fresh, empty scenario.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), description: None, steps: Vec::new() }
    }

    /// Attach a human-readable description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Resolve a connection and bind it to `label`.
    #[must_use]
    pub fn resolve(mut self, label: impl Into<String>, descriptor: Metadata) -> Self {
        self.steps.push(TestStep::Resolve { label: label.into(), descriptor });
        self
    }

    /// Send an application payload on the connection bound to `label`.
    #[must_use]
    pub fn send(mut self, label: impl Into<String>, payload: serde_json::Value) -> Self {
        self.steps.push(TestStep::Send { label: label.into(), payload });
        self
    }

    /// Expect a message matching `matcher` within `timeout`.
    #[must_use]
    pub fn expect_message(mut self, matcher: MessageMatcher, timeout: Duration) -> Self {
        self.steps.push(TestStep::ExpectMessage { matcher, timeout });
        self
    }

    /// Expect a disconnect within `timeout`.
    #[must_use]
    pub fn expect_disconnect(mut self, timeout: Duration) -> Self {
        self.steps.push(TestStep::ExpectDisconnect { timeout });
        self
    }

    /// Wait for a fixed duration.
    #[must_use]
    pub fn wait(mut self, duration: Duration) -> Self {
        self.steps.push(TestStep::Wait(duration));
        self
    }

    /// Add a custom assertion step.
    pub fn assert<F>(mut self, description: impl Into<String>, check: F) -> Self
    where
        F: Fn() -> Result<(), String> + Send + Sync + 'static,
    {
        self.steps.push(TestStep::Assert { description: description.into(), check: Arc::new(check) });
        self
    }

    /// Run every step against `peer`, stopping at the first failure.
    pub async fn run(self, peer: &TestPeer) -> ScenarioResult {
        let mut connections: std::collections::HashMap<String, ConnectionHandle> = std::collections::HashMap::new();
        let mut consumed_messages = 0usize;
        let mut consumed_disconnects = 0usize;
        let mut step_results = Vec::new();

        for (index, step) in self.steps.iter().enumerate() {
            let started = Instant::now();
            let description = format!("{step:?}");
            let outcome = run_step(step, peer, &mut connections, &mut consumed_messages, &mut consumed_disconnects).await;
            let passed = outcome.is_ok();
            let error = outcome.err();
            step_results.push(StepResult {
                index,
                description: description.clone(),
                passed,
                error: error.clone(),
                duration: started.elapsed(),
            });
            if let Some(error) = error {
                return ScenarioResult::fail(step_results, format!("step {index} ({description}) failed: {error}"));
            }
        }

        ScenarioResult::pass(step_results)
    }
}

async fn run_step(
    step: &TestStep,
    peer: &TestPeer,
    connections: &mut std::collections::HashMap<String, ConnectionHandle>,
    consumed_messages: &mut usize,
    consumed_disconnects: &mut usize,
) -> Result<(), String> {
    match step {
        TestStep::Resolve { label, descriptor } => {
            let handle = peer.connect_to(descriptor.clone()).await.map_err(|err| err.to_string())?;
            connections.insert(label.clone(), handle);
            Ok(())
        }
        TestStep::Send { label, payload } => {
            let handle = connections.get(label).ok_or_else(|| format!("no connection bound to '{label}'"))?;
            handle
                .send(WireMessage::Application(payload.clone()))
                .await
                .map_err(|err| err.to_string())?;
            Ok(())
        }
        TestStep::ExpectMessage { matcher, timeout } => {
            let deadline = Instant::now() + *timeout;
            loop {
                let messages = peer.handlers().messages();
                if let Some((_, msg)) = messages.get(*consumed_messages) {
                    matcher.validate(msg)?;
                    *consumed_messages += 1;
                    return Ok(());
                }
                if Instant::now() >= deadline {
                    return Err("timed out waiting for a matching message".to_string());
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
        TestStep::ExpectDisconnect { timeout } => {
            let deadline = Instant::now() + *timeout;
            loop {
                let disconnects = peer.handlers().disconnects();
                if disconnects.len() > *consumed_disconnects {
                    *consumed_disconnects += 1;
                    return Ok(());
                }
                if Instant::now() >= deadline {
                    return Err("timed out waiting for a disconnect".to_string());
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
        TestStep::Wait(duration) => {
            tokio::time::sleep(*duration).await;
            Ok(())
        }
        TestStep::Assert { check, .. } => check(),
    }
}

/// Result of running a [`TestScenario`].
#[derive(Debug)]
pub struct ScenarioResult {
    /// Whether every step passed.
    pub success: bool,
    /// Per-step results, in order.
    pub step_results: Vec<StepResult>,
    /// Overall error message, if failed.
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Build a successful result.
    #[must_use]
    pub fn pass(step_results: Vec<StepResult>) -> Self {
        Self { success: true, step_results, error: None }
    }

    /// Build a failed result.
    #[must_use]
    pub fn fail(step_results: Vec<StepResult>, error: impl Into<String>) -> Self {
        Self { success: false, step_results, error: Some(error.into()) }
    }

    /// Assert the scenario ran to completion.
    ///
    /// # Panics
    ///
    /// Panics with the failure message if any step failed.
    pub fn assert_success(&self) {
        assert!(self.success, "scenario failed: {}", self.error.as_deref().unwrap_or("<no message>"));
    }
}

/// Result of a single step.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Index of the step within the scenario.
    pub index: usize,
    /// Debug description of the step.
    pub description: String,
    /// Whether the step passed.
    pub passed: bool,
    /// Error message, if the step failed.
    pub error: Option<String>,
    /// How long the step took.
    pub duration: Duration,
}
