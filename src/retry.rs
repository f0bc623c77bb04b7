//! Retrying delivery of chat requests.
//!
//! Only transport failures are retried. Any HTTP status other than 200 ends the
//! lookup on the spot, so a 503 is terminal while a refused connection is not.
//! Every retry and every terminal failure is pushed to the caller's signal
//! channel before `send` returns.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::chat::ChatRequest;
use crate::classify::{classify_body, ClassifiedResult};
use crate::transport::ChatTransport;
use crate::FailureKind;

/// Attempt limit and fixed wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one attempt.
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(3))
    }
}

/// Progress reported while a lookup runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum LookupSignal {
    /// A transport failure happened and attempt `attempt` of `max_attempts` is coming.
    Retrying {
        attempt: u32,
        max_attempts: u32,
        #[serde(serialize_with = "serialize_secs")]
        delay: Duration,
        error: String,
    },
    /// The lookup is over without a classified result.
    Failed { kind: FailureKind, message: String },
}

impl LookupSignal {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LookupSignal::Failed { .. })
    }

    /// One-line text for display.
    pub fn describe(&self) -> String {
        match self {
            LookupSignal::Retrying {
                attempt,
                max_attempts,
                delay,
                error,
            } => format!(
                "Request failed ({error}), retrying in {}s (attempt {attempt}/{max_attempts})",
                delay.as_secs_f64()
            ),
            LookupSignal::Failed { message, .. } => message.clone(),
        }
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

pub type SignalSender = mpsc::UnboundedSender<LookupSignal>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LookupError {
    #[error("request failed, status={status}")]
    Status { status: u16 },

    #[error("request still failing after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

impl LookupError {
    pub fn kind(&self) -> FailureKind {
        match self {
            LookupError::Status { .. } => FailureKind::Status,
            LookupError::Exhausted { .. } => FailureKind::Transient,
        }
    }
}

/// Sends chat requests through a transport under a [`RetryPolicy`].
///
/// Holds no per-lookup state: the attempt counter lives on the stack of each
/// `send` call, so one client can serve concurrent lookups.
#[derive(Clone)]
pub struct RetryingChatClient {
    transport: Arc<dyn ChatTransport>,
    policy: RetryPolicy,
}

impl RetryingChatClient {
    pub fn new(transport: Arc<dyn ChatTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn send(
        &self,
        request: &ChatRequest,
        signals: &SignalSender,
    ) -> Result<ClassifiedResult, LookupError> {
        let max_attempts = self.policy.max_attempts;
        let mut attempt = 1;

        loop {
            match self.transport.send(request).await {
                Ok(reply) if reply.status == 200 => {
                    let result = classify_body(&reply.body);
                    info!(attempt, result = ?result, "Chat request succeeded");
                    return Ok(result);
                }
                Ok(reply) => {
                    let err = LookupError::Status {
                        status: reply.status,
                    };
                    error!(attempt, status = reply.status, body = %reply.body, "Chat request rejected");
                    emit_failure(signals, &err);
                    return Err(err);
                }
                Err(transport_err) if attempt < max_attempts => {
                    attempt += 1;
                    warn!(
                        attempt,
                        max_attempts,
                        error = %transport_err,
                        "Chat request failed, retrying"
                    );
                    let _ = signals.send(LookupSignal::Retrying {
                        attempt,
                        max_attempts,
                        delay: self.policy.backoff,
                        error: transport_err.to_string(),
                    });
                    tokio::time::sleep(self.policy.backoff).await;
                }
                Err(transport_err) => {
                    let err = LookupError::Exhausted {
                        attempts: attempt,
                        last_error: transport_err.to_string(),
                    };
                    error!(attempts = attempt, error = %transport_err, "Chat request retries exhausted");
                    emit_failure(signals, &err);
                    return Err(err);
                }
            }
        }
    }
}

fn emit_failure(signals: &SignalSender, err: &LookupError) {
    let _ = signals.send(LookupSignal::Failed {
        kind: err.kind(),
        message: err.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{TransportError, TransportReply};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Plays back scripted replies; once the script runs out it repeats the last one.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<TransportReply, TransportError>>>,
        last: Mutex<Option<Result<TransportReply, TransportError>>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<TransportReply, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn send(&self, _request: &ChatRequest) -> Result<TransportReply, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(next) = next {
                *last = Some(next.clone());
                next
            } else {
                last.clone().expect("script must not be empty")
            }
        }
    }

    fn ok(status: u16, body: &str) -> Result<TransportReply, TransportError> {
        Ok(TransportReply {
            status,
            body: body.to_string(),
        })
    }

    fn refused() -> Result<TransportReply, TransportError> {
        Err(TransportError::new("connection refused"))
    }

    /// The paused clock only moves when the client sleeps, so elapsed time is the total backoff.
    fn assert_waited(started: Instant, expected: Duration) {
        let elapsed = started.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(100),
            "waited {elapsed:?}, expected {expected:?}"
        );
    }

    const URL_BODY: &str = r#"{"choices":[{"message":{"content":"https://x.test/r"}}]}"#;

    fn drain(rx: &mut mpsc::UnboundedReceiver<LookupSignal>) -> Vec<LookupSignal> {
        let mut signals = Vec::new();
        while let Ok(signal) = rx.try_recv() {
            signals.push(signal);
        }
        signals
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_failures_then_success() {
        let transport = ScriptedTransport::new(vec![refused(), refused(), ok(200, URL_BODY)]);
        let client = RetryingChatClient::new(transport.clone(), RetryPolicy::default());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let started = Instant::now();
        let result = client
            .send(&ChatRequest::for_query("m", "q"), &tx)
            .await
            .unwrap();

        assert_eq!(result, ClassifiedResult::Url("https://x.test/r".to_string()));
        assert_eq!(transport.calls(), 3);
        assert_waited(started, Duration::from_secs(6));

        let signals = drain(&mut rx);
        assert_eq!(signals.len(), 2);
        assert!(signals.iter().all(|s| !s.is_terminal()));
        assert!(matches!(signals[0], LookupSignal::Retrying { attempt: 2, max_attempts: 3, .. }));
        assert!(matches!(signals[1], LookupSignal::Retrying { attempt: 3, max_attempts: 3, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_transport_exhausts_attempts() {
        let transport = ScriptedTransport::new(vec![refused()]);
        let client = RetryingChatClient::new(transport.clone(), RetryPolicy::default());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let started = Instant::now();
        let err = client
            .send(&ChatRequest::for_query("m", "q"), &tx)
            .await
            .unwrap_err();

        assert_eq!(transport.calls(), 3);
        assert_waited(started, Duration::from_secs(6));
        assert_eq!(
            err,
            LookupError::Exhausted {
                attempts: 3,
                last_error: "connection refused".to_string()
            }
        );
        assert_eq!(err.kind(), FailureKind::Transient);

        let signals = drain(&mut rx);
        assert_eq!(signals.len(), 3);
        assert!(!signals[0].is_terminal());
        assert!(!signals[1].is_terminal());
        assert_eq!(
            signals[2],
            LookupSignal::Failed {
                kind: FailureKind::Transient,
                message: "request still failing after 3 attempts: connection refused".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_error_is_not_retried() {
        let transport = ScriptedTransport::new(vec![ok(404, "not found"), ok(200, URL_BODY)]);
        let client = RetryingChatClient::new(transport.clone(), RetryPolicy::default());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let started = Instant::now();
        let err = client
            .send(&ChatRequest::for_query("m", "q"), &tx)
            .await
            .unwrap_err();

        assert_eq!(err, LookupError::Status { status: 404 });
        assert_eq!(err.to_string(), "request failed, status=404");
        assert_eq!(transport.calls(), 1);
        assert_waited(started, Duration::ZERO);

        let signals = drain(&mut rx);
        assert_eq!(signals.len(), 1);
        assert!(matches!(signals[0], LookupSignal::Failed { kind: FailureKind::Status, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_error_after_transport_failure_stops_immediately() {
        let transport = ScriptedTransport::new(vec![refused(), ok(503, "busy"), ok(200, URL_BODY)]);
        let client = RetryingChatClient::new(transport.clone(), RetryPolicy::default());
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = client
            .send(&ChatRequest::for_query("m", "q"), &tx)
            .await
            .unwrap_err();

        assert_eq!(err, LookupError::Status { status: 503 });
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_body_is_not_retried() {
        let transport = ScriptedTransport::new(vec![ok(200, "{}"), ok(200, URL_BODY)]);
        let client = RetryingChatClient::new(transport.clone(), RetryPolicy::default());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let result = client
            .send(&ChatRequest::for_query("m", "q"), &tx)
            .await
            .unwrap();

        assert_eq!(result, ClassifiedResult::Malformed { raw: "{}".to_string() });
        assert_eq!(transport.calls(), 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_policy_never_waits() {
        let transport = ScriptedTransport::new(vec![refused()]);
        let client = RetryingChatClient::new(transport.clone(), RetryPolicy::new(1, Duration::from_secs(3)));
        let (tx, _rx) = mpsc::unbounded_channel();

        let started = Instant::now();
        let err = client
            .send(&ChatRequest::for_query("m", "q"), &tx)
            .await
            .unwrap_err();

        assert!(matches!(err, LookupError::Exhausted { attempts: 1, .. }));
        assert_eq!(transport.calls(), 1);
        assert_waited(started, Duration::ZERO);
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[test]
    fn test_signal_descriptions() {
        let retry = LookupSignal::Retrying {
            attempt: 2,
            max_attempts: 3,
            delay: Duration::from_secs(3),
            error: "timed out".to_string(),
        };
        assert_eq!(
            retry.describe(),
            "Request failed (timed out), retrying in 3s (attempt 2/3)"
        );

        let failed = LookupSignal::Failed {
            kind: FailureKind::Status,
            message: "request failed, status=500".to_string(),
        };
        assert_eq!(failed.describe(), "request failed, status=500");
    }

    #[tokio::test]
    async fn test_closed_signal_channel_does_not_break_lookup() {
        let transport = ScriptedTransport::new(vec![ok(200, URL_BODY)]);
        let client = RetryingChatClient::new(transport, RetryPolicy::new(3, Duration::ZERO));
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let result = client.send(&ChatRequest::for_query("m", "q"), &tx).await;
        assert!(result.is_ok());
    }
}
