// Report lookup: one user query in, one terminal outcome out.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::instrument;

use crate::chat::ChatRequest;
use crate::classify::ClassifiedResult;
use crate::config::ChatSettings;
use crate::retry::{LookupError, LookupSignal, RetryingChatClient, SignalSender};
use crate::transport::{ChatTransport, HttpChatTransport};

pub struct ReportLookup {
    client: RetryingChatClient,
    model: String,
}

impl ReportLookup {
    pub fn new(client: RetryingChatClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Wire the production HTTP transport from settings.
    pub fn from_settings(settings: &ChatSettings) -> anyhow::Result<Self> {
        let transport: Arc<dyn ChatTransport> = Arc::new(HttpChatTransport::new(settings)?);
        Ok(Self::new(
            RetryingChatClient::new(transport, settings.retry_policy()?),
            settings.model.clone(),
        ))
    }

    #[instrument(skip(self, signals))]
    pub async fn lookup(
        &self,
        query: &str,
        signals: &SignalSender,
    ) -> Result<ClassifiedResult, LookupError> {
        let request = ChatRequest::for_query(&self.model, query);
        self.client.send(&request, signals).await
    }

    /// Run a lookup and collect its signals, for callers that render after the fact.
    pub async fn lookup_collected(&self, query: &str) -> (Vec<LookupSignal>, ReportView) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcome = self.lookup(query, &tx).await;
        drop(tx);

        let mut signals = Vec::new();
        while let Some(signal) = rx.recv().await {
            signals.push(signal);
        }
        (signals, ReportView::from(outcome))
    }
}

/// What the page shows for a finished lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportView {
    Frame { url: String },
    Text { content: String },
    Warning { raw: String },
    Error { message: String },
}

impl From<Result<ClassifiedResult, LookupError>> for ReportView {
    fn from(outcome: Result<ClassifiedResult, LookupError>) -> Self {
        match outcome {
            Ok(ClassifiedResult::Url(url)) => ReportView::Frame { url },
            Ok(ClassifiedResult::Text(content)) => ReportView::Text { content },
            Ok(ClassifiedResult::Malformed { raw }) => ReportView::Warning { raw },
            Err(err) => ReportView::Error {
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::transport::{TransportError, TransportReply};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingTransport {
        seen: Mutex<Vec<ChatRequest>>,
        reply: Result<TransportReply, TransportError>,
    }

    #[async_trait]
    impl ChatTransport for RecordingTransport {
        async fn send(&self, request: &ChatRequest) -> Result<TransportReply, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply.clone()
        }
    }

    fn lookup_with(reply: Result<TransportReply, TransportError>) -> (Arc<RecordingTransport>, ReportLookup) {
        let transport = Arc::new(RecordingTransport {
            seen: Mutex::new(Vec::new()),
            reply,
        });
        let client = RetryingChatClient::new(transport.clone(), RetryPolicy::new(2, Duration::ZERO));
        (transport, ReportLookup::new(client, "gpt-4-turbo"))
    }

    #[tokio::test]
    async fn test_lookup_sends_query_with_configured_model() {
        let (transport, lookup) = lookup_with(Ok(TransportReply {
            status: 200,
            body: r#"{"choices":[{"message":{"content":"https://bi.test/sales"}}]}"#.to_string(),
        }));

        let (signals, view) = lookup.lookup_collected("Q3 sales report").await;

        assert!(signals.is_empty());
        assert_eq!(
            view,
            ReportView::Frame {
                url: "https://bi.test/sales".to_string()
            }
        );
        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], ChatRequest::for_query("gpt-4-turbo", "Q3 sales report"));
    }

    #[tokio::test]
    async fn test_collected_signals_end_with_terminal_failure() {
        let (transport, lookup) = lookup_with(Err(TransportError::new("dns error")));

        let (signals, view) = lookup.lookup_collected("anything").await;

        assert_eq!(transport.seen.lock().unwrap().len(), 2);
        assert_eq!(signals.len(), 2);
        assert!(!signals[0].is_terminal());
        assert!(signals[1].is_terminal());
        assert_eq!(
            view,
            ReportView::Error {
                message: "request still failing after 2 attempts: dns error".to_string()
            }
        );
    }

    #[test]
    fn test_view_mapping() {
        assert_eq!(
            ReportView::from(Ok(ClassifiedResult::Text("no report".into()))),
            ReportView::Text {
                content: "no report".into()
            }
        );
        assert_eq!(
            ReportView::from(Ok(ClassifiedResult::Malformed { raw: "{}".into() })),
            ReportView::Warning { raw: "{}".into() }
        );
        assert_eq!(
            ReportView::from(Err(LookupError::Status { status: 500 })),
            ReportView::Error {
                message: "request failed, status=500".into()
            }
        );
    }
}
