//! LLM gateway contract.
//!
//! The gateway is the only component that talks to a model endpoint. It
//! receives the payload a [`MessageFormatter`](super::MessageFormatter)
//! built and returns the provider's raw JSON response; transport,
//! authentication and retries live behind it.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;

/// Events emitted by [`LlmGateway::stream`].
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// A fragment of assistant text.
    Delta(String),
    /// The stream finished; carries the full response in provider shape.
    Done(Value),
    /// The stream failed mid-way.
    Error(String),
}

/// Sends provider payloads and returns provider responses.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Send `payload` and wait for the complete response.
    async fn complete(&self, payload: Value) -> Result<Value>;

    /// Send `payload` and receive the response incrementally.
    ///
    /// The channel must end with exactly one `Done` or `Error`. The default
    /// implementation calls [`complete`](Self::complete) and emits a
    /// single `Done`.
    async fn stream(&self, payload: Value) -> Result<mpsc::Receiver<GatewayEvent>> {
        let response = self.complete(payload).await?;
        let (tx, rx) = mpsc::channel(1);
        // Capacity 1 and a fresh receiver: this send cannot fail.
        let _ = tx.send(GatewayEvent::Done(response)).await;
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoGateway;

    #[async_trait]
    impl LlmGateway for EchoGateway {
        async fn complete(&self, payload: Value) -> Result<Value> {
            Ok(json!({ "echo": payload }))
        }
    }

    #[tokio::test]
    async fn test_default_stream_emits_single_done() {
        let mut rx = EchoGateway.stream(json!({"model": "m"})).await.unwrap();
        assert_eq!(
            rx.recv().await,
            Some(GatewayEvent::Done(json!({"echo": {"model": "m"}})))
        );
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_mock_gateway_error() {
        let mut gateway = MockLlmGateway::new();
        gateway
            .expect_complete()
            .returning(|_| Err(crate::error::HostError::Format("bad gateway".into())));
        assert!(gateway.complete(json!({})).await.is_err());
    }
}
