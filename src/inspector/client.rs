use super::transport::WebSocketInspectorTransport;
use super::transport_trait::InspectorTransportTrait;
use super::types::{CdpMessage, CdpRequest, InspectorEvent};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex, Notify, RwLock};
use tracing::{debug, error, warn};

type ResponseSender = oneshot::Sender<std::result::Result<Value, Error>>;
type EventCallback = Arc<dyn Fn(InspectorEvent) + Send + Sync>;

/// Event-driven CDP client: correlates outbound requests to responses by integer ID
/// and fans unsolicited events out to registered per-method callbacks. Mirrors the
/// reader-task/writer-task split used for the target process's own protocol client,
/// but over a WebSocket instead of framed stdio.
pub struct InspectorClient {
    next_id: Arc<AtomicU64>,
    pending: Arc<RwLock<HashMap<u64, ResponseSender>>>,
    event_callbacks: Arc<RwLock<HashMap<String, Vec<EventCallback>>>>,
    write_tx: mpsc::UnboundedSender<CdpRequest>,
    connected: Arc<std::sync::atomic::AtomicBool>,
    transport: Arc<Mutex<Box<dyn InspectorTransportTrait>>>,
    disconnected: Arc<Notify>,
}

impl InspectorClient {
    /// Connect to the inspector's WebSocket URL.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let transport: Box<dyn InspectorTransportTrait> =
            Box::new(WebSocketInspectorTransport::connect(ws_url).await?);
        Self::new_with_transport(transport).await
    }

    /// Build a client around an arbitrary transport (used by tests with a mock).
    pub async fn new_with_transport(transport: Box<dyn InspectorTransportTrait>) -> Result<Self> {
        let transport = Arc::new(Mutex::new(transport));
        let pending: Arc<RwLock<HashMap<u64, ResponseSender>>> = Arc::new(RwLock::new(HashMap::new()));
        let event_callbacks: Arc<RwLock<HashMap<String, Vec<EventCallback>>>> =
            Arc::new(RwLock::new(HashMap::new()));
        let connected = Arc::new(std::sync::atomic::AtomicBool::new(true));
        let disconnected = Arc::new(Notify::new());
        let (write_tx, write_rx) = mpsc::unbounded_channel();

        let client = Self {
            next_id: Arc::new(AtomicU64::new(1)),
            pending: pending.clone(),
            event_callbacks: event_callbacks.clone(),
            write_tx,
            connected: connected.clone(),
            transport: transport.clone(),
            disconnected: disconnected.clone(),
        };

        tokio::spawn(Self::reader_task(
            transport.clone(),
            pending.clone(),
            event_callbacks.clone(),
            connected.clone(),
            disconnected.clone(),
        ));
        tokio::spawn(Self::writer_task(transport.clone(), write_rx));

        Ok(client)
    }

    async fn reader_task(
        transport: Arc<Mutex<Box<dyn InspectorTransportTrait>>>,
        pending: Arc<RwLock<HashMap<u64, ResponseSender>>>,
        event_callbacks: Arc<RwLock<HashMap<String, Vec<EventCallback>>>>,
        connected: Arc<std::sync::atomic::AtomicBool>,
        disconnected: Arc<Notify>,
    ) {
        loop {
            let msg: CdpMessage = {
                let mut guard = transport.lock().await;
                match guard.read_message().await {
                    Ok(msg) => msg,
                    Err(e) => {
                        debug!("inspector reader task stopping: {}", e);
                        break;
                    }
                }
            };

            if let Some(id) = msg.id {
                let sender = pending.write().await.remove(&id);
                let Some(sender) = sender else {
                    warn!("inspector response for unknown request id {}", id);
                    continue;
                };
                let result = if let Some(err) = msg.error {
                    Err(Error::Internal(format!("{} (code {})", err.message, err.code)))
                } else {
                    Ok(msg.result.unwrap_or(Value::Null))
                };
                if sender.send(result).is_err() {
                    warn!("no one awaiting response for request id {}", id);
                }
            } else if let Some(method) = msg.method {
                let event = InspectorEvent {
                    method: method.clone(),
                    params: msg.params.unwrap_or(Value::Null),
                };
                let callbacks = event_callbacks.read().await;
                if let Some(handlers) = callbacks.get(&method) {
                    for handler in handlers {
                        handler(event.clone());
                    }
                }
            }
        }

        connected.store(false, Ordering::SeqCst);
        let mut guard = pending.write().await;
        for (_, sender) in guard.drain() {
            let _ = sender.send(Err(Error::TransportClosed));
        }
        drop(guard);
        disconnected.notify_waiters();
    }

    async fn writer_task(
        transport: Arc<Mutex<Box<dyn InspectorTransportTrait>>>,
        mut write_rx: mpsc::UnboundedReceiver<CdpRequest>,
    ) {
        while let Some(req) = write_rx.recv().await {
            let mut guard = transport.lock().await;
            if let Err(e) = guard.write_message(&req).await {
                error!("failed to write inspector request: {}", e);
                break;
            }
        }
    }

    /// Send a CDP request and await its correlated response, or a timeout.
    pub async fn send(&self, method: &str, params: Option<Value>, deadline: Duration) -> Result<Value> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::TransportClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.write().await.insert(id, tx);

        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
        };
        if self.write_tx.send(request).is_err() {
            self.pending.write().await.remove(&id);
            return Err(Error::TransportClosed);
        }

        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::TransportClosed),
            Err(_) => {
                self.pending.write().await.remove(&id);
                Err(Error::CommandTimeout)
            }
        }
    }

    /// Register a callback invoked for every event received for `method`. Callbacks
    /// for the same method are invoked in registration order, matching arrival order
    /// of the single inbound event stream.
    pub async fn on_event<F>(&self, method: &str, callback: F)
    where
        F: Fn(InspectorEvent) + Send + Sync + 'static,
    {
        let mut callbacks = self.event_callbacks.write().await;
        callbacks
            .entry(method.to_string())
            .or_default()
            .push(Arc::new(callback));
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Resolves once the reader task observes the transport close, or immediately if
    /// it already has. Used by the session's crash detector; a caller racing the
    /// notification with the connected-flag check cannot miss the transition.
    pub async fn wait_for_disconnect(&self) {
        if !self.is_connected() {
            return;
        }
        let notified = self.disconnected.notified();
        if !self.is_connected() {
            return;
        }
        notified.await;
    }

    /// Idempotent disconnect; a second call observes the connection already closed.
    pub async fn disconnect(&self) -> Result<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let mut guard = self.transport.lock().await;
        guard.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::types::CdpError;
    use mockall::mock;
    use std::sync::atomic::AtomicUsize;

    mock! {
        pub Transport {}

        #[async_trait::async_trait]
        impl InspectorTransportTrait for Transport {
            async fn read_message(&mut self) -> Result<CdpMessage>;
            async fn write_message(&mut self, msg: &CdpRequest) -> Result<()>;
            async fn close(&mut self) -> Result<()>;
        }
    }

    #[tokio::test]
    async fn send_correlates_response_by_id() {
        let mut mock = MockTransport::new();
        mock.expect_write_message().returning(|_| Ok(()));

        let calls = Arc::new(AtomicUsize::new(0));
        mock.expect_read_message().returning(move || {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(CdpMessage {
                    id: Some(1),
                    method: None,
                    params: None,
                    result: Some(serde_json::json!({"ok": true})),
                    error: None,
                })
            } else {
                Err(Error::TransportClosed)
            }
        });

        let client = InspectorClient::new_with_transport(Box::new(mock)).await.unwrap();
        let result = client
            .send("Debugger.enable", None, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn pending_requests_fail_with_transport_closed_when_reader_stops() {
        let mut mock = MockTransport::new();
        mock.expect_write_message().returning(|_| Ok(()));
        mock.expect_read_message()
            .returning(|| Err(Error::TransportClosed));

        let client = InspectorClient::new_with_transport(Box::new(mock)).await.unwrap();
        let result = client
            .send("Debugger.pause", None, Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(Error::TransportClosed)));
    }

    #[test]
    fn cdp_error_formats_with_code() {
        let err = CdpError {
            code: -32000,
            message: "boom".to_string(),
            data: None,
        };
        assert_eq!(err.code, -32000);
    }
}
