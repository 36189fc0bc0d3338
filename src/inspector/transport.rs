use super::transport_trait::InspectorTransportTrait;
use super::types::{CdpMessage, CdpRequest};
use crate::{Error, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// A CDP transport backed by a live WebSocket connection to the inspector.
pub struct WebSocketInspectorTransport {
    stream: WsStream,
}

impl WebSocketInspectorTransport {
    pub async fn connect(ws_url: &str) -> Result<Self> {
        debug!("Connecting to inspector websocket: {}", ws_url);
        let (stream, _response) = connect_async(ws_url)
            .await
            .map_err(Error::WebSocket)?;
        Ok(Self { stream })
    }
}

#[async_trait]
impl InspectorTransportTrait for WebSocketInspectorTransport {
    async fn read_message(&mut self) -> Result<CdpMessage> {
        loop {
            let frame = self
                .stream
                .next()
                .await
                .ok_or(Error::TransportClosed)?
                .map_err(Error::WebSocket)?;

            match frame {
                WsMessage::Text(text) => {
                    trace!("inspector <- {}", text);
                    return serde_json::from_str(&text).map_err(Error::Json);
                }
                WsMessage::Ping(payload) => {
                    self.stream
                        .send(WsMessage::Pong(payload))
                        .await
                        .map_err(Error::WebSocket)?;
                }
                WsMessage::Close(_) => return Err(Error::TransportClosed),
                _ => continue,
            }
        }
    }

    async fn write_message(&mut self, msg: &CdpRequest) -> Result<()> {
        let text = serde_json::to_string(msg)?;
        trace!("inspector -> {}", text);
        self.stream
            .send(WsMessage::Text(text))
            .await
            .map_err(Error::WebSocket)
    }

    async fn close(&mut self) -> Result<()> {
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => {
                warn!("error closing inspector transport: {}", e);
                Err(Error::WebSocket(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::types::CdpRequest;
    use serde_json::json;

    #[test]
    fn request_serializes_to_cdp_wire_shape() {
        let req = CdpRequest {
            id: 3,
            method: "Debugger.enable".to_string(),
            params: Some(json!({})),
        };
        let value: serde_json::Value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["id"], 3);
        assert_eq!(value["method"], "Debugger.enable");
    }
}
