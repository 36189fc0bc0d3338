use super::types::{CdpMessage, CdpRequest};
use crate::Result;
use async_trait::async_trait;

/// Trait for the raw framed CDP wire, separated from [`super::client::InspectorClient`]
/// so the request-correlation and event-dispatch logic can be tested against a mock
/// transport instead of a live WebSocket.
#[async_trait]
pub trait InspectorTransportTrait: Send + Sync {
    /// Read the next CDP message (response or event) from the wire.
    async fn read_message(&mut self) -> Result<CdpMessage>;

    /// Write a CDP request to the wire.
    async fn write_message(&mut self, msg: &CdpRequest) -> Result<()>;

    /// Close the underlying connection.
    async fn close(&mut self) -> Result<()>;
}
