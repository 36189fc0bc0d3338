pub mod client;
pub mod transport;
pub mod transport_trait;
pub mod types;

pub use client::InspectorClient;
pub use types::{CdpLocation, InspectorEvent, RemoteObject};
