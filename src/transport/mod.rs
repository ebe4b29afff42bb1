//! Wire transport boundary: codec, the debug-frame publisher, and the
//! websocket connection adapter.

pub mod codec;
pub mod debug;
pub mod websocket;

pub use debug::DebugFramePublisher;
pub use websocket::{SnapshotBuffer, TransportStats, WebSocketTransport};
