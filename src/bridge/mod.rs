//! WebSocket bridge to the browser shim
//!
//! The shim owns the real tabs: it relays page process messages, executes
//! badge, popup and notification commands and reports tab lifecycle events.

pub mod frame;
pub mod server;
pub mod session;
pub mod websocket;

pub use frame::{HostCommand, Inbound, Outbound};
pub use server::BridgeServer;
pub use session::Bridge;
