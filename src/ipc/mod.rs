//! JSON IPC transport to the player process.

mod connection;
pub mod protocol;

pub use connection::{EventStream, IpcConnection};
pub use protocol::{Event, Message, PropertyValue, Response};
