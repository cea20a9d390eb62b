//! The transport layer: a single-threaded, non-blocking event loop over
//! `mio` that accepts connections, frames bytes into requests, and
//! queues reply bytes for writing back out. It knows the wire frame
//! shape (via `dtmd-proto`) but nothing about gxids, votes, or the
//! coordinator — that lives in `dtmd-txn` and is wired together by the
//! daemon binary's dispatcher.

mod buffer;
mod connection;
mod registry;
mod transport;

pub use connection::MAX_CHANNELS_PER_CONNECTION;
pub use registry::ChannelTable;
pub use transport::{ConnId, Transport, TransportConfig, TransportEvent, LISTEN_QUEUE_SIZE};
