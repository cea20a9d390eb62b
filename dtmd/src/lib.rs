//! Glues the transport (`dtmd-net`), the wire contract (`dtmd-proto`),
//! and the coordinator (`dtmd-txn`) into one running daemon, driven by
//! a single poll loop on the calling thread.

mod dispatcher;

use std::io;
use std::time::Duration;

use dtmd_admin::Config;
use dtmd_net::{ConnId, Transport, TransportConfig, TransportEvent};
use dtmd_proto::Reply;
use tracing::{info, warn};

pub use dispatcher::{DispatchOutcome, Dispatcher};

/// Default number of settled transactions to keep answering
/// `REQ_GETSTATUS` for after they decide, before they're pruned.
const RETENTION_WINDOW: usize = 4096;

/// Distinguishes a failure that happens before the daemon starts
/// serving traffic (bad config, a bind failure) from one that happens
/// afterward, so `bin.rs` can report a different exit code for each.
#[derive(Debug)]
pub enum RunError {
    Startup(io::Error),
    Runtime(io::Error),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Startup(e) => write!(f, "startup failed: {e}"),
            RunError::Runtime(e) => write!(f, "runtime error: {e}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Startup(e) | RunError::Runtime(e) => Some(e),
        }
    }
}

/// Binds the listener and runs the event loop until the process is
/// killed or a fatal syscall error occurs. There is one `Dispatcher` for
/// the whole daemon; every connection shares it, since transactions are
/// global, not per-connection.
pub fn run(config: Config) -> Result<(), RunError> {
    let addr = format!("{}:{}", config.host, config.port).parse().map_err(|e| {
        RunError::Startup(io::Error::new(io::ErrorKind::InvalidInput, format!("bad host/port: {e}")))
    })?;

    let transport_config = TransportConfig {
        buffer_size: config.buffer_size,
        max_frame_payload: config.buffer_size,
        max_connections: config.max_connections,
        max_channels: config.max_channels,
    };
    let mut transport = Transport::bind(addr, transport_config).map_err(RunError::Startup)?;
    let local_addr = transport.local_addr().map_err(RunError::Startup)?;
    info!(addr = %local_addr, "dtmd listening");

    let mut dispatcher = Dispatcher::new(config.coordinator_capacity(), RETENTION_WINDOW);
    let mut events = Vec::new();

    loop {
        events.clear();
        transport.poll(Some(Duration::from_millis(250)), &mut events).map_err(RunError::Runtime)?;
        for event in events.drain(..) {
            handle_event(&mut transport, &mut dispatcher, event);
        }
    }
}

fn handle_event(transport: &mut Transport, dispatcher: &mut Dispatcher, event: TransportEvent) {
    match event {
        TransportEvent::Accepted(conn) => info!(?conn, "connection accepted"),
        TransportEvent::Disconnected(conn) => info!(?conn, "connection closed"),
        TransportEvent::ProtocolViolation(conn) => warn!(?conn, "closing connection after a protocol violation"),
        TransportEvent::Frame { conn, header, payload } => {
            match dispatcher.handle_frame(conn, header.channel, header.code, &payload) {
                DispatchOutcome::Reply(reply) => reply_and_log(transport, conn, header.channel, reply),
                DispatchOutcome::Parked => {}
                DispatchOutcome::Released { reply, waiters } => {
                    for (waiter_conn, channel) in waiters {
                        reply_and_log(transport, waiter_conn, channel, reply.clone());
                    }
                }
                DispatchOutcome::Disconnect => {
                    // Releases only the channel that asked; other
                    // channels multiplexed on the same connection,
                    // including any parked voters, are untouched.
                    transport.release_channel(conn, header.channel);
                }
            }
        }
    }
}

/// Queues a reply and logs it if flushing it killed the connection.
fn reply_and_log(transport: &mut Transport, conn: ConnId, channel: u32, reply: Reply) {
    let mut closed = Vec::new();
    transport.queue_reply(conn, reply.code(), channel, &reply.payload(), &mut closed);
    for event in closed {
        if let TransportEvent::Disconnected(conn) = event {
            warn!(?conn, "connection closed while flushing a reply");
        }
    }
}
