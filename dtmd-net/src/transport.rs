use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use dtmd_proto::Header;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use slab::Slab;
use socket2::{Domain, SockRef, Socket, Type};
use tracing::{debug, warn};

use crate::connection::Connection;

/// Backlog passed to `listen(2)`. Past this many pending connections
/// the kernel starts refusing new ones outright instead of handing them
/// to `accept_ready` to reject at the application level.
pub const LISTEN_QUEUE_SIZE: i32 = 1024;

/// Opaque handle to an accepted connection. Stable for the connection's
/// lifetime; the dispatcher uses it to address replies and to remember
/// which connection a parked waiter belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ConnId(usize);

impl ConnId {
    /// Exposes the underlying slab index so callers can pack it
    /// alongside a channel id into an opaque waiter token. Not meant to
    /// be interpreted as anything but a round-trippable handle.
    pub fn index(&self) -> usize {
        self.0
    }

    pub fn from_index(index: usize) -> ConnId {
        ConnId(index)
    }
}

const LISTENER: Token = Token(0);

pub struct TransportConfig {
    pub buffer_size: usize,
    pub max_frame_payload: usize,
    pub max_connections: usize,
    /// Per-connection channel cap, from `--max-channels`. Clamped to
    /// `MAX_CHANNELS_PER_CONNECTION` by `Connection::new`.
    pub max_channels: u32,
}

impl TransportConfig {
    /// Socket-level `SO_RCVBUF`/`SO_SNDBUF` hint. Kept separate from
    /// `buffer_size` (which sizes the userspace `GrowableBuffer`s)
    /// because the kernel rounds this up and enforces its own floor.
    fn socket_buffer_hint(&self) -> usize {
        self.buffer_size
    }
}

/// One event surfaced by a poll cycle. The caller (the daemon's
/// dispatcher) decides what to do with it; this crate knows nothing
/// about commands, gxids, or coordinators.
pub enum TransportEvent {
    Accepted(ConnId),
    /// A full frame arrived on `conn`. `channel` has already been marked
    /// busy; the caller must release it via `Transport::release_channel`
    /// once it replies.
    Frame { conn: ConnId, header: Header, payload: Vec<u8> },
    /// The declared frame size exceeded this connection's configured
    /// limit, or the channel was already in flight. The connection is
    /// closed immediately; callers should drop any state keyed on it.
    ProtocolViolation(ConnId),
    Disconnected(ConnId),
}

/// The mio-driven transport: accepts connections, multiplexes reads and
/// writes across all of them with a single poll loop, and turns raw
/// bytes into framed requests.
pub struct Transport {
    poll: Poll,
    listener: TcpListener,
    connections: Slab<Connection>,
    events: Events,
    config: TransportConfig,
}

impl Transport {
    pub fn bind(addr: SocketAddr, config: TransportConfig) -> io::Result<Self> {
        let mut listener = TcpListener::from_std(bind_std_listener(addr)?);
        let poll = Poll::new()?;
        poll.registry().register(&mut listener, LISTENER, Interest::READABLE)?;
        Ok(Transport { poll, listener, connections: Slab::new(), events: Events::with_capacity(1024), config })
    }

    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Blocks for up to `timeout` waiting for readiness, then drains
    /// every ready connection into `out`. Frames are parsed eagerly so a
    /// single poll cycle can yield more than one `TransportEvent`.
    pub fn poll(&mut self, timeout: Option<Duration>, out: &mut Vec<TransportEvent>) -> io::Result<()> {
        self.poll.poll(&mut self.events, timeout)?;
        // mio::Events borrows self.events immutably for its lifetime; copy
        // out the small Vec<Token> worth of readiness info before touching
        // self.connections mutably.
        let ready: Vec<(Token, bool, bool)> = self.events.iter().map(|e| (e.token(), e.is_readable(), e.is_writable())).collect();

        for (token, readable, writable) in ready {
            if token == LISTENER {
                if readable {
                    self.accept_ready(out)?;
                }
                continue;
            }
            let key = token.0 - 1;
            if writable {
                if let Some(conn) = self.connections.get_mut(key) {
                    if conn.flush_outbound().is_err() {
                        self.close(ConnId(key), out);
                        continue;
                    }
                }
            }
            if readable {
                self.service_readable(ConnId(key), out);
            }
        }
        Ok(())
    }

    fn accept_ready(&mut self, out: &mut Vec<TransportEvent>) -> io::Result<()> {
        loop {
            match self.listener.accept() {
                Ok((mut stream, peer)) => {
                    if self.connections.len() >= self.config.max_connections {
                        debug!(%peer, "rejecting connection, at capacity");
                        drop(stream);
                        continue;
                    }
                    let _ = stream.set_nodelay(true);
                    let sock = SockRef::from(&stream);
                    let hint = self.config.socket_buffer_hint();
                    let _ = sock.set_recv_buffer_size(hint);
                    let _ = sock.set_send_buffer_size(hint);
                    let entry = self.connections.vacant_entry();
                    let key = entry.key();
                    let token = Token(key + 1);
                    self.poll.registry().register(&mut stream, token, Interest::READABLE | Interest::WRITABLE)?;
                    entry.insert(Connection::new(stream, self.config.buffer_size, self.config.max_frame_payload, self.config.max_channels));
                    debug!(%peer, key, "accepted connection");
                    out.push(TransportEvent::Accepted(ConnId(key)));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    return Ok(());
                }
            }
        }
    }

    fn service_readable(&mut self, id: ConnId, out: &mut Vec<TransportEvent>) {
        let key = id.0;
        let Some(conn) = self.connections.get_mut(key) else { return };
        if conn.fill_inbound().is_err() {
            self.close(id, out);
            return;
        }
        loop {
            match conn.try_take_frame() {
                Ok(Some((header, payload))) => {
                    if !conn.mark_channel_busy(header.channel) {
                        out.push(TransportEvent::ProtocolViolation(id));
                        self.close(id, out);
                        return;
                    }
                    out.push(TransportEvent::Frame { conn: id, header, payload });
                }
                Ok(None) => break,
                Err(_) => {
                    out.push(TransportEvent::ProtocolViolation(id));
                    self.close(id, out);
                    return;
                }
            }
        }
        if conn.peer_closed {
            self.close(id, out);
        }
    }

    /// Queues a reply and tries to flush it immediately. A flush error
    /// here is the same kind of fatal syscall failure `poll` treats as
    /// connection death everywhere else, so it closes the connection
    /// and pushes `Disconnected` to `out` rather than leaving a dead
    /// connection around waiting for a writable event that will never
    /// arrive.
    pub fn queue_reply(&mut self, id: ConnId, code: u8, channel: u32, payload: &[u8], out: &mut Vec<TransportEvent>) {
        let Some(conn) = self.connections.get_mut(id.0) else { return };
        conn.queue_reply(code, channel, payload);
        conn.mark_channel_free(channel);
        if conn.flush_outbound().is_err() {
            self.close(id, out);
        }
    }

    /// Releases one channel on the daemon's own initiative, in response
    /// to an `MSG_DISCONNECT` sent on that channel. Only this channel's
    /// slot is freed; every other channel multiplexed on the same
    /// connection, including any parked voters, is left alone. Does not
    /// touch the connection itself — a client saying "I'm done with
    /// this channel" is not the same event as its TCP connection
    /// closing.
    pub fn release_channel(&mut self, id: ConnId, channel: u32) {
        if let Some(conn) = self.connections.get_mut(id.0) {
            conn.forget_channel(channel);
        }
    }

    fn close(&mut self, id: ConnId, out: &mut Vec<TransportEvent>) {
        if self.connections.contains(id.0) {
            let mut conn = self.connections.remove(id.0);
            let _ = self.poll.registry().deregister(&mut conn.stream);
            out.push(TransportEvent::Disconnected(id));
        }
    }
}

/// Builds the listening socket through `socket2` so `listen(2)`'s
/// backlog is ours to set — `mio::net::TcpListener::bind` goes straight
/// to the OS default, with no parameter to control it.
fn bind_std_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_QUEUE_SIZE)?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}
