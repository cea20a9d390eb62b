use std::io;

use dtmd_base::Bitmap256;
use dtmd_proto::{ErrorKind, Header};
use mio::net::TcpStream;

use crate::buffer::GrowableBuffer;
use crate::registry::ChannelTable;

/// Hard ceiling on channel ids, tied to `Bitmap256`'s 256-bit width. A
/// connection's actual cap is `Connection::max_channels`, which is
/// `--max-channels` clamped to this range.
pub const MAX_CHANNELS_PER_CONNECTION: u32 = 256;

/// One accepted TCP connection: its socket plus the buffered bytes
/// flowing in and out of it, which channel ids exist on it at all
/// (`registry`), and which of those currently have a request in flight
/// (`channels_busy`).
pub struct Connection {
    pub stream: TcpStream,
    inbound: GrowableBuffer,
    outbound: GrowableBuffer,
    registry: ChannelTable,
    channels_busy: Bitmap256,
    max_channels: u32,
    max_frame_payload: usize,
    pub peer_closed: bool,
}

impl Connection {
    pub fn new(stream: TcpStream, buffer_size: usize, max_frame_payload: usize, max_channels: u32) -> Self {
        let mut registry = ChannelTable::new();
        registry.on_connect();
        Connection {
            stream,
            inbound: GrowableBuffer::with_capacity(buffer_size),
            outbound: GrowableBuffer::with_capacity(buffer_size),
            registry,
            channels_busy: Bitmap256::new(),
            max_channels: max_channels.min(MAX_CHANNELS_PER_CONNECTION),
            max_frame_payload,
            peer_closed: false,
        }
    }

    /// Reads as much as the socket will give up without blocking.
    /// Returns `Ok(true)` if the peer has shut down its write half.
    pub fn fill_inbound(&mut self) -> io::Result<bool> {
        let eof = self.inbound.ingress(&mut self.stream)?;
        if eof {
            self.peer_closed = true;
        }
        Ok(eof)
    }

    /// Writes as much of the outbound queue as the socket will accept.
    pub fn flush_outbound(&mut self) -> io::Result<()> {
        self.outbound.egress(&mut self.stream)
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Pulls the next complete frame out of the inbound buffer, if one
    /// has fully arrived. Returns `Err` if the declared frame size
    /// exceeds this connection's configured buffer, which the caller
    /// should treat as fatal for the connection.
    pub fn try_take_frame(&mut self) -> Result<Option<(Header, Vec<u8>)>, ErrorKind> {
        let available = self.inbound.unread();
        if available.len() < Header::LEN {
            return Ok(None);
        }
        let header = match Header::decode(&available[..Header::LEN]) {
            Some(h) => h,
            None => return Ok(None),
        };
        let payload_len = header.size as usize;
        if payload_len > self.max_frame_payload {
            return Err(ErrorKind::CapacityExhausted);
        }
        let total = Header::LEN + payload_len;
        if available.len() < total {
            return Ok(None);
        }
        let payload = available[Header::LEN..total].to_vec();
        self.inbound.consume(total);
        Ok(Some((header, payload)))
    }

    pub fn queue_reply(&mut self, code: u8, channel: u32, payload: &[u8]) {
        let header = Header { size: payload.len() as u32, code, channel };
        let mut bytes = [0u8; Header::LEN];
        header.encode(&mut bytes);
        self.outbound.extend(&bytes);
        self.outbound.extend(payload);
    }

    /// Opens `channel` in the registry (idempotent) and marks it busy.
    /// Fails if `channel` is outside this connection's configured range
    /// or if it already has a request in flight.
    pub fn mark_channel_busy(&mut self, channel: u32) -> bool {
        if !self.registry.open(channel, self.max_channels) {
            return false;
        }
        if self.channels_busy.get(channel as u8) {
            return false;
        }
        self.channels_busy.set(channel as u8, true);
        true
    }

    pub fn mark_channel_free(&mut self, channel: u32) {
        if channel < MAX_CHANNELS_PER_CONNECTION {
            self.channels_busy.set(channel as u8, false);
        }
    }

    /// Per-channel disconnect: forgets the channel's registry entry and
    /// frees its busy slot, leaving every other channel on this
    /// connection untouched.
    pub fn forget_channel(&mut self, channel: u32) {
        self.registry.forget(channel);
        self.mark_channel_free(channel);
    }
}
