use dtmd_base::Bitmap256;

/// Per-connection channel registry: tracks which channel ids exist on
/// this connection, independent of whether a request on that channel is
/// currently in flight (that's `Connection::channels_busy`, a separate
/// concern — busy means "a reply is owed", not "this channel id has
/// ever been used"). A channel is opened the first time a frame arrives
/// on it and forgotten either by an explicit per-channel
/// `MSG_DISCONNECT` or by the whole connection closing.
#[derive(Default)]
pub struct ChannelTable {
    known: Bitmap256,
}

impl ChannelTable {
    pub fn new() -> Self {
        ChannelTable { known: Bitmap256::new() }
    }

    /// Called once when the owning connection is accepted. A freshly
    /// built table is already empty, so this only matters if a table is
    /// ever reused across connections.
    pub fn on_connect(&mut self) {
        self.known.clear_all();
    }

    /// Registers `channel` as live. Idempotent: a channel already known
    /// stays known. Returns `false` if `channel` falls outside
    /// `max_channels`, in which case the caller should treat the frame
    /// as a protocol violation.
    pub fn open(&mut self, channel: u32, max_channels: u32) -> bool {
        if channel >= max_channels || channel >= 256 {
            return false;
        }
        self.known.set(channel as u8, true);
        true
    }

    pub fn contains(&self, channel: u32) -> bool {
        channel < 256 && self.known.get(channel as u8)
    }

    /// Forgets one channel, leaving every other channel on the
    /// connection untouched.
    pub fn forget(&mut self, channel: u32) {
        if channel < 256 {
            self.known.set(channel as u8, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_then_forget_is_independent_per_channel() {
        let mut table = ChannelTable::new();
        assert!(table.open(3, 256));
        assert!(table.open(5, 256));
        assert!(table.contains(3));
        assert!(table.contains(5));

        table.forget(3);
        assert!(!table.contains(3));
        assert!(table.contains(5));
    }

    #[test]
    fn rejects_channel_outside_the_configured_range() {
        let mut table = ChannelTable::new();
        assert!(!table.open(8, 8));
        assert!(!table.contains(8));
    }
}
