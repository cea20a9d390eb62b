/// Fixed frame header: `{u32 size, u8 code, u32 channel}`, little-endian.
/// `size` counts payload bytes only.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    pub size: u32,
    pub code: u8,
    pub channel: u32,
}

impl Header {
    pub const LEN: usize = 4 + 1 + 4;

    pub fn encode(&self, out: &mut [u8; Header::LEN]) {
        out[0..4].copy_from_slice(&self.size.to_le_bytes());
        out[4] = self.code;
        out[5..9].copy_from_slice(&self.channel.to_le_bytes());
    }

    /// Decodes a header from the front of `buf`. Returns `None` only when
    /// `buf` is shorter than `Header::LEN` (need more bytes); a header
    /// that parses is never itself invalid, since every byte pattern is a
    /// valid `{size, code, channel}` triple — validity judgments (known
    /// code, size within buffer capacity) are made by the caller.
    pub fn decode(buf: &[u8]) -> Option<Header> {
        if buf.len() < Header::LEN {
            return None;
        }
        let size = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let code = buf[4];
        let channel = u32::from_le_bytes(buf[5..9].try_into().unwrap());
        Some(Header { size, code, channel })
    }
}
