/// A growable byte queue: bytes are appended at the tail and consumed
/// from a moving read cursor at the head. Once the consumed prefix grows
/// past half the buffer's length, it's physically dropped (`compact`) so
/// a connection that's mostly idle doesn't hold onto megabytes of
/// already-read frame data.
#[derive(Debug, Default)]
pub struct GrowableBuffer {
    data: Vec<u8>,
    pos: usize,
}

impl GrowableBuffer {
    pub fn new() -> Self {
        GrowableBuffer { data: Vec::new(), pos: 0 }
    }

    pub fn with_capacity(cap: usize) -> Self {
        GrowableBuffer { data: Vec::with_capacity(cap), pos: 0 }
    }

    /// The bytes available to read right now.
    pub fn unread(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    pub fn len(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Space left to grow into before the next reallocation.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Marks `n` bytes as consumed. Panics if `n` exceeds what's unread,
    /// since that would mean a caller double-consumed a frame.
    pub fn consume(&mut self, n: usize) {
        assert!(n <= self.len(), "consumed past the end of the buffer");
        self.pos += n;
        self.compact();
    }

    fn compact(&mut self) {
        if self.pos > 0 && self.pos * 2 >= self.data.len() {
            self.data.drain(0..self.pos);
            self.pos = 0;
        }
    }

    /// Reads from `reader` until it would block or reports EOF, growing
    /// the buffer as needed. Returns `Ok(true)` if EOF was reached.
    pub fn ingress<R: std::io::Read>(&mut self, reader: &mut R) -> std::io::Result<bool> {
        const CHUNK: usize = 4096;
        loop {
            let start = self.data.len();
            self.data.resize(start + CHUNK, 0);
            match reader.read(&mut self.data[start..]) {
                Ok(0) => {
                    self.data.truncate(start);
                    return Ok(true);
                }
                Ok(n) => {
                    self.data.truncate(start + n);
                    if n < CHUNK {
                        return Ok(false);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    self.data.truncate(start);
                    return Ok(false);
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                    self.data.truncate(start);
                    continue;
                }
                Err(e) => {
                    self.data.truncate(start);
                    return Err(e);
                }
            }
        }
    }

    /// Writes the unread portion to `writer` until it would block or the
    /// buffer is drained.
    pub fn egress<W: std::io::Write>(&mut self, writer: &mut W) -> std::io::Result<()> {
        loop {
            if self.is_empty() {
                return Ok(());
            }
            match writer.write(self.unread()) {
                Ok(0) => return Ok(()),
                Ok(n) => self.consume(n),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_and_consume_round_trip() {
        let mut b = GrowableBuffer::new();
        b.extend(b"hello world");
        assert_eq!(b.unread(), b"hello world");
        b.consume(6);
        assert_eq!(b.unread(), b"world");
    }

    #[test]
    fn compacts_once_consumed_passes_the_halfway_mark() {
        let mut b = GrowableBuffer::new();
        b.extend(b"0123456789");
        b.consume(6);
        // pos (6) * 2 >= len (10), so the consumed prefix is dropped.
        assert_eq!(b.unread(), b"6789");
        b.extend(b"ab");
        assert_eq!(b.unread(), b"6789ab");
    }

    #[test]
    #[should_panic]
    fn consuming_past_the_end_panics() {
        let mut b = GrowableBuffer::new();
        b.extend(b"ab");
        b.consume(3);
    }

    #[test]
    fn ingress_reads_until_eof() {
        let mut b = GrowableBuffer::new();
        let mut cursor = std::io::Cursor::new(b"abcdef".to_vec());
        let eof = b.ingress(&mut cursor).unwrap();
        assert!(eof);
        assert_eq!(b.unread(), b"abcdef");
    }

    #[test]
    fn egress_drains_into_a_writer() {
        let mut b = GrowableBuffer::new();
        b.extend(b"abcdef");
        let mut out = Vec::new();
        b.egress(&mut out).unwrap();
        assert_eq!(out, b"abcdef");
        assert!(b.is_empty());
    }
}
