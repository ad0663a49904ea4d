//! Byte transport abstraction.

/// A full-duplex, byte-oriented serial transport.
///
/// The supervisor performs blind fixed-size reads: it asks for exactly one
/// packet's worth of bytes and treats a short read as "no packet yet". There
/// is no delimiter on the wire; alignment is recovered through CRC rejection
/// at the layer above.
///
/// # Implementation Notes
///
/// - `read` blocks until `buf` is full or the timeout elapses, returning the
///   number of bytes actually placed in `buf`.
/// - `write_all` blocks until every byte is accepted by the transport.
pub trait ByteLink {
    /// Error type for transport operations.
    type Error: core::fmt::Debug;

    /// Reads up to `buf.len()` bytes, waiting at most `timeout_ms`.
    ///
    /// Returns the number of bytes read; fewer than `buf.len()` means the
    /// timeout expired first.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error>;

    /// Writes the whole buffer.
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error>;
}
