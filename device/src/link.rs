/// Abstraction over the device's UART (spec §4.2). The worker and its
/// frame reader only ever see this trait; the concrete implementation
/// is a hardware collaborator (a `pc.baud(rate)`-style UART driver on
/// the real microcontroller, or an in-memory loopback in tests).
pub trait Link {
    /// Write the full byte slice, retrying internally until every byte
    /// is transmitted or the underlying hardware reports an error.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError>;

    /// Non-blocking single-byte read. `Ok(None)` when nothing is
    /// available yet; never blocks.
    fn read_nonblocking(&mut self) -> Option<u8>;

    /// Drains pending output, then reconfigures the UART to the new
    /// baud rate (8N1, no flow control, raw mode per spec §6).
    fn set_baud(&mut self, rate: u32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("write failed")]
    WriteFailed,
}
