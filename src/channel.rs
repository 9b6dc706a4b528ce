//! Byte-channel capability consumed by the engine.
//!
//! LIN is a single-wire, self-echoing bus driven here through a generic
//! UART, so the engine only needs a small set of serial primitives: write,
//! polled read, a synchronous baud-rate switch (the sync break is produced
//! by halving the rate), and input discard for fault recovery. Per-port
//! hardware bindings implement this trait; the engine itself never touches
//! registers.

use crate::error::ChannelError;

/// Serial transport as seen by the LIN master engine.
///
/// One implementation drives one physical bus. The engine may own the
/// implementation or borrow it; `&mut T` forwards the whole trait.
pub trait ByteChannel {
    /// Queue bytes for transmission.
    fn write(&mut self, bytes: &[u8]) -> Result<(), ChannelError>;

    /// Number of received bytes waiting to be read.
    fn available(&mut self) -> usize;

    /// Consume one received byte, if any is waiting.
    fn read_byte(&mut self) -> Option<u8>;

    /// Change the line rate. Must not return before the new rate has taken
    /// effect on the hardware; the engine relies on this when switching
    /// between the half-rate break and the full-rate frame body.
    fn set_baud_rate(&mut self, baud: u32) -> Result<(), ChannelError>;

    /// Block until every queued byte has left the transmitter.
    fn flush(&mut self);

    /// Drop any unread received bytes. Called before every transaction so
    /// stale bytes from a prior faulted transaction cannot alias the echo.
    fn clear_input(&mut self);
}

impl<T: ByteChannel + ?Sized> ByteChannel for &mut T {
    fn write(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        (**self).write(bytes)
    }

    fn available(&mut self) -> usize {
        (**self).available()
    }

    fn read_byte(&mut self) -> Option<u8> {
        (**self).read_byte()
    }

    fn set_baud_rate(&mut self, baud: u32) -> Result<(), ChannelError> {
        (**self).set_baud_rate(baud)
    }

    fn flush(&mut self) {
        (**self).flush()
    }

    fn clear_input(&mut self) {
        (**self).clear_input()
    }
}
