pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Read half of the device link.
///
/// `read_chunk` copies whatever bytes are pending into `buf`, waiting at most
/// `timeout`. `Ok(0)` means no data arrived within the timeout and is not an
/// error; the caller decides how to idle.
pub trait TelemetryPort {
    fn read_chunk(
        &mut self,
        buf: &mut [u8],
        timeout: std::time::Duration,
    ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>>;
}

/// Write half of the device link.
///
/// `send_line` appends the line terminator, writes, and flushes so the device
/// sees each command as one complete line.
pub trait CommandPort {
    fn send_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
