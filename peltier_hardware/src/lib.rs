//! Physical and simulated implementations of the link traits.
//!
//! `SerialLink::open` produces the two halves of a real serial connection
//! (full duplex: the reader and writer are independent handles on the same
//! port). `sim::SimulatedDevice` provides a scripted in-process device for
//! tests and demos.
pub mod error;
pub mod sim;

use std::io::{Read, Write};
use std::time::Duration;

use error::LinkError;
use peltier_traits::{CommandPort, TelemetryPort};

/// Enumerate serial port names visible to the OS.
pub fn available_ports() -> error::Result<Vec<String>> {
    let ports = serialport::available_ports().map_err(|e| LinkError::Serial(e.to_string()))?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// Read half of an open serial connection.
pub struct SerialReader {
    port: Box<dyn serialport::SerialPort>,
    timeout: Duration,
}

/// Write half of an open serial connection.
pub struct SerialWriter {
    port: Box<dyn serialport::SerialPort>,
}

/// Opens a serial port and splits it into reader and writer halves.
pub struct SerialLink;

impl SerialLink {
    /// Open `port_name` at `baud` (8N1) and split it. The reader half blocks
    /// up to `read_timeout` per chunk; the writer half up to `write_timeout`
    /// per command.
    pub fn open(
        port_name: &str,
        baud: u32,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> error::Result<(SerialReader, SerialWriter)> {
        let reader_port = serialport::new(port_name, baud)
            .timeout(read_timeout)
            .open()
            .map_err(|e| LinkError::Open {
                port: port_name.to_string(),
                source: e,
            })?;
        let mut writer_port = reader_port.try_clone().map_err(|e| LinkError::Open {
            port: port_name.to_string(),
            source: e,
        })?;
        writer_port
            .set_timeout(write_timeout)
            .map_err(|e| LinkError::Serial(e.to_string()))?;
        tracing::info!(port = port_name, baud, "serial port opened");
        Ok((
            SerialReader {
                port: reader_port,
                timeout: read_timeout,
            },
            SerialWriter { port: writer_port },
        ))
    }
}

impl TelemetryPort for SerialReader {
    fn read_chunk(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        if timeout != self.timeout {
            self.port
                .set_timeout(timeout)
                .map_err(|e| Box::new(LinkError::Serial(e.to_string())) as Box<dyn std::error::Error + Send + Sync>)?;
            self.timeout = timeout;
        }
        match self.port.read(buf) {
            // Some platforms report an exhausted timeout as Ok(0).
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(Box::new(LinkError::Io(e))),
        }
    }
}

impl CommandPort for SerialWriter {
    fn send_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.port
            .write_all(&bytes)
            .and_then(|()| self.port.flush())
            .map_err(|e| Box::new(LinkError::Io(e)) as _)
    }
}
