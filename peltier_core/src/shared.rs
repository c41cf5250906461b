//! Lock-free state shared between the reader, scheduler and engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// One-shot flags the engine raises before actions whose side effects the
/// reader must reinterpret.
#[derive(Debug, Default)]
pub struct LinkFlags {
    /// Armed before transmitting a stop command so the device's echoed STOP
    /// sentinel is not reported as a device-initiated abort. Consumed by the
    /// reader on the next STOP line.
    pub suppress_next_stop: AtomicBool,
    /// Latched by the reader when the link dies; cleared on connect.
    pub connection_lost: AtomicBool,
}

impl LinkFlags {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn arm_stop_suppression(&self) {
        self.suppress_next_stop.store(true, Ordering::SeqCst);
    }

    /// True if a suppression was armed; clears it either way.
    pub fn consume_stop_suppression(&self) -> bool {
        self.suppress_next_stop.swap(false, Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.suppress_next_stop.store(false, Ordering::SeqCst);
        self.connection_lost.store(false, Ordering::SeqCst);
    }
}

/// Last known inside temperature, written by the reader and polled by the
/// scheduler. Stored as f32 bits; NaN means no sample yet.
#[derive(Debug, Clone)]
pub struct SharedTemp(Arc<AtomicU32>);

impl Default for SharedTemp {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedTemp {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU32::new(f32::NAN.to_bits())))
    }

    pub fn set(&self, v: f32) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> Option<f32> {
        let v = f32::from_bits(self.0.load(Ordering::Relaxed));
        if v.is_nan() { None } else { Some(v) }
    }

    pub fn clear(&self) {
        self.0.store(f32::NAN.to_bits(), Ordering::Relaxed);
    }
}
