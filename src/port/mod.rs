//! Hardware seam: the `Port` trait abstracts the GPIO/timer layer.
//!
//! The engine never talks to pins directly. A port delivers level-change
//! events (with a wrapping microsecond tick) and watchdog expiries over an
//! mpsc channel, and on the transmit side accepts prebuilt waveforms and
//! chains them out. Record and playback take `&mut dyn Port`, so any
//! backend that can produce edges and emit timed on/off steps plugs in
//! here; the crate ships [`sim::SimPort`], a scripted loopback backend used
//! by the tests and as a stand-in when no hardware is attached.
//!
//! Ownership rules: exactly one operation (record or playback) holds the
//! port at a time, and a port releases its resources on drop, so every exit
//! path, including early failures, disconnects cleanly.

pub mod sim;

use std::sync::mpsc::Sender;

use thiserror::Error;

/// Pin direction for the attached IR device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    /// IR receiver attached: deliver edges.
    Input,
    /// IR transmitter attached: accept waveforms.
    Output,
}

/// Event delivered by a listening port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortEvent {
    /// The input level changed at this microsecond tick (wraps at `u32::MAX`).
    Edge { tick: u32 },
    /// No edge arrived within the armed watchdog window.
    Watchdog,
}

/// One step of a transmit waveform: carrier on or off for `micros`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveStep {
    pub on: bool,
    pub micros: u32,
}

/// Handle to a waveform registered with the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaveId(pub u32);

/// Errors from the hardware layer.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("unknown waveform {0:?}")]
    UnknownWave(WaveId),
    #[error("hardware backend error: {0}")]
    Backend(String),
}

/// The hardware abstraction the capture and playback flows are written
/// against.
pub trait Port {
    /// Configure the pin for receive or transmit.
    fn set_mode(&mut self, mode: PinMode) -> Result<(), PortError>;

    /// Suppress edges shorter than `us` microseconds (0 disables).
    fn set_glitch_filter(&mut self, us: u32) -> Result<(), PortError>;

    /// Start delivering [`PortEvent`]s to `tx`, one at a time, in order.
    fn listen(&mut self, tx: Sender<PortEvent>) -> Result<(), PortError>;

    /// Arm the no-edge watchdog for `ms` milliseconds; re-arming replaces
    /// any prior timer and `ms == 0` disarms (idempotently).
    fn set_watchdog(&mut self, ms: u32) -> Result<(), PortError>;

    /// Register a waveform, returning its handle.
    fn wave_create(&mut self, steps: &[WaveStep]) -> Result<WaveId, PortError>;

    /// Transmit the given waveforms back to back.
    fn wave_chain(&mut self, chain: &[WaveId]) -> Result<(), PortError>;

    /// Whether a chained transmission is still in progress.
    fn wave_tx_busy(&mut self) -> Result<bool, PortError>;

    /// Release one registered waveform.
    fn wave_delete(&mut self, id: WaveId) -> Result<(), PortError>;
}
