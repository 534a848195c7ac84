//! Edge-driven capture state machine for one IR code.
//!
//! The hardware layer reports level changes (with a wrapping microsecond
//! tick) and synthetic watchdog expiries on a channel; this machine turns
//! that event stream into one raw pulse sequence. It is deliberately
//! hardware-free: handling an event returns the side effects to perform
//! (arm or disarm the port watchdog) instead of performing them, so the
//! whole transition table is testable without a port.
//!
//! A code starts when an edge arrives after at least the preamble window of
//! silence, and ends either at an edge whose gap exceeds the postamble
//! window or, more commonly, when the watchdog fires because the receiver
//! has gone quiet. Captures with too few pulses are rejected as noise
//! (usually a key-repeat fragment) and the machine is re-armed by the
//! caller.

use crate::port::PortEvent;
use crate::settings::Settings;
use crate::signal::normalize;

/// Where the machine is in one capture attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    /// Not listening; events are ignored.
    Idle,
    /// Armed, waiting for the preamble silence followed by a first edge.
    AwaitingStart,
    /// Inside a code, accumulating inter-edge gaps.
    InCode,
    /// A code survived the length check and was normalized.
    Completed(Vec<f64>),
    /// The code was too short; the buffer was discarded.
    Rejected,
}

/// Side effects for the caller to apply to the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Arm (or re-arm) the no-edge watchdog for this many milliseconds.
    ArmWatchdog(u32),
    /// Disarm the watchdog.
    DisarmWatchdog,
}

/// State machine plus the transient session it owns (pulse buffer, last
/// edge tick).
pub struct CaptureMachine {
    state: CaptureState,
    code: Vec<f64>,
    last_tick: u32,
}

impl CaptureMachine {
    pub fn new() -> Self {
        Self {
            state: CaptureState::Idle,
            code: Vec::new(),
            last_tick: 0,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    /// Start (or restart) listening for one code.
    pub fn begin(&mut self) {
        self.code.clear();
        self.state = CaptureState::AwaitingStart;
    }

    /// Feed one port event, returning the effects to apply.
    pub fn handle(&mut self, event: PortEvent, settings: &Settings) -> Vec<Effect> {
        match event {
            PortEvent::Edge { tick } => {
                // last_tick advances on every edge, listening or not, so the
                // first gap after begin() is measured from real history.
                let gap = tick.wrapping_sub(self.last_tick);
                self.last_tick = tick;
                self.on_edge(gap, settings)
            }
            PortEvent::Watchdog => {
                if self.state == CaptureState::InCode {
                    self.end_of_code(settings);
                }
                vec![Effect::DisarmWatchdog]
            }
        }
    }

    fn on_edge(&mut self, gap: u32, settings: &Settings) -> Vec<Effect> {
        match self.state {
            CaptureState::AwaitingStart if gap > settings.pre_us() => {
                // Preamble silence followed by activity: a code starts.
                self.state = CaptureState::InCode;
                vec![Effect::ArmWatchdog(settings.post_ms)]
            }
            CaptureState::InCode if gap > settings.post_us() => {
                self.end_of_code(settings);
                vec![Effect::DisarmWatchdog]
            }
            CaptureState::InCode => {
                self.code.push(gap as f64);
                Vec::new()
            }
            // Idle, AwaitingStart inside the preamble, Completed, Rejected:
            // the edge only advanced last_tick.
            _ => Vec::new(),
        }
    }

    fn end_of_code(&mut self, settings: &Settings) {
        if self.code.len() > settings.min_pulses {
            let mut code = std::mem::take(&mut self.code);
            normalize(&mut code, settings);
            self.state = CaptureState::Completed(code);
        } else {
            tracing::debug!("rejecting short capture of {} pulses", self.code.len());
            self.code.clear();
            self.state = CaptureState::Rejected;
        }
    }
}

impl Default for CaptureMachine {
    fn default() -> Self {
        Self::new()
    }
}
