//! Waveform construction for playback.
//!
//! Each mark in a stored code becomes a carrier square wave of the right
//! duration; each space becomes a single all-off step. Within one code the
//! waveforms are deduplicated by exact duration — after the store-wide tidy
//! pass a code rarely has more than two or three distinct mark lengths, so
//! this keeps the number of objects registered with the port small.

use std::collections::HashMap;

use crate::port::{Port, PortError, WaveId, WaveStep};

/// Build a carrier square wave covering `micros` at `freq_khz`.
///
/// The cycle length is `1000 / freq_khz` µs with the carrier on for half of
/// each (rounded) cycle. Off times are computed against a per-cycle rounded
/// target so rounding error cancels instead of accumulating: the whole
/// segment sums to the rounded length of a whole number of cycles.
pub fn carrier(freq_khz: f64, micros: u32) -> Vec<WaveStep> {
    let cycle = 1000.0 / freq_khz;
    let cycles = (micros as f64 / cycle).round() as u32;
    let on = (cycle / 2.0).round() as u32;

    let mut steps = Vec::with_capacity(cycles as usize * 2);
    let mut sofar: i64 = 0;
    for c in 0..cycles {
        let target = ((c + 1) as f64 * cycle).round() as i64;
        sofar += on as i64;
        let off = (target - sofar).max(0);
        sofar += off;
        steps.push(WaveStep { on: true, micros: on });
        steps.push(WaveStep {
            on: false,
            micros: off as u32,
        });
    }
    steps
}

/// The waveforms registered for one code: a chain (one entry per pulse, in
/// order) over at most one carrier wave and one null wave per distinct
/// duration.
pub struct CodeWaves {
    chain: Vec<WaveId>,
    marks: HashMap<u64, WaveId>,
    spaces: HashMap<u64, WaveId>,
}

impl CodeWaves {
    /// Register the waveforms for `code` with the port.
    pub fn build(port: &mut dyn Port, code: &[u64], freq_khz: f64) -> Result<Self, PortError> {
        let mut marks: HashMap<u64, WaveId> = HashMap::new();
        let mut spaces: HashMap<u64, WaveId> = HashMap::new();
        let mut chain = Vec::with_capacity(code.len());

        for (i, &micros) in code.iter().enumerate() {
            let id = if i & 1 == 1 {
                // Space: carrier off.
                match spaces.get(&micros) {
                    Some(&id) => id,
                    None => {
                        let id = port.wave_create(&[WaveStep {
                            on: false,
                            micros: micros as u32,
                        }])?;
                        spaces.insert(micros, id);
                        id
                    }
                }
            } else {
                // Mark: carrier on.
                match marks.get(&micros) {
                    Some(&id) => id,
                    None => {
                        let id = port.wave_create(&carrier(freq_khz, micros as u32))?;
                        marks.insert(micros, id);
                        id
                    }
                }
            };
            chain.push(id);
        }

        Ok(Self {
            chain,
            marks,
            spaces,
        })
    }

    /// Per-pulse wave handles in original pulse order.
    pub fn chain(&self) -> &[WaveId] {
        &self.chain
    }

    /// Release every registered waveform before the next code is built.
    pub fn release(self, port: &mut dyn Port) -> Result<(), PortError> {
        for (_, id) in self.marks.into_iter().chain(self.spaces) {
            port.wave_delete(id)?;
        }
        Ok(())
    }
}
