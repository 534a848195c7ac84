//! Immutable timing and tolerance configuration shared by every component.
//!
//! One `Settings` value is built from the command line at startup and passed
//! by reference into the capture machine, the signal processing passes and
//! the playback flow. Nothing mutates it after construction.

/// Timing windows, tolerance band and playback parameters.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Edges shorter than this are suppressed by the hardware glitch filter (µs).
    pub glitch_us: u32,
    /// Minimum silence before a code is considered started (ms).
    pub pre_ms: u32,
    /// Silence (and watchdog timeout) that marks the end of a code (ms).
    pub post_ms: u32,
    /// Raw captures with at most this many pulses are rejected as noise.
    pub min_pulses: usize,
    /// Percentage band for treating two durations as the same pulse.
    pub tolerance_pct: u32,
    /// IR carrier frequency in kHz.
    pub carrier_khz: f64,
    /// Minimum gap between two transmitted codes (ms).
    pub gap_ms: u32,
    /// Require each recorded code to be confirmed by a second press.
    pub confirm: bool,
    /// Settle time after an accepted capture and between confirmation
    /// attempts (ms). 500 in normal use; tests set it to zero.
    pub key_delay_ms: u64,
}

impl Settings {
    /// Preamble window in microseconds.
    pub fn pre_us(&self) -> u32 {
        self.pre_ms * 1000
    }

    /// Postamble window in microseconds.
    pub fn post_us(&self) -> u32 {
        self.post_ms * 1000
    }

    /// Lower edge of the tolerance band, e.g. 0.85 for 15%.
    pub fn toler_min(&self) -> f64 {
        (100.0 - self.tolerance_pct as f64) / 100.0
    }

    /// Upper edge of the tolerance band, e.g. 1.15 for 15%.
    pub fn toler_max(&self) -> f64 {
        (100.0 + self.tolerance_pct as f64) / 100.0
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            glitch_us: 100,
            pre_ms: 200,
            post_ms: 15,
            min_pulses: 10,
            tolerance_pct: 15,
            carrier_khz: 38.0,
            gap_ms: 100,
            confirm: true,
            key_delay_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_windows() {
        let s = Settings::default();
        assert_eq!(s.pre_us(), 200_000);
        assert_eq!(s.post_us(), 15_000);
        assert!((s.toler_min() - 0.85).abs() < f64::EPSILON);
        assert!((s.toler_max() - 1.15).abs() < f64::EPSILON);
    }
}
