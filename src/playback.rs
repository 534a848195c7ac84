//! Playback flow: synthesize and transmit stored codes in order.
//!
//! Strictly sequential: each identifier's waveforms are built, chained out,
//! polled to completion and released before the next identifier is touched,
//! so the port never holds more than one code's worth of waveform objects.
//! Codes are paced by the configured inter-code gap: the next transmission
//! never starts earlier than `gap_ms` after the previous one finished, even
//! when waveform construction is fast.

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::port::{PinMode, Port};
use crate::settings::Settings;
use crate::store::CodeStore;
use crate::wave::CodeWaves;

/// Transmit each identifier's stored code. Unknown identifiers are
/// reported and skipped; the rest of the batch still plays.
pub fn playback(port: &mut dyn Port, settings: &Settings, path: &Path, ids: &[String]) -> Result<()> {
    // Unlike recording, playback has nothing useful to do without a store.
    let store = CodeStore::load(path)?;

    port.set_mode(PinMode::Output)?;

    let mut emit_at = Instant::now();
    tracing::debug!("playing {} ids", ids.len());

    for id in ids {
        let Some(code) = store.pulses(id) else {
            println!("Id '{}' not found", id);
            continue;
        };

        let waves = CodeWaves::build(port, &code, settings.carrier_khz)?;

        // Honor the inter-code gap before keying the transmitter.
        let delay = emit_at.saturating_duration_since(Instant::now());
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        port.wave_chain(waves.chain())?;
        tracing::debug!("key {}", id);

        while port.wave_tx_busy()? {
            thread::sleep(Duration::from_millis(2));
        }
        emit_at = Instant::now() + Duration::from_millis(settings.gap_ms as u64);

        waves.release(port)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::sim::SimPort;

    fn test_settings() -> Settings {
        Settings {
            carrier_khz: 38.0,
            gap_ms: 10,
            ..Settings::default()
        }
    }

    fn store_with_codes(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("codes");
        let mut store = CodeStore::default();
        store.insert("1", vec![2000.0, 1000.0, 300.0, 280.0, 300.0]);
        store.insert("2", vec![600.0, 550.0, 600.0]);
        store.save(&path).unwrap();
        path
    }

    #[test]
    fn unknown_id_is_skipped_but_batch_continues() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_with_codes(dir.path());
        let mut port = SimPort::connect(Vec::new()).unwrap();

        let ids = vec!["1".to_string(), "9".to_string()];
        playback(&mut port, &test_settings(), &path, &ids).unwrap();

        // "9" was reported and skipped; "1" still went out.
        assert_eq!(port.transmissions().len(), 1);
        assert_eq!(port.live_waves(), 0);
    }

    #[test]
    fn missing_store_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut port = SimPort::connect(Vec::new()).unwrap();
        let ids = vec!["1".to_string()];
        let err = playback(&mut port, &test_settings(), &dir.path().join("absent"), &ids);
        assert!(err.is_err());
        assert!(port.transmissions().is_empty());
    }

    #[test]
    fn codes_are_paced_by_the_gap() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_with_codes(dir.path());
        let mut port = SimPort::connect(Vec::new()).unwrap();

        let settings = Settings {
            gap_ms: 30,
            ..test_settings()
        };
        let ids = vec!["2".to_string(), "2".to_string()];
        let started = Instant::now();
        playback(&mut port, &settings, &path, &ids).unwrap();

        assert_eq!(port.transmissions().len(), 2);
        // Second transmission waited out the inter-code gap.
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn chain_matches_pulse_order_and_waves_are_released() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_with_codes(dir.path());
        let mut port = SimPort::connect(Vec::new()).unwrap();

        let ids = vec!["1".to_string()];
        playback(&mut port, &test_settings(), &path, &ids).unwrap();

        let sent = port.transmissions();
        assert_eq!(sent.len(), 1);
        // Marks are carrier bursts, spaces single off steps: the flattened
        // chain for [2000,1000,300,280,300] has off-only segments at the
        // stored space durations.
        let spaces: Vec<u32> = sent[0]
            .iter()
            .filter(|s| !s.on && s.micros > 100)
            .map(|s| s.micros)
            .collect();
        assert_eq!(spaces, vec![1000, 280]);
        assert_eq!(port.live_waves(), 0);
    }
}
