//! irplay - record and replay infrared remote-control codes.
//!
//! Codes are captured from an IR receiver as raw pulse timings, normalized,
//! confirmed by a second key press, canonicalized across the whole store
//! and saved as JSON; playback rebuilds each code as a carrier-modulated
//! waveform and hands it to the transmitter.
//!
//! Record:   irplay -r -g 4  -f codes 1 2 3
//! Playback: irplay -p -g 17 -f codes 2 3
//! List:     irplay -l -f codes

mod capture;
mod playback;
mod port;
mod record;
mod settings;
mod signal;
mod store;
mod wave;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use port::sim::SimPort;
use settings::Settings;
use store::CodeStore;

#[derive(Parser, Debug)]
#[command(version, about = "Record and replay IR remote-control codes")]
#[command(group(ArgGroup::new("mode").required(true).args(["record", "play", "list"])))]
struct Args {
    /// Record codes from the receiver
    #[arg(short, long)]
    record: bool,

    /// Play back stored codes on the transmitter
    #[arg(short, long)]
    play: bool,

    /// List the identifiers in the store file
    #[arg(short, long)]
    list: bool,

    /// GPIO pin (receiver when recording, transmitter when playing)
    #[arg(short, long, required_unless_present = "list")]
    gpio: Option<u32>,

    /// Code store file
    #[arg(short, long)]
    file: PathBuf,

    /// Identifiers to record or play
    #[arg(required_unless_present = "list")]
    id: Vec<String>,

    /// IR carrier frequency in kHz
    #[arg(long, default_value_t = 38.0, value_parser = carrier_khz)]
    freq: f64,

    /// Gap between transmitted codes in ms
    #[arg(long, default_value_t = 100)]
    gap: u32,

    /// Ignore edges shorter than this many µs
    #[arg(long, default_value_t = 100)]
    glitch: u32,

    /// Expected silence after a code in ms
    #[arg(long, default_value_t = 15)]
    post: u32,

    /// Expected silence before a code in ms
    #[arg(long, default_value_t = 200)]
    pre: u32,

    /// Reject codes with this many pulses or fewer
    #[arg(long, default_value_t = 10)]
    short: usize,

    /// Tolerance percent for matching pulses
    #[arg(long, default_value_t = 15)]
    tolerance: u32,

    /// Log debug detail
    #[arg(short, long)]
    verbose: bool,

    /// Don't require each code to be confirmed by a second press
    #[arg(long)]
    no_confirm: bool,
}

/// The carrier frequency divides the pulse durations, so zero or negative
/// values would synthesize empty mark waveforms. Reject them up front.
fn carrier_khz(value: &str) -> Result<f64, String> {
    let khz: f64 = value.parse().map_err(|err| format!("{err}"))?;
    if khz.is_finite() && khz > 0.0 {
        Ok(khz)
    } else {
        Err("carrier frequency must be a positive number of kHz".into())
    }
}

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "irplay=debug"
    } else {
        "irplay=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(err) = run(args) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let settings = Settings {
        glitch_us: args.glitch,
        pre_ms: args.pre,
        post_ms: args.post,
        min_pulses: args.short,
        tolerance_pct: args.tolerance,
        carrier_khz: args.freq,
        gap_ms: args.gap,
        confirm: !args.no_confirm,
        key_delay_ms: 500,
    };

    if args.list {
        let store = CodeStore::load(&args.file)?;
        for id in store.ids() {
            println!("{}", id);
        }
        return Ok(());
    }

    // Connect to the hardware layer up front: a failure here is fatal
    // before any store mutation. The port releases its resources on drop
    // on every exit path. The built-in backend is the simulated loopback;
    // a real GPIO backend plugs in behind the same Port trait.
    let pin = args.gpio.context("a GPIO pin is required")?;
    let mut sim = SimPort::connect(Vec::new())
        .context("connecting to the GPIO hardware layer")?;
    tracing::warn!("no hardware backend attached; using the simulated port on GPIO {}", pin);

    if args.record {
        record::record(&mut sim, &settings, &args.file, &args.id)
    } else {
        playback::playback(&mut sim, &settings, &args.file, &args.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn record_and_play_are_mutually_exclusive() {
        let err = Args::try_parse_from(["irplay", "-r", "-p", "-g", "4", "-f", "codes", "1"]);
        assert!(err.is_err());
    }

    #[test]
    fn a_mode_is_required() {
        let err = Args::try_parse_from(["irplay", "-g", "4", "-f", "codes", "1"]);
        assert!(err.is_err());
    }

    #[test]
    fn record_requires_at_least_one_id() {
        let err = Args::try_parse_from(["irplay", "-r", "-g", "4", "-f", "codes"]);
        assert!(err.is_err());
    }

    #[test]
    fn list_needs_no_ids_or_pin() {
        let args = Args::try_parse_from(["irplay", "-l", "-f", "codes"]).unwrap();
        assert!(args.list);
        assert!(args.id.is_empty());
    }

    #[test]
    fn non_positive_carrier_frequency_is_rejected() {
        for freq in ["0", "-38", "nan", "inf"] {
            let flag = format!("--freq={freq}");
            let err = Args::try_parse_from([
                "irplay",
                "-p",
                "-g",
                "17",
                "-f",
                "codes",
                flag.as_str(),
                "1",
            ]);
            assert!(err.is_err(), "--freq {freq} should not parse");
        }
        let args =
            Args::try_parse_from(["irplay", "-p", "-g", "17", "-f", "codes", "--freq=36", "1"])
                .unwrap();
        assert_eq!(args.freq, 36.0);
    }

    #[test]
    fn defaults_match_the_recording_profile() {
        let args = Args::try_parse_from(["irplay", "-r", "-g", "4", "-f", "codes", "1"]).unwrap();
        assert_eq!(args.glitch, 100);
        assert_eq!(args.pre, 200);
        assert_eq!(args.post, 15);
        assert_eq!(args.short, 10);
        assert_eq!(args.tolerance, 15);
        assert_eq!(args.freq, 38.0);
        assert_eq!(args.gap, 100);
        assert!(!args.no_confirm);
    }
}
