//! Record flow: capture each requested identifier, confirm it, and save
//! the tidied store.
//!
//! Capture blocks on the port's event channel, feeding the state machine
//! and applying its watchdog effects, until a code completes. Too-short
//! captures (key-repeat fragments) are retried silently for the same
//! identifier. With confirmation enabled the key must be pressed a second
//! time and both recordings must agree within tolerance; after three "No
//! match" retries the identifier is abandoned and recording moves on. The
//! store is only tidied, rotated and written after every identifier has
//! been processed.

use std::path::Path;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::capture::{CaptureMachine, CaptureState, Effect};
use crate::port::{PinMode, Port, PortEvent};
use crate::settings::Settings;
use crate::signal;
use crate::store::CodeStore;

/// Maximum consecutive confirmation mismatches before a key is abandoned.
const CONFIRM_RETRIES: u32 = 3;

/// Record the given identifiers into the store at `path`.
pub fn record(port: &mut dyn Port, settings: &Settings, path: &Path, ids: &[String]) -> Result<()> {
    anyhow::ensure!(!ids.is_empty(), "no identifiers to record");

    // A missing store file just means this is the first recording session.
    let mut store = CodeStore::load_or_empty(path)?;

    port.set_mode(PinMode::Input)?;
    port.set_glitch_filter(settings.glitch_us)?;
    let (event_tx, event_rx) = mpsc::channel();
    port.listen(event_tx)?;

    // One machine for the whole session so inter-edge history (last tick)
    // carries across captures.
    let mut machine = CaptureMachine::new();

    println!("Recording");
    for id in ids {
        println!("Press key for '{}'", id);
        let mut first = capture_code(port, &event_rx, &mut machine, settings)?;
        println!("Okay");
        settle(settings);

        if settings.confirm {
            let mut tries = 0;
            loop {
                println!("Press key for '{}' to confirm", id);
                let second = capture_code(port, &event_rx, &mut machine, settings)?;
                if signal::compare(&mut first, &second, settings) {
                    store.insert(id, first);
                    println!("Okay");
                    settle(settings);
                    break;
                }
                tries += 1;
                if tries <= CONFIRM_RETRIES {
                    println!("No match");
                    settle(settings);
                } else {
                    println!("Giving up on key '{}'", id);
                    settle(settings);
                    break;
                }
            }
        } else {
            store.insert(id, first);
        }
    }

    port.set_glitch_filter(0)?;
    port.set_watchdog(0)?;

    store.tidy(settings);
    store.save(path)
}

/// Block until one code is captured, retrying through short-code rejects.
fn capture_code(
    port: &mut dyn Port,
    events: &Receiver<PortEvent>,
    machine: &mut CaptureMachine,
    settings: &Settings,
) -> Result<Vec<f64>> {
    machine.begin();
    loop {
        let event = events.recv().context("port event stream ended")?;
        for effect in machine.handle(event, settings) {
            match effect {
                Effect::ArmWatchdog(ms) => port.set_watchdog(ms)?,
                Effect::DisarmWatchdog => port.set_watchdog(0)?,
            }
        }
        match machine.state() {
            CaptureState::Completed(code) => return Ok(code.clone()),
            CaptureState::Rejected => {
                println!("Short code, probably a repeat, try again");
                machine.begin();
            }
            _ => {}
        }
    }
}

fn settle(settings: &Settings) {
    if settings.key_delay_ms > 0 {
        thread::sleep(Duration::from_millis(settings.key_delay_ms));
    }
}
