//! Simulated port: a scripted loopback backend.
//!
//! `SimPort` stands in for real IR hardware. On the receive side it plays a
//! script of inter-edge gaps (in microseconds, real time) through a worker
//! thread, resetting the armed watchdog on every edge and firing the
//! synthetic expiry when the script goes quiet, exactly as the hardware
//! watchdog would. On the transmit side it registers waveforms, logs every
//! chained transmission for inspection, and reports "busy" for the real
//! duration of the chained steps so callers exercise their busy-poll path.
//!
//! The tests drive record and playback end to end through this port; the
//! CLI falls back to it when no hardware backend is attached.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{PinMode, Port, PortError, PortEvent, WaveId, WaveStep};

enum Ctrl {
    Listen(Sender<PortEvent>),
    Watchdog(u32),
    Shutdown,
}

/// Scripted loopback implementation of [`Port`].
pub struct SimPort {
    ctrl_tx: Sender<Ctrl>,
    worker: Option<JoinHandle<()>>,
    #[allow(dead_code)]
    mode: Option<PinMode>,
    #[allow(dead_code)]
    glitch_us: u32,
    waves: HashMap<WaveId, Vec<WaveStep>>,
    next_wave: u32,
    tx_until: Option<Instant>,
    transmissions: Arc<Mutex<Vec<Vec<WaveStep>>>>,
}

impl SimPort {
    /// "Connect" to the simulated hardware, with a script of inter-edge
    /// gaps (µs) to replay once a listener attaches.
    pub fn connect(script: Vec<u32>) -> Result<Self, PortError> {
        let (ctrl_tx, ctrl_rx) = mpsc::channel();
        let worker = thread::spawn(move || run_worker(ctrl_rx, script));
        tracing::debug!("simulated port connected");
        Ok(Self {
            ctrl_tx,
            worker: Some(worker),
            mode: None,
            glitch_us: 0,
            waves: HashMap::new(),
            next_wave: 0,
            tx_until: None,
            transmissions: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Every chain transmitted so far, flattened to its steps.
    #[allow(dead_code)]
    pub fn transmissions(&self) -> Vec<Vec<WaveStep>> {
        self.transmissions.lock().unwrap().clone()
    }

    /// Waveforms currently registered and not yet deleted.
    #[allow(dead_code)]
    pub fn live_waves(&self) -> usize {
        self.waves.len()
    }
}

impl Port for SimPort {
    fn set_mode(&mut self, mode: PinMode) -> Result<(), PortError> {
        self.mode = Some(mode);
        Ok(())
    }

    fn set_glitch_filter(&mut self, us: u32) -> Result<(), PortError> {
        self.glitch_us = us;
        Ok(())
    }

    fn listen(&mut self, tx: Sender<PortEvent>) -> Result<(), PortError> {
        self.ctrl_tx
            .send(Ctrl::Listen(tx))
            .map_err(|_| PortError::Backend("sim worker gone".into()))
    }

    fn set_watchdog(&mut self, ms: u32) -> Result<(), PortError> {
        self.ctrl_tx
            .send(Ctrl::Watchdog(ms))
            .map_err(|_| PortError::Backend("sim worker gone".into()))
    }

    fn wave_create(&mut self, steps: &[WaveStep]) -> Result<WaveId, PortError> {
        let id = WaveId(self.next_wave);
        self.next_wave += 1;
        self.waves.insert(id, steps.to_vec());
        Ok(id)
    }

    fn wave_chain(&mut self, chain: &[WaveId]) -> Result<(), PortError> {
        let mut flattened = Vec::new();
        for id in chain {
            let steps = self.waves.get(id).ok_or(PortError::UnknownWave(*id))?;
            flattened.extend_from_slice(steps);
        }
        let micros: u64 = flattened.iter().map(|s| s.micros as u64).sum();
        self.tx_until = Some(Instant::now() + Duration::from_micros(micros));
        self.transmissions.lock().unwrap().push(flattened);
        Ok(())
    }

    fn wave_tx_busy(&mut self) -> Result<bool, PortError> {
        Ok(match self.tx_until {
            Some(until) => Instant::now() < until,
            None => false,
        })
    }

    fn wave_delete(&mut self, id: WaveId) -> Result<(), PortError> {
        self.waves
            .remove(&id)
            .map(|_| ())
            .ok_or(PortError::UnknownWave(id))
    }
}

impl Drop for SimPort {
    fn drop(&mut self) {
        let _ = self.ctrl_tx.send(Ctrl::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

/// Worker loop: paces scripted edges in real time and emulates the
/// hardware watchdog (reset on every edge, repeating until disarmed).
fn run_worker(ctrl_rx: Receiver<Ctrl>, script: Vec<u32>) {
    let mut pending = script.into_iter();
    let mut listener: Option<Sender<PortEvent>> = None;
    let mut tick: u32 = 0;
    let mut next_edge: Option<(Instant, u32)> = None;
    let mut watchdog_ms: Option<u32> = None;
    let mut watchdog_at: Option<Instant> = None;

    loop {
        let now = Instant::now();
        let due = [next_edge.map(|(at, _)| at), watchdog_at]
            .into_iter()
            .flatten()
            .min();

        let ctrl = match due {
            // Script exhausted with no watchdog armed: no event will ever
            // be delivered again. Drain queued control (an arm may be in
            // flight), then hang up so a blocked consumer sees the channel
            // close instead of waiting forever.
            None => match ctrl_rx.try_recv() {
                Ok(ctrl) => Some(ctrl),
                Err(mpsc::TryRecvError::Empty) => {
                    listener = None;
                    match ctrl_rx.recv() {
                        Ok(ctrl) => Some(ctrl),
                        Err(_) => break,
                    }
                }
                Err(mpsc::TryRecvError::Disconnected) => break,
            },
            Some(at) => match ctrl_rx.recv_timeout(at.saturating_duration_since(now)) {
                Ok(ctrl) => Some(ctrl),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
        };

        match ctrl {
            Some(Ctrl::Listen(tx)) => {
                listener = Some(tx);
                if let Some(gap) = pending.next() {
                    next_edge = Some((Instant::now() + Duration::from_micros(gap as u64), gap));
                }
            }
            Some(Ctrl::Watchdog(0)) => {
                watchdog_ms = None;
                watchdog_at = None;
            }
            Some(Ctrl::Watchdog(ms)) => {
                watchdog_ms = Some(ms);
                watchdog_at = Some(Instant::now() + Duration::from_millis(ms as u64));
            }
            Some(Ctrl::Shutdown) => break,
            None => {
                let now = Instant::now();
                if let Some((at, gap)) = next_edge {
                    if at <= now {
                        tick = tick.wrapping_add(gap);
                        let delivered =
                            listener.as_ref().map_or(true, |tx| tx.send(PortEvent::Edge { tick }).is_ok());
                        if !delivered {
                            listener = None;
                        }
                        next_edge = pending
                            .next()
                            .map(|gap| (now + Duration::from_micros(gap as u64), gap));
                        // A real edge resets the hardware watchdog.
                        if let Some(ms) = watchdog_ms {
                            watchdog_at = Some(now + Duration::from_millis(ms as u64));
                        }
                        continue;
                    }
                }
                if let (Some(at), Some(ms)) = (watchdog_at, watchdog_ms) {
                    if at <= now {
                        let delivered =
                            listener.as_ref().map_or(true, |tx| tx.send(PortEvent::Watchdog).is_ok());
                        if !delivered {
                            listener = None;
                        }
                        // Keeps firing every period until disarmed.
                        watchdog_at = Some(now + Duration::from_millis(ms as u64));
                    }
                }
            }
        }
    }
}
