//! Persisted code store: identifier → confirmed pulse sequence.
//!
//! The on-disk format is a JSON object mapping each identifier to an array
//! of non-negative microsecond durations (alternating mark/space, starting
//! with a mark). Keys are written in sorted order and each code sits on its
//! own line, so successive saves diff cleanly. Every save is preceded by a
//! three-deep backup rotation (`f → f.bak → f.bak1 → f.bak2`), and the
//! rotation only happens immediately before a write, so a failed load or an
//! aborted recording never touches the existing files.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::settings::Settings;
use crate::signal;

/// In-memory store; pulse values are `f64` in flight and whole microseconds
/// once tidied (tidy always runs before save).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CodeStore {
    codes: BTreeMap<String, Vec<f64>>,
}

impl CodeStore {
    /// Load the store, failing if the file is missing or malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("can't open: {}", path.display()))?;
        let codes: BTreeMap<String, Vec<f64>> = serde_json::from_str(&data)
            .with_context(|| format!("malformed code store: {}", path.display()))?;
        Ok(Self { codes })
    }

    /// Load the store, treating a missing file as an empty store (the
    /// recording case). Any other error still fails.
    pub fn load_or_empty(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(data) => {
                let codes = serde_json::from_str(&data)
                    .with_context(|| format!("malformed code store: {}", path.display()))?;
                Ok(Self { codes })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("can't open: {}", path.display())),
        }
    }

    pub fn insert(&mut self, id: &str, code: Vec<f64>) {
        self.codes.insert(id.to_string(), code);
    }

    #[allow(dead_code)]
    pub fn contains(&self, id: &str) -> bool {
        self.codes.contains_key(id)
    }

    /// Pulse durations for one identifier, as whole microseconds.
    pub fn pulses(&self, id: &str) -> Option<Vec<u64>> {
        self.codes
            .get(id)
            .map(|code| code.iter().map(|&v| v.round() as u64).collect())
    }

    /// Sorted identifiers.
    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.codes.keys().map(String::as_str)
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Canonicalize mark and space lengths across every stored code.
    pub fn tidy(&mut self, settings: &Settings) {
        signal::tidy(&mut self.codes, settings);
    }

    /// Rotate backups, then write the store with sorted keys, one code per
    /// line, integer durations.
    pub fn save(&self, path: &Path) -> Result<()> {
        let ints: BTreeMap<&str, Vec<u64>> = self
            .codes
            .iter()
            .map(|(id, code)| {
                (
                    id.as_str(),
                    code.iter().map(|&v| v.round() as u64).collect(),
                )
            })
            .collect();
        let body = serde_json::to_string(&ints).context("serializing code store")?;

        rotate_backups(path);

        let formatted = body.replace("],", "],\n") + "\n";
        fs::write(path, formatted)
            .with_context(|| format!("writing code store: {}", path.display()))?;
        tracing::info!("saved {} codes to {}", self.codes.len(), path.display());
        Ok(())
    }
}

fn with_suffix(path: &Path, suffix: &str) -> OsString {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    s
}

/// `f.bak1 → f.bak2`, `f.bak → f.bak1`, `f → f.bak`. Each rename is
/// best-effort: a missing source just means that slot was never written.
fn rotate_backups(path: &Path) {
    let _ = fs::rename(with_suffix(path, ".bak1"), with_suffix(path, ".bak2"));
    let _ = fs::rename(with_suffix(path, ".bak"), with_suffix(path, ".bak1"));
    let _ = fs::rename(path, with_suffix(path, ".bak"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty_for_recording() {
        let dir = tempfile::tempdir().unwrap();
        let store = CodeStore::load_or_empty(&dir.path().join("codes")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn missing_file_is_fatal_for_playback() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CodeStore::load(&dir.path().join("codes")).is_err());
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes");

        let mut store = CodeStore::default();
        store.insert("tv_power", vec![9000.0, 4500.0, 600.0]);
        store.insert("1", vec![600.0, 550.0, 600.0]);
        store.save(&path).unwrap();

        let reloaded = CodeStore::load(&path).unwrap();
        assert_eq!(reloaded, store);
    }

    #[test]
    fn output_is_sorted_and_one_code_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes");

        let mut store = CodeStore::default();
        store.insert("volume_up", vec![100.0, 200.0]);
        store.insert("1", vec![300.0, 400.0]);
        store.save(&path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.find("\"1\"").unwrap() < written.find("\"volume_up\"").unwrap());
        assert!(written.contains("],\n"));
        // Integer durations only.
        assert!(!written.contains(".0"));
    }

    #[test]
    fn fractional_values_round_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes");

        let mut store = CodeStore::default();
        store.insert("k", vec![601.33, 549.5]);
        store.save(&path).unwrap();

        let reloaded = CodeStore::load(&path).unwrap();
        assert_eq!(reloaded.pulses("k").unwrap(), vec![601, 550]);
    }

    #[test]
    fn backup_rotation_shifts_three_deep() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes");

        fs::write(&path, "current").unwrap();
        fs::write(with_suffix(&path, ".bak"), "old-bak").unwrap();
        fs::write(with_suffix(&path, ".bak1"), "old-bak1").unwrap();

        let mut store = CodeStore::default();
        store.insert("1", vec![600.0, 550.0]);
        store.save(&path).unwrap();

        assert_eq!(fs::read_to_string(with_suffix(&path, ".bak2")).unwrap(), "old-bak1");
        assert_eq!(fs::read_to_string(with_suffix(&path, ".bak1")).unwrap(), "old-bak");
        assert_eq!(fs::read_to_string(with_suffix(&path, ".bak")).unwrap(), "current");
        assert!(fs::read_to_string(&path).unwrap().contains("\"1\""));
    }

    #[test]
    fn rotation_tolerates_missing_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes");

        let mut store = CodeStore::default();
        store.insert("1", vec![600.0, 550.0]);
        store.save(&path).unwrap();
        store.save(&path).unwrap();

        assert!(path.exists());
        assert!(Path::new(&with_suffix(&path, ".bak")).exists());
        assert!(!Path::new(&with_suffix(&path, ".bak1")).exists());
    }
}
