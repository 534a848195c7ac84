//! Store-wide canonicalization of pulse lengths.
//!
//! Runs once per save, over every stored code at once, so that e.g. the
//! "short mark" of every code in the store converges to one shared length.
//! Playback then needs at most one waveform object per canonical length,
//! and re-recording a key against an existing store lands on stable values.
//!
//! Marks and spaces are processed independently: count every observed
//! length of one parity across the whole store, sweep the lengths in
//! ascending order collecting each run that stays under `seed * (1 + tol)`
//! into one bucket, and close each bucket to the occurrence-weighted
//! average of its members. A value joins or misses a bucket based on the
//! bucket's *seed* (its smallest member), never on the running average.
//!
//! Lengths are keyed in centi-microseconds so the two-decimal values the
//! normalizer produces order and compare exactly.

use std::collections::BTreeMap;

use crate::settings::Settings;

/// Sequences stored under their identifiers; tidied in place.
pub type Records = BTreeMap<String, Vec<f64>>;

fn centi_us(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

/// Canonicalize all marks (`base` 0) or all spaces (`base` 1) across the store.
fn tidy_mark_space(records: &mut Records, base: usize, settings: &Settings) {
    let mut counts: BTreeMap<i64, f64> = BTreeMap::new();
    for seq in records.values() {
        for &value in seq.iter().skip(base).step_by(2) {
            *counts.entry(centi_us(value)).or_insert(0.0) += 1.0;
        }
    }
    tracing::debug!("tidy base {} counts {:?}", base, counts);

    if counts.is_empty() {
        return;
    }

    let toler_max = settings.toler_max();
    let mut canonical: BTreeMap<i64, f64> = BTreeMap::new();

    let mut bucket: Vec<i64> = Vec::new();
    let mut seed = 0.0_f64;
    let mut total = 0.0_f64;
    let mut weight = 0.0_f64;

    for (&key, &count) in &counts {
        let plen = key as f64 / 100.0;
        if !bucket.is_empty() && plen < seed * toler_max {
            bucket.push(key);
            total += plen * count;
            weight += count;
        } else {
            if !bucket.is_empty() {
                let value = (total / weight).round();
                for member in bucket.drain(..) {
                    canonical.insert(member, value);
                }
            }
            bucket.push(key);
            seed = plen;
            total = plen * count;
            weight = count;
        }
    }
    let value = (total / weight).round();
    for member in bucket {
        canonical.insert(member, value);
    }

    tracing::debug!("tidy base {} canonical {:?}", base, canonical);

    for seq in records.values_mut() {
        for slot in seq.iter_mut().skip(base).step_by(2) {
            *slot = canonical[&centi_us(*slot)];
        }
    }
}

/// Canonicalize every mark and space length across the whole store.
pub fn tidy(records: &mut Records, settings: &Settings) {
    tidy_mark_space(records, 0, settings); // Marks.
    tidy_mark_space(records, 1, settings); // Spaces.
}
