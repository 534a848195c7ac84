//! Pulse normalizer: collapse near-duplicate pulse lengths within one code.
//!
//! A code is typically built from two or three distinct mark lengths and two
//! or three distinct space lengths. Reception jitter spreads each of those
//! around its true value; this pass finds the pulses that are the same
//! physical length and replaces them with their average, marks and spaces
//! independently. Downstream this keeps the number of distinct waveform
//! objects per code small.
//!
//! Clustering is seeded: each unprocessed pulse becomes the seed of a
//! similarity set, and every later same-parity pulse is tested against the
//! *seed* value, not against a running mean. On pathological inputs that can
//! make the grouping depend on pulse order (similarity is not transitive).
//! Tolerance values in the field are tuned against exactly this behavior,
//! so it is kept as is rather than corrected.

use crate::settings::Settings;

/// Collapse similar same-parity pulses to their shared average, in place.
///
/// Averages are rounded to two decimal places. Applying the pass twice with
/// the same tolerance is a no-op.
pub fn normalize(code: &mut [f64], settings: &Settings) {
    tracing::debug!("before normalize {:?}", code);

    let toler_min = settings.toler_min();
    let toler_max = settings.toler_max();
    let entries = code.len();
    let mut processed = vec![false; entries];

    for i in 0..entries {
        if processed[i] {
            continue;
        }
        let seed = code[i];
        let mut total = seed;
        let mut similar = 1.0_f64;

        // Same parity only: marks against marks, spaces against spaces.
        let mut j = i + 2;
        while j < entries {
            if !processed[j] && seed * toler_min < code[j] && code[j] < seed * toler_max {
                total += code[j];
                similar += 1.0;
            }
            j += 2;
        }

        let mean = (total / similar * 100.0).round() / 100.0;
        code[i] = mean;

        let mut j = i + 2;
        while j < entries {
            if !processed[j] && seed * toler_min < code[j] && code[j] < seed * toler_max {
                code[j] = mean;
                processed[j] = true;
            }
            j += 2;
        }
    }

    tracing::debug!("after normalize {:?}", code);
}
