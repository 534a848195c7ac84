//! Confirmation comparator: check two captures of the same key agree.
//!
//! Used during recording when confirmation is enabled: the first press and
//! the confirming press must match pulse for pulse within the tolerance
//! band before the code is stored.

use crate::settings::Settings;

/// Compare two normalized captures of the presumed same code.
///
/// Returns `false` (leaving both inputs untouched) if the lengths differ or
/// any pairwise ratio `first[i] / second[i]` falls outside the tolerance
/// band. On a match, `first` is rewritten in place to the rounded average
/// of the two recordings and `true` is returned; the caller stores `first`
/// as the confirmed code.
pub fn compare(first: &mut [f64], second: &[f64], settings: &Settings) -> bool {
    if first.len() != second.len() {
        return false;
    }

    let toler_min = settings.toler_min();
    let toler_max = settings.toler_max();

    for (a, b) in first.iter().zip(second) {
        // A zero or negative pulse makes the ratio non-finite or
        // meaningless; it can never confirm a recording.
        let ratio = a / b;
        if !ratio.is_finite() || ratio < toler_min || ratio > toler_max {
            return false;
        }
    }

    for (a, b) in first.iter_mut().zip(second) {
        *a = ((*a + b) / 2.0).round();
    }

    tracing::debug!("after compare {:?}", first);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::default()
    }

    #[test]
    fn matching_recordings_average() {
        let mut first = vec![
            9000.0, 4500.0, 600.0, 560.0, 600.0, 560.0, 600.0, 1700.0, 600.0, 1700.0, 600.0,
        ];
        let second = vec![
            9020.0, 4570.0, 590.0, 550.0, 590.0, 550.0, 590.0, 1640.0, 590.0, 1640.0, 590.0,
        ];
        assert!(compare(&mut first, &second, &settings()));
        assert_eq!(
            first,
            vec![9010.0, 4535.0, 595.0, 555.0, 595.0, 555.0, 595.0, 1670.0, 595.0, 1670.0, 595.0]
        );
    }

    #[test]
    fn length_mismatch_fails() {
        let mut first = vec![9000.0, 4500.0, 600.0];
        let second = vec![9000.0, 4500.0];
        assert!(!compare(&mut first, &second, &settings()));
        assert_eq!(first, vec![9000.0, 4500.0, 600.0]);
    }

    #[test]
    fn out_of_band_ratio_fails_without_mutation() {
        // One bad position anywhere fails the whole comparison and must not
        // touch either input.
        let mut first = vec![9000.0, 4500.0, 600.0, 560.0];
        let second = vec![9000.0, 4500.0, 600.0, 400.0];
        assert!(!compare(&mut first, &second, &settings()));
        assert_eq!(first, vec![9000.0, 4500.0, 600.0, 560.0]);
    }

    #[test]
    fn band_is_symmetric_in_ratio() {
        // 15% band on the ratio: 700/560 = 1.25 fails either way around.
        let mut first = vec![700.0];
        assert!(!compare(&mut first, &[560.0], &settings()));
        let mut first = vec![560.0];
        assert!(!compare(&mut first, &[700.0], &settings()));
    }

    #[test]
    fn zero_pulse_fails_without_mutation() {
        // A zero duration makes the ratio non-finite; that position must
        // fail outright instead of slipping past the band check.
        let mut first = vec![9000.0, 4500.0, 600.0];
        let second = vec![9000.0, 4500.0, 0.0];
        assert!(!compare(&mut first, &second, &settings()));
        assert_eq!(first, vec![9000.0, 4500.0, 600.0]);

        let mut first = vec![0.0];
        assert!(!compare(&mut first, &[0.0], &settings()));
        assert_eq!(first, vec![0.0]);
    }

    #[test]
    fn average_rounds_to_whole_microseconds() {
        let mut first = vec![601.0];
        assert!(compare(&mut first, &[602.0], &settings()));
        // 601.5 rounds half away from zero.
        assert_eq!(first, vec![602.0]);
    }
}
