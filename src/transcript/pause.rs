//! Natural-sounding silence between spoken units.
//!
//! The gap after a unit depends on how its text ends: questions get the
//! longest pause, exclamations the shortest.

use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;

/// Pause after a question.
pub const QUESTION_PAUSE_MS: RangeInclusive<u64> = 500..=800;

/// Pause after a trailing ellipsis.
pub const ELLIPSIS_PAUSE_MS: RangeInclusive<u64> = 400..=600;

/// Pause after an exclamation.
pub const EXCLAMATION_PAUSE_MS: RangeInclusive<u64> = 200..=350;

/// Pause after anything else.
pub const DEFAULT_PAUSE_MS: RangeInclusive<u64> = 300..=500;

/// Picks the pause range for a unit's text.
///
/// Surrounding whitespace and trailing quote characters are ignored when
/// looking at the final punctuation.
#[must_use]
pub fn pause_range(text: &str) -> RangeInclusive<u64> {
    let ending = text.trim().trim_end_matches(['"', '\'']);
    if ending.ends_with('?') {
        QUESTION_PAUSE_MS
    } else if ending.ends_with("...") {
        ELLIPSIS_PAUSE_MS
    } else if ending.ends_with('!') {
        EXCLAMATION_PAUSE_MS
    } else {
        DEFAULT_PAUSE_MS
    }
}

/// Draws the silence to insert after a unit ending with `text`.
pub fn pause_duration<R: Rng + ?Sized>(text: &str, rng: &mut R) -> Duration {
    Duration::from_millis(rng.gen_range(pause_range(text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sample_many(text: &str) -> Vec<u64> {
        let mut rng = StdRng::seed_from_u64(42);
        (0..200)
            .map(|_| {
                u64::try_from(pause_duration(text, &mut rng).as_millis()).unwrap_or(u64::MAX)
            })
            .collect()
    }

    fn assert_all_within(text: &str, range: &RangeInclusive<u64>) {
        for ms in sample_many(text) {
            assert!(range.contains(&ms), "{ms}ms outside {range:?} for {text:?}");
        }
    }

    #[test]
    fn test_question_pause_range() {
        assert_all_within("Really?", &QUESTION_PAUSE_MS);
    }

    #[test]
    fn test_ellipsis_pause_range() {
        assert_all_within("Well...", &ELLIPSIS_PAUSE_MS);
    }

    #[test]
    fn test_exclamation_pause_range() {
        assert_all_within("Wow!", &EXCLAMATION_PAUSE_MS);
    }

    #[test]
    fn test_default_pause_range() {
        assert_all_within("Okay.", &DEFAULT_PAUSE_MS);
        assert_all_within("no punctuation", &DEFAULT_PAUSE_MS);
        assert_all_within("", &DEFAULT_PAUSE_MS);
    }

    #[test]
    fn test_trailing_quotes_and_whitespace_are_ignored() {
        assert_eq!(pause_range("He said \"why?\"  "), QUESTION_PAUSE_MS);
        assert_eq!(pause_range("'Amazing!'"), EXCLAMATION_PAUSE_MS);
        assert_eq!(pause_range("  and then...\n"), ELLIPSIS_PAUSE_MS);
    }

    #[test]
    fn test_same_seed_same_pause() {
        let mut a = StdRng::seed_from_u64(1);
        let mut b = StdRng::seed_from_u64(1);
        assert_eq!(pause_duration("Hi.", &mut a), pause_duration("Hi.", &mut b));
    }
}
