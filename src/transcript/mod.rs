//! Dialogue transcripts: segmentation into speaker turns and turn helpers.
//!
//! Transcripts mark turns as `<Person1>...</Person1>` and
//! `<Person2>...</Person2>`. A turn only counts when its closing tag names
//! the same speaker as its opening tag; anything else is ignored.

pub mod pause;

use std::fmt;
use std::sync::LazyLock;

use rand::Rng;
use rand::seq::SliceRandom;
use regex::{Captures, Regex};

pub use pause::pause_duration;

#[allow(clippy::expect_used)]
static PERSON1_TURN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<Person1>(.*?)</Person1>").expect("Person1 regex is valid")
});

#[allow(clippy::expect_used)]
static PERSON2_TURN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<Person2>(.*?)</Person2>").expect("Person2 regex is valid")
});

#[allow(clippy::expect_used)]
static FILLER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[Mm]m[- ]?[Hh]mm?\b").expect("filler regex is valid"));

const FILLER_REPLACEMENTS: [&str; 4] = ["Yeah", "Yes", "Right", "Yep"];

/// One of the two hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Speaker {
    One,
    Two,
}

impl Speaker {
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    /// Alias used by the `SpeakerN:` line format.
    #[must_use]
    pub fn alias(self) -> &'static str {
        match self {
            Self::One => "Speaker1",
            Self::Two => "Speaker2",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Person{}", self.number())
    }
}

/// A single speaker turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub speaker: Speaker,
    pub text: String,
}

impl Utterance {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }
}

/// Splits a tagged transcript into ordered utterances.
///
/// Tags may span lines and are matched non-greedily. Turn text is trimmed
/// and empty turns are dropped. A transcript without any well-formed turn
/// yields an empty list.
#[must_use]
pub fn parse_transcript(transcript: &str) -> Vec<Utterance> {
    let mut utterances = Vec::new();
    let mut position = 0;

    while position < transcript.len() {
        let one = PERSON1_TURN.captures_at(transcript, position);
        let two = PERSON2_TURN.captures_at(transcript, position);

        let (speaker, captures): (Speaker, Captures<'_>) = match (one, two) {
            (Some(a), Some(b)) => {
                if start_of(&a) <= start_of(&b) {
                    (Speaker::One, a)
                } else {
                    (Speaker::Two, b)
                }
            }
            (Some(a), None) => (Speaker::One, a),
            (None, Some(b)) => (Speaker::Two, b),
            (None, None) => break,
        };

        position = captures.get(0).map_or(transcript.len(), |whole| whole.end());
        let text = captures.get(1).map_or("", |inner| inner.as_str()).trim();
        if !text.is_empty() {
            utterances.push(Utterance::new(speaker, text));
        }
    }

    utterances
}

fn start_of(captures: &Captures<'_>) -> usize {
    captures.get(0).map_or(usize::MAX, |whole| whole.start())
}

/// Renders utterances as `SpeakerN: text` lines.
#[must_use]
pub fn render_speaker_lines(utterances: &[Utterance]) -> String {
    utterances
        .iter()
        .map(|utterance| format!("{}: {}", utterance.speaker.alias(), utterance.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parses `SpeakerN: text` lines; other lines are ignored.
#[must_use]
pub fn parse_speaker_lines(text: &str) -> Vec<Utterance> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            let (speaker, rest) = if let Some(rest) = line.strip_prefix("Speaker1:") {
                (Speaker::One, rest)
            } else if let Some(rest) = line.strip_prefix("Speaker2:") {
                (Speaker::Two, rest)
            } else {
                return None;
            };
            let rest = rest.trim();
            (!rest.is_empty()).then(|| Utterance::new(speaker, rest))
        })
        .collect()
}

/// Replaces "mm-hmm" style fillers, which voice engines tend to garble,
/// with a randomly chosen short affirmation.
pub fn replace_filler_words<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    FILLER
        .replace_all(text, |_: &Captures<'_>| {
            FILLER_REPLACEMENTS
                .choose(&mut *rng)
                .copied()
                .unwrap_or(FILLER_REPLACEMENTS[0])
        })
        .into_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    // ==================== Segmentation Tests ====================

    #[test]
    fn test_parse_transcript_preserves_order() {
        let transcript = "<Person1>Hello and welcome.</Person1>\n\
                          <Person2>Thanks for having me!</Person2>\n\
                          <Person1>Let's dig in.</Person1>";

        let utterances = parse_transcript(transcript);

        assert_eq!(
            utterances,
            vec![
                Utterance::new(Speaker::One, "Hello and welcome."),
                Utterance::new(Speaker::Two, "Thanks for having me!"),
                Utterance::new(Speaker::One, "Let's dig in."),
            ]
        );
    }

    #[test]
    fn test_parse_transcript_spans_lines_and_trims() {
        let utterances = parse_transcript("<Person2>\n  first line\nsecond line  \n</Person2>");
        assert_eq!(utterances.len(), 1);
        assert_eq!(utterances[0].text, "first line\nsecond line");
    }

    #[test]
    fn test_parse_transcript_drops_empty_turns() {
        let utterances = parse_transcript("<Person1>   </Person1><Person2>Hi</Person2>");
        assert_eq!(utterances, vec![Utterance::new(Speaker::Two, "Hi")]);
    }

    #[test]
    fn test_parse_transcript_ignores_mismatched_tags() {
        let utterances =
            parse_transcript("<Person1>broken</Person2> <Person2>fine</Person2>");
        assert_eq!(utterances, vec![Utterance::new(Speaker::Two, "fine")]);
    }

    #[test]
    fn test_parse_transcript_without_tags_is_empty() {
        assert!(parse_transcript("Just some prose, no tags.").is_empty());
        assert!(parse_transcript("").is_empty());
    }

    #[test]
    fn test_parse_transcript_ignores_other_speakers() {
        assert!(parse_transcript("<Person3>who?</Person3>").is_empty());
    }

    #[test]
    fn test_parse_transcript_is_non_greedy() {
        let utterances = parse_transcript("<Person1>a</Person1>x<Person1>b</Person1>");
        assert_eq!(utterances.len(), 2);
        assert_eq!(utterances[1].text, "b");
    }

    // ==================== Speaker Line Tests ====================

    #[test]
    fn test_speaker_lines_round_trip() {
        let utterances = vec![
            Utterance::new(Speaker::One, "Hi there"),
            Utterance::new(Speaker::Two, "Hello"),
        ];
        let rendered = render_speaker_lines(&utterances);
        assert_eq!(rendered, "Speaker1: Hi there\nSpeaker2: Hello");
        assert_eq!(parse_speaker_lines(&rendered), utterances);
    }

    #[test]
    fn test_parse_speaker_lines_skips_chatter() {
        let parsed = parse_speaker_lines("Here is the rewrite:\nSpeaker2: Okay.\nSpeaker1:\n");
        assert_eq!(parsed, vec![Utterance::new(Speaker::Two, "Okay.")]);
    }

    // ==================== Filler Tests ====================

    #[test]
    fn test_replace_filler_words_variants() {
        let mut rng = StdRng::seed_from_u64(7);
        for filler in ["Mm-hmm", "mm hmm", "Mmhm", "mm-Hmm"] {
            let replaced = replace_filler_words(&format!("{filler}, that's right."), &mut rng);
            let first = replaced.split(',').next().unwrap();
            assert!(
                FILLER_REPLACEMENTS.contains(&first),
                "unexpected replacement {first:?} for {filler:?}"
            );
        }
    }

    #[test]
    fn test_replace_filler_words_leaves_other_text() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(replace_filler_words("Hmm, maybe.", &mut rng), "Hmm, maybe.");
    }
}
