//! Greedy grouping of turns into size-bounded chunks for multi-speaker
//! synthesis requests.

use crate::transcript::Utterance;

/// Upper bound on the text bytes sent in one multi-speaker request.
pub const DEFAULT_MAX_CHUNK_BYTES: usize = 4000;

/// Groups utterances in order so that each chunk's combined text length
/// stays within `max_bytes`.
///
/// A single utterance longer than `max_bytes` still gets a chunk of its own;
/// it is never split or dropped.
#[must_use]
pub fn chunk_utterances(utterances: &[Utterance], max_bytes: usize) -> Vec<Vec<Utterance>> {
    let mut chunks = Vec::new();
    let mut current: Vec<Utterance> = Vec::new();
    let mut current_bytes = 0;

    for utterance in utterances {
        let size = utterance.text.len();
        if !current.is_empty() && current_bytes + size > max_bytes {
            chunks.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
        current_bytes += size;
        current.push(utterance.clone());
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
