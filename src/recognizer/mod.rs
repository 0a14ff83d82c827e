//! Speech recognition adapter
//!
//! The pipeline talks to recognition through two seams: `SpeechEngine`, the
//! process-wide handle holding whatever is expensive to load (model weights,
//! shared read-only across sessions), and `SpeechDecoder`, the per-cycle
//! stateful decoder it mints. The Vosk implementation lives behind the
//! `vosk` feature; tests substitute their own.

#[cfg(feature = "vosk")]
mod vosk;

#[cfg(feature = "vosk")]
pub use self::vosk::VoskEngine;

use anyhow::Result;

/// What the decoder currently believes about the audio it has seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hypothesis {
    /// Interim guess, revised as more audio arrives. May be empty.
    Partial(String),
    /// Committed segment. Empty on silence-only stretches.
    Final(String),
}

/// One stateful decoder instance, owned by one pipeline cycle.
pub trait SpeechDecoder: Send {
    /// Feed one chunk of mono 16-bit little-endian PCM and get the decoder's
    /// current hypothesis back.
    fn accept_pcm(&mut self, pcm: &[u8]) -> Result<Hypothesis>;
}

/// Factory for per-cycle decoders around a shared immutable model.
pub trait SpeechEngine: Send + Sync {
    /// Engine name, used for logging and session record labels.
    fn name(&self) -> &str;

    /// Construct a fresh decoder for one pipeline cycle.
    fn new_decoder(&self) -> Result<Box<dyn SpeechDecoder>>;
}

/// Reassemble s16le samples from a byte stream whose read boundaries do not
/// necessarily align with sample boundaries. An odd trailing byte is carried
/// into the next call.
pub fn pcm_bytes_to_samples(carry: &mut Option<u8>, pcm: &[u8]) -> Vec<i16> {
    let mut joined;
    let data: &[u8] = match carry.take() {
        Some(byte) => {
            joined = Vec::with_capacity(pcm.len() + 1);
            joined.push(byte);
            joined.extend_from_slice(pcm);
            &joined
        }
        None => pcm,
    };

    let chunks = data.chunks_exact(2);
    *carry = chunks.remainder().first().copied();
    chunks
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
