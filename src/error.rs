//! Error Types
//!
//! The only recoverable half of the engine's error taxonomy: out-of-range
//! indices on parameter get/set, and a too-small dump buffer. Malformed
//! SysEx and unrecognized control bytes are not errors — they are silently
//! skipped per the control API's contract — so no variant exists for them.

use core::fmt;

/// Recoverable errors surfaced by the engine's parameter and dump surface.
///
/// `pull` and `feed` never fail: both absorb malformed input per spec and
/// return their telemetry/byte-count directly rather than a `Result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A tone index was outside `0..MAXTONE`.
    ToneIndexOutOfRange(usize),
    /// An envelope slot index was outside `0..MAXENV`.
    EnvIndexOutOfRange(usize),
    /// An LFO index was outside `0..MAXLFO`.
    LfoIndexOutOfRange(usize),
    /// A channel index was outside `0..MAXCHANNEL`.
    ChannelIndexOutOfRange(usize),
    /// A MIDI pitch was outside `0..128`.
    PitchOutOfRange(u8),
    /// A patch index was outside `0..MAXPATCH`.
    PatchIndexOutOfRange(usize),
    /// The caller-supplied dump buffer was too small to hold even the
    /// empty `0xF0`/manufacturer-ID/`0xF7` frame shell.
    DumpBufferTooSmall,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ToneIndexOutOfRange(i) => write!(f, "tone index {i} out of range"),
            Error::EnvIndexOutOfRange(i) => write!(f, "envelope index {i} out of range"),
            Error::LfoIndexOutOfRange(i) => write!(f, "lfo index {i} out of range"),
            Error::ChannelIndexOutOfRange(i) => write!(f, "channel index {i} out of range"),
            Error::PitchOutOfRange(p) => write!(f, "pitch {p} out of range"),
            Error::PatchIndexOutOfRange(i) => write!(f, "patch index {i} out of range"),
            Error::DumpBufferTooSmall => write!(f, "dump buffer too small for frame shell"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Convenience alias for this crate's fallible parameter-surface operations.
pub type Result<T> = core::result::Result<T, Error>;
