//! # snthcore: Real-Time Polyphonic Subtractive Synthesizer Core
//!
//! `snthcore` is a sample-accurate, allocation-free-on-the-hot-path DSP
//! engine for a subtractive synthesizer: four detunable/FM-routable
//! oscillators per voice, a 4-pole Moog-ladder filter, three line-segment
//! envelopes and two LFOs per tone, a 256-voice FIFO polyphony ring, and a
//! SysEx-style binary codec for patch and full-bank serialization.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Control surface                        │  feed() / get·set parameters
//! │  - MIDI-like note-on/off + SysEx frames │
//! ├─────────────────────────────────────────┤
//! │  Patch store                            │  patch / channel / tone
//! │  - Derived per-tone participation flags │
//! ├─────────────────────────────────────────┤
//! │  Polyphony ring                         │  256 FIFO note slots
//! │  - Each slot: 4 oscillators in a chain  │
//! ├─────────────────────────────────────────┤
//! │  Kernels                                │  envelope / lfo / filter /
//! │  - Pure per-block arithmetic            │  waveform / vector / phase
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency model
//!
//! Everything lives behind one [`Engine`], itself a thin wrapper around a
//! single [`lock::Lock`] guarding the patch store, note ring, and scratch
//! buffers. Every public method acquires that lock for its own duration;
//! there is no finer-grained locking inside. Under the `std` feature
//! (default) the lock is a real `std::sync::Mutex`; without it a spinlock
//! with the same acquire/release discipline stands in.
//!
//! ## Quick start
//!
//! ```
//! use snthcore::Engine;
//!
//! let engine = Engine::new(44_100);
//! engine.note_on(0, 69, 127).unwrap();
//!
//! let mut pcm = [0u8; 512 * 4];
//! let peak_voices = engine.pull(&mut pcm, 512);
//! assert!(peak_voices >= 1);
//! ```
//!
//! ## Module documentation
//!
//! - [`patch`] - Parameter tree: tones, envelopes, LFOs, channels
//! - [`note`] - Oscillator and note voice rendering
//! - [`polyphony`] - FIFO voice ring
//! - [`control`] - MIDI-like byte-stream decoder
//! - [`sysex`] - Patch/bank binary codec
//! - [`envelope`], [`lfo`], [`filter`], [`waveform`] - Per-sample kernels
//! - [`vector`], [`phase`], [`tables`], [`units`] - Shared block-math primitives
//! - [`lock`] - The engine-wide mutual exclusion primitive
//! - [`error`] - The recoverable error taxonomy

pub mod control;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod lfo;
pub mod lock;
pub mod note;
pub mod patch;
pub mod phase;
pub mod polyphony;
pub mod sysex;
pub mod tables;
pub mod units;
pub mod vector;
pub mod waveform;

/// Convenient re-exports for the common case of driving one [`Engine`].
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::filter::FilterMode;
    pub use crate::patch::Mode;
    pub use crate::waveform::Wave;
    pub use crate::Engine;
}

use crate::envelope::Envelope;
use crate::error::{Error, Result};
use crate::filter::FilterMode;
use crate::lfo::Lfo;
use crate::lock::Lock;
use crate::note::Scratch;
use crate::patch::{
    Channel, Mode, Patch, Tone, MAXCHANNEL, MAXENV, MAXFRAME, MAXLFO, MAXPATCH, MAXSTR, MAXTONE,
};
use crate::polyphony::NoteRing;
use crate::tables::{FreqTable, SineTable};
use crate::waveform::{NoiseGen, Wave};

/// Everything mutated under the engine's single lock: the patch/channel
/// store, the note ring, and the scratch buffers a pull renders into.
/// `patches` is boxed because `MAXPATCH` fully-populated patches are too
/// large to comfortably construct on the stack of a real-time thread.
struct EngineState {
    sample_rate: f64,
    /// Global sample counter, advanced by every `pull`. Seeds free-running
    /// LFO phase at note-on and anchors per-tone delay gating.
    now: f64,
    curr_channel: usize,
    patches: std::boxed::Box<[Patch; MAXPATCH]>,
    channels: [Channel; MAXCHANNEL],
    ring: NoteRing,
    scratch: Scratch,
    rng: NoiseGen,
    freq_table: FreqTable,
    /// Precomputed per §4.13's initialization step alongside `freq_table`.
    /// Rendering uses the direct Taylor-series sine (`waveform::eval`), not
    /// this table, so it is built at init but never looked up on the hot
    /// path; kept as engine state rather than a free-standing unused type so
    /// `cargo build` doesn't warn about dead code.
    #[allow(dead_code)]
    sine_table: SineTable,
}

impl EngineState {
    fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            now: 0.0,
            curr_channel: 0,
            patches: std::boxed::Box::new(core::array::from_fn(|_| Patch::new_default())),
            channels: core::array::from_fn(|i| Channel::new_default(i as u8)),
            ring: NoteRing::new(),
            scratch: Scratch::new(),
            rng: NoiseGen::new(),
            freq_table: FreqTable::new(),
            sine_table: SineTable::new(),
        }
    }

    fn curr_patch_index(&self) -> usize {
        self.channels[self.curr_channel].patch as usize
    }
}

/// The synthesizer engine. Owns the entire patch store, note ring, and
/// per-block scratch space behind one lock (see [`lock::Lock`]); every
/// public method acquires it for the duration of the call, matching the
/// single-mutex-for-the-duration-of-any-call model the rest of this crate
/// is built around.
///
/// There is exactly one configuration input: the sample rate fixed at
/// construction. Nothing else about an `Engine` is configurable from the
/// outside except through the parameter get/set surface below.
pub struct Engine {
    inner: Lock<EngineState>,
}

impl Engine {
    /// Build a fresh engine at `sample_rate` Hz, with every patch at its
    /// default (tone 0 = MIX, all others OFF) and every channel pointed at
    /// the identically-numbered patch.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            inner: Lock::new(EngineState::new(sample_rate)),
        }
    }

    /// Render `frames` stereo frames (interleaved 16-bit little-endian
    /// samples, 4 bytes per frame) into `buffer`, internally chunked into
    /// sub-blocks of at most `MAXFRAME` samples. Returns the peak number of
    /// oscillators active in any one sub-block, for telemetry. Never fails:
    /// an undersized `buffer` simply receives as many whole frames as fit.
    pub fn pull(&self, buffer: &mut [u8], frames: usize) -> usize {
        self.inner.with(|state| {
            let mut peak = 0usize;
            let mut produced = 0usize;
            while produced < frames {
                let chunk = (frames - produced).min(MAXFRAME);
                let mut out_l = [0.0f64; MAXFRAME];
                let mut out_r = [0.0f64; MAXFRAME];

                let EngineState {
                    sample_rate,
                    now,
                    patches,
                    channels,
                    ring,
                    scratch,
                    rng,
                    freq_table,
                    ..
                } = state;

                let active = ring.render_block(
                    *now,
                    chunk,
                    *sample_rate,
                    freq_table,
                    rng,
                    scratch,
                    &mut out_l[..chunk],
                    &mut out_r[..chunk],
                    |ch| patches[channels[ch as usize].patch as usize].tone,
                );
                peak = peak.max(active);

                for i in 0..chunk {
                    let l = (out_l[i].max(-1.0).min(1.0) * 32767.0).round() as i16;
                    let r = (out_r[i].max(-1.0).min(1.0) * 32767.0).round() as i16;
                    let offset = (produced + i) * 4;
                    if offset + 4 <= buffer.len() {
                        buffer[offset..offset + 2].copy_from_slice(&l.to_le_bytes());
                        buffer[offset + 2..offset + 4].copy_from_slice(&r.to_le_bytes());
                    }
                }

                *now += chunk as f64;
                produced += chunk;
            }
            peak
        })
    }

    /// Decode `bytes` as a MIDI-like control stream (see [`control::feed`]).
    /// Always consumes and returns `bytes.len()`.
    pub fn feed(&self, bytes: &[u8]) -> usize {
        self.inner.with(|state| {
            let patch_index = state.curr_patch_index();
            let now = state.now;
            let sample_rate = state.sample_rate;
            control::feed(
                bytes,
                &mut state.patches,
                &mut state.channels,
                &mut state.ring,
                patch_index,
                now,
                sample_rate,
            )
        })
    }

    /// Trigger a note directly, bypassing the byte-stream decoder.
    pub fn note_on(&self, channel: u8, pitch: u8, velocity: u8) -> Result<()> {
        check_channel(channel)?;
        check_pitch(pitch)?;
        self.inner.with(|state| {
            let patch_index = state.channels[channel as usize].patch as usize;
            let now = state.now;
            let sample_rate = state.sample_rate;
            let EngineState {
                patches,
                channels,
                ring,
                ..
            } = state;
            ring.note_on(
                &mut channels[channel as usize],
                &patches[patch_index],
                pitch,
                velocity,
                channel,
                now,
                sample_rate,
            );
        });
        Ok(())
    }

    /// Release a note directly, bypassing the byte-stream decoder. A
    /// release against an already-silent pitch is a no-op.
    pub fn note_off(&self, channel: u8, pitch: u8) -> Result<()> {
        check_channel(channel)?;
        check_pitch(pitch)?;
        self.inner.with(|state| {
            state.ring.note_off(&mut state.channels[channel as usize], pitch);
        });
        Ok(())
    }

    /// Encode the currently-selected channel's patch as a SysEx frame.
    pub fn dump_patch(&self, buf: &mut [u8]) -> Result<usize> {
        self.inner.with(|state| {
            let index = state.curr_patch_index();
            sysex::encode_patch(&state.patches[index], buf)
        })
    }

    /// Encode every non-default patch in the bank as a single SysEx frame
    /// with `0x02` patch-select cursor tags.
    pub fn dump_state(&self, buf: &mut [u8]) -> Result<usize> {
        self.inner.with(|state| sysex::encode_state(&state.patches, buf))
    }

    // -- Channel / patch / bank selection -----------------------------

    /// Select the channel subsequent per-tone/per-envelope/per-LFO getters
    /// and setters address.
    pub fn set_channel(&self, channel: u8) -> Result<()> {
        check_channel(channel)?;
        self.inner.with(|s| s.curr_channel = channel as usize);
        Ok(())
    }

    pub fn get_channel(&self) -> u8 {
        self.inner.with(|s| s.curr_channel as u8)
    }

    /// Point the currently selected channel at a different patch slot.
    pub fn set_patch(&self, patch: u8) -> Result<()> {
        if patch as usize >= MAXPATCH {
            return Err(Error::PatchIndexOutOfRange(patch as usize));
        }
        self.inner.with(|s| {
            let c = s.curr_channel;
            s.channels[c].patch = patch;
        });
        Ok(())
    }

    pub fn get_patch(&self) -> u8 {
        self.inner.with(|s| s.channels[s.curr_channel].patch)
    }

    /// Bank selection is a reserved no-op: this engine carries a single
    /// flat bank of `MAXPATCH` patches and has nowhere to route a bank
    /// index. Matches the original control surface, whose bank field was
    /// never backed by storage either.
    pub fn set_bank(&self, _bank: u8) {}

    /// Always `0`; see [`Engine::set_bank`].
    pub fn get_bank(&self) -> u8 {
        0
    }

    // -- Channel-level sends (stored, never rendered; see DESIGN.md) ---

    pub fn set_channel_level(&self, v: u8) {
        self.inner.with(|s| {
            let c = s.curr_channel;
            s.channels[c].level = v;
        });
    }

    pub fn get_channel_level(&self) -> u8 {
        self.inner.with(|s| s.channels[s.curr_channel].level)
    }

    pub fn set_channel_pan(&self, v: u8) {
        self.inner.with(|s| {
            let c = s.curr_channel;
            s.channels[c].pan = v;
        });
    }

    pub fn get_channel_pan(&self) -> u8 {
        self.inner.with(|s| s.channels[s.curr_channel].pan)
    }

    pub fn set_channel_reverb(&self, v: u8) {
        self.inner.with(|s| {
            let c = s.curr_channel;
            s.channels[c].reverb = v;
        });
    }

    pub fn get_channel_reverb(&self) -> u8 {
        self.inner.with(|s| s.channels[s.curr_channel].reverb)
    }

    pub fn set_channel_chorus(&self, v: u8) {
        self.inner.with(|s| {
            let c = s.curr_channel;
            s.channels[c].chorus = v;
        });
    }

    pub fn get_channel_chorus(&self) -> u8 {
        self.inner.with(|s| s.channels[s.curr_channel].chorus)
    }

    // -- Patch name ------------------------------------------------------

    /// Set the currently-addressed patch's name, truncated to `MAXSTR`
    /// bytes if longer.
    pub fn set_patch_name(&self, name: &str) {
        self.inner.with(|s| {
            let index = s.curr_patch_index();
            let truncated: std::string::String = name.chars().take(MAXSTR).collect();
            s.patches[index].name = truncated;
        });
    }

    pub fn get_patch_name(&self) -> std::string::String {
        self.inner.with(|s| {
            let index = s.curr_patch_index();
            s.patches[index].name.clone()
        })
    }

    // -- Tone-level parameters -------------------------------------------

    fn with_tone<R>(&self, tone: usize, f: impl FnOnce(&mut Tone) -> R) -> Result<R> {
        if tone >= MAXTONE {
            return Err(Error::ToneIndexOutOfRange(tone));
        }
        Ok(self.inner.with(|s| {
            let index = s.curr_patch_index();
            let r = f(&mut s.patches[index].tone[tone]);
            s.patches[index].refresh_all_flags();
            r
        }))
    }

    pub fn set_tone_wave(&self, tone: usize, v: u8) -> Result<()> {
        self.with_tone(tone, |t| t.wave = Wave::from_u8(v))
    }

    pub fn get_tone_wave(&self, tone: usize) -> Result<u8> {
        self.with_tone(tone, |t| t.wave as u8)
    }

    pub fn set_tone_mode(&self, tone: usize, v: u8) -> Result<()> {
        self.with_tone(tone, |t| t.mode = Mode::from_u8(v))
    }

    pub fn get_tone_mode(&self, tone: usize) -> Result<u8> {
        self.with_tone(tone, |t| t.mode as u8)
    }

    pub fn set_tone_filter_mode(&self, tone: usize, v: u8) -> Result<()> {
        self.with_tone(tone, |t| t.filter_mode = FilterMode::from_u8(v))
    }

    pub fn get_tone_filter_mode(&self, tone: usize) -> Result<u8> {
        self.with_tone(tone, |t| t.filter_mode as u8)
    }

    // -- Envelope parameters ----------------------------------------------

    fn with_env<R>(&self, tone: usize, env: usize, f: impl FnOnce(&mut Envelope) -> R) -> Result<R> {
        if tone >= MAXTONE {
            return Err(Error::ToneIndexOutOfRange(tone));
        }
        if env >= MAXENV {
            return Err(Error::EnvIndexOutOfRange(env));
        }
        Ok(self.inner.with(|s| {
            let index = s.curr_patch_index();
            let sample_rate = s.sample_rate;
            let r = f(&mut s.patches[index].tone[tone].env[env]);
            s.patches[index].tone[tone].env[env].refresh_cache(sample_rate);
            s.patches[index].refresh_all_flags();
            r
        }))
    }

    // -- LFO parameters -----------------------------------------------------

    fn with_lfo<R>(&self, tone: usize, lfo: usize, f: impl FnOnce(&mut Lfo) -> R) -> Result<R> {
        if tone >= MAXTONE {
            return Err(Error::ToneIndexOutOfRange(tone));
        }
        if lfo >= MAXLFO {
            return Err(Error::LfoIndexOutOfRange(lfo));
        }
        Ok(self.inner.with(|s| {
            let index = s.curr_patch_index();
            let sample_rate = s.sample_rate;
            let r = f(&mut s.patches[index].tone[tone].lfo[lfo]);
            s.patches[index].tone[tone].lfo[lfo].refresh_cache(sample_rate);
            s.patches[index].refresh_all_flags();
            r
        }))
    }

    pub fn set_tone_lfo_wave(&self, tone: usize, lfo: usize, v: u8) -> Result<()> {
        self.with_lfo(tone, lfo, |l| l.wave = Wave::from_u8(v))
    }

    pub fn get_tone_lfo_wave(&self, tone: usize, lfo: usize) -> Result<u8> {
        self.with_lfo(tone, lfo, |l| l.wave as u8)
    }

    pub fn set_tone_lfo_sync(&self, tone: usize, lfo: usize, v: bool) -> Result<()> {
        self.with_lfo(tone, lfo, |l| l.sync = v)
    }

    pub fn get_tone_lfo_sync(&self, tone: usize, lfo: usize) -> Result<bool> {
        self.with_lfo(tone, lfo, |l| l.sync)
    }
}

/// Generates a bounds-checked `set_tone_<field>`/`get_tone_<field>` pair for
/// a plain `u8` field of [`Tone`].
macro_rules! tone_u8_field {
    ($set_name:ident, $get_name:ident, $field:ident) => {
        impl Engine {
            pub fn $set_name(&self, tone: usize, v: u8) -> Result<()> {
                self.with_tone(tone, |t| t.$field = v)
            }

            pub fn $get_name(&self, tone: usize) -> Result<u8> {
                self.with_tone(tone, |t| t.$field)
            }
        }
    };
}

tone_u8_field!(set_tone_level, get_tone_level, level);
tone_u8_field!(set_tone_pan, get_tone_pan, pan);
tone_u8_field!(set_tone_delay, get_tone_delay, delay);
tone_u8_field!(set_tone_pitch_coarse, get_tone_pitch_coarse, pitch_coarse);
tone_u8_field!(set_tone_pitch_fine, get_tone_pitch_fine, pitch_fine);
tone_u8_field!(set_tone_pitch_env, get_tone_pitch_env, pitch_env);
tone_u8_field!(set_tone_filter_cut, get_tone_filter_cut, filter_cut);
tone_u8_field!(set_tone_filter_res, get_tone_filter_res, filter_res);
tone_u8_field!(set_tone_filter_env, get_tone_filter_env, filter_env);
tone_u8_field!(set_tone_filter_key, get_tone_filter_key, filter_key);

/// Generates a bounds-checked `set_tone_env_<field>`/`get_tone_env_<field>`
/// pair for a plain `u8` field of [`Envelope`].
macro_rules! env_u8_field {
    ($set_name:ident, $get_name:ident, $field:ident) => {
        impl Engine {
            pub fn $set_name(&self, tone: usize, env: usize, v: u8) -> Result<()> {
                self.with_env(tone, env, |e| e.$field = v)
            }

            pub fn $get_name(&self, tone: usize, env: usize) -> Result<u8> {
                self.with_env(tone, env, |e| e.$field)
            }
        }
    };
}

env_u8_field!(set_tone_env_a, get_tone_env_a, a);
env_u8_field!(set_tone_env_d, get_tone_env_d, d);
env_u8_field!(set_tone_env_s, get_tone_env_s, s);
env_u8_field!(set_tone_env_r, get_tone_env_r, r);

/// Generates a bounds-checked `set_tone_lfo_<field>`/`get_tone_lfo_<field>`
/// pair for a plain `u8` field of [`Lfo`].
macro_rules! lfo_u8_field {
    ($set_name:ident, $get_name:ident, $field:ident) => {
        impl Engine {
            pub fn $set_name(&self, tone: usize, lfo: usize, v: u8) -> Result<()> {
                self.with_lfo(tone, lfo, |l| l.$field = v)
            }

            pub fn $get_name(&self, tone: usize, lfo: usize) -> Result<u8> {
                self.with_lfo(tone, lfo, |l| l.$field)
            }
        }
    };
}

lfo_u8_field!(set_tone_lfo_rate, get_tone_lfo_rate, rate);
lfo_u8_field!(set_tone_lfo_delay, get_tone_lfo_delay, delay);
lfo_u8_field!(set_tone_lfo_level, get_tone_lfo_level, level);
lfo_u8_field!(set_tone_lfo_pan, get_tone_lfo_pan, pan);
lfo_u8_field!(set_tone_lfo_pitch, get_tone_lfo_pitch, pitch);
lfo_u8_field!(set_tone_lfo_phase, get_tone_lfo_phase, phase);
lfo_u8_field!(set_tone_lfo_filter, get_tone_lfo_filter, filter);

fn check_channel(channel: u8) -> Result<()> {
    if channel as usize >= MAXCHANNEL {
        Err(Error::ChannelIndexOutOfRange(channel as usize))
    } else {
        Ok(())
    }
}

fn check_pitch(pitch: u8) -> Result<()> {
    if pitch >= 128 {
        Err(Error::PitchOutOfRange(pitch))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 44_100;

    #[test]
    fn silence_without_any_note_on_is_all_zero() {
        let engine = Engine::new(RATE);
        let mut pcm = [0xAAu8; 512 * 4];
        let peak = engine.pull(&mut pcm, 512);
        assert_eq!(peak, 0);
        assert!(pcm.iter().all(|&b| b == 0));
    }

    #[test]
    fn pure_sine_note_produces_bounded_nonzero_output() {
        let engine = Engine::new(RATE);
        engine.set_tone_mode(0, Mode::Mix as u8).unwrap();
        engine.set_tone_wave(0, Wave::Sine as u8).unwrap();
        engine.set_tone_level(0, 127).unwrap();
        engine.set_tone_env_a(0, 0, 0).unwrap();
        engine.set_tone_env_d(0, 0, 0).unwrap();
        engine.set_tone_env_s(0, 0, 127).unwrap();
        engine.set_tone_env_r(0, 0, 0).unwrap();

        engine.note_on(0, 69, 127).unwrap();

        let mut pcm = [0u8; 4096 * 4];
        let peak = engine.pull(&mut pcm, 4096);
        assert!(peak >= 1);

        let samples_nonzero = pcm.chunks(2).any(|c| c != [0, 0]);
        assert!(samples_nonzero);
    }

    #[test]
    fn note_off_release_drives_envelope_to_silence() {
        let engine = Engine::new(RATE);
        engine.set_tone_mode(0, Mode::Mix as u8).unwrap();
        engine.set_tone_level(0, 127).unwrap();
        engine.set_tone_env_a(0, 0, 0).unwrap();
        engine.set_tone_env_d(0, 0, 0).unwrap();
        engine.set_tone_env_s(0, 0, 127).unwrap();
        engine.set_tone_env_r(0, 0, 20).unwrap();

        engine.note_on(0, 69, 127).unwrap();
        let mut pcm = [0u8; 512 * 4];
        engine.pull(&mut pcm, 512);
        engine.note_off(0, 69).unwrap();

        let mut silenced = false;
        for _ in 0..4000 {
            let mut block = [0u8; 512 * 4];
            let peak = engine.pull(&mut block, 512);
            if peak == 0 {
                silenced = true;
                break;
            }
        }
        assert!(silenced, "note should retire to silence after release");
    }

    #[test]
    fn sysex_round_trip_preserves_name_mode_and_lfo_rate() {
        let engine = Engine::new(RATE);
        engine.set_patch_name("TEST");
        engine.set_tone_mode(0, Mode::Mix as u8).unwrap();
        engine.set_tone_lfo_rate(0, 0, 80).unwrap();

        let mut buf = [0u8; 4096];
        let n = engine.dump_state(&mut buf).unwrap();

        let fresh = Engine::new(RATE);
        fresh.feed(&buf[..n]);

        assert_eq!(fresh.get_patch_name(), "TEST");
        assert_eq!(fresh.get_tone_mode(0).unwrap(), Mode::Mix as u8);
        assert_eq!(fresh.get_tone_lfo_rate(0, 0).unwrap(), 80);
    }

    #[test]
    fn fm_routing_sets_pitch_flag_on_the_sink_tone() {
        let engine = Engine::new(RATE);
        engine.set_tone_mode(0, Mode::Mod as u8).unwrap();
        engine.set_tone_mode(1, Mode::Mix as u8).unwrap();
        engine.note_on(0, 69, 127).unwrap();

        let tone1_flags = engine.inner.with(|s| {
            let idx = s.curr_patch_index();
            s.patches[idx].tone[1].flags
        });
        assert!(tone1_flags & crate::patch::flags::PITCH != 0);
    }

    #[test]
    fn polyphony_limit_overwrites_the_oldest_slot() {
        let engine = Engine::new(RATE);
        engine.set_tone_mode(0, Mode::Mix as u8).unwrap();
        engine.set_tone_env_r(0, 0, 0).unwrap();

        for i in 0..(crate::patch::MAXNOTE + 1) {
            engine.note_on(0, (i % 100) as u8, 100).unwrap();
        }

        let wrapped_to_zero = engine.inner.with(|s| s.ring.curr_note());
        assert_eq!(wrapped_to_zero, 1);
    }

    #[test]
    fn mix_ignores_pan() {
        let hard_left = Engine::new(RATE);
        hard_left.set_tone_mode(0, Mode::Mix as u8).unwrap();
        hard_left.set_tone_level(0, 127).unwrap();
        hard_left.set_tone_pan(0, 0).unwrap();
        hard_left.set_tone_env_a(0, 0, 0).unwrap();
        hard_left.set_tone_env_d(0, 0, 0).unwrap();
        hard_left.set_tone_env_s(0, 0, 127).unwrap();
        hard_left.set_tone_env_r(0, 0, 0).unwrap();
        hard_left.note_on(0, 69, 127).unwrap();

        let hard_right = Engine::new(RATE);
        hard_right.set_tone_mode(0, Mode::Mix as u8).unwrap();
        hard_right.set_tone_level(0, 127).unwrap();
        hard_right.set_tone_pan(0, 127).unwrap();
        hard_right.set_tone_env_a(0, 0, 0).unwrap();
        hard_right.set_tone_env_d(0, 0, 0).unwrap();
        hard_right.set_tone_env_s(0, 0, 127).unwrap();
        hard_right.set_tone_env_r(0, 0, 0).unwrap();
        hard_right.note_on(0, 69, 127).unwrap();

        let mut left_pcm = [0u8; 256 * 4];
        let mut right_pcm = [0u8; 256 * 4];
        hard_left.pull(&mut left_pcm, 256);
        hard_right.pull(&mut right_pcm, 256);

        // pan is stored and settable but never read while rendering, so a
        // hard-left and a hard-right pan setting produce identical output.
        assert_eq!(left_pcm, right_pcm);

        // channel-level pan is likewise reserved: setting it changes nothing
        // observable since render never reads the Channel beyond its note
        // table.
        hard_left.set_channel_pan(0);
        let mut after_pan_change = [0u8; 256 * 4];
        let replay = Engine::new(RATE);
        replay.set_tone_mode(0, Mode::Mix as u8).unwrap();
        replay.set_tone_level(0, 127).unwrap();
        replay.set_tone_pan(0, 0).unwrap();
        replay.set_tone_env_a(0, 0, 0).unwrap();
        replay.set_tone_env_d(0, 0, 0).unwrap();
        replay.set_tone_env_s(0, 0, 127).unwrap();
        replay.set_tone_env_r(0, 0, 0).unwrap();
        replay.note_on(0, 69, 127).unwrap();
        replay.pull(&mut after_pan_change, 256);
        assert_eq!(left_pcm, after_pan_change);
    }
}
