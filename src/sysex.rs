//! SysEx Codec
//!
//! Encodes a patch/patch-bank as a compact stream of `(tag, value)` pairs
//! framed by `0xF0`/manufacturer-ID (`0x7D`)/`0xF7`, emitting only
//! parameters that differ from their defaults. Decoding dispatches each tag
//! through the same setters the live parameter surface uses, so caches
//! refresh exactly as they would for a direct control-thread write.

use crate::envelope::Envelope;
use crate::lfo::Lfo;
use crate::patch::{defaults, Mode, Patch, Tone, MAXENV, MAXLFO, MAXPATCH, MAXSTR, MAXTONE};
use crate::waveform::Wave;

pub const SYSEX_START: u8 = 0xF0;
pub const MANUFACTURER_ID: u8 = 0x7D;
pub const SYSEX_END: u8 = 0xF7;

mod tag {
    pub const GLOBAL_BASE: u8 = 0x00;
    pub const GLOBAL_MASK: u8 = 0x0F;
    pub const SEL_CHANNEL: u8 = 0;
    pub const SEL_BANK: u8 = 1;
    pub const SEL_PATCH: u8 = 2;

    pub const PATCH_BASE: u8 = 0x30;
    pub const PATCH_NAME: u8 = 0x30;

    pub const ENV_BASE: u8 = 0x40;
    pub const ENV_END: u8 = 0x7F;

    pub const LFO_BASE: u8 = 0x80;
    pub const LFO_END: u8 = 0xBF;

    pub const TONE_BASE: u8 = 0xC0;
}

/// Tone-field indices packed into the low 4 bits of a `0xC0..0xFF` tag.
mod tone_field {
    pub const WAVE: u8 = 0;
    pub const MODE: u8 = 1;
    pub const LEVEL: u8 = 2;
    pub const PAN: u8 = 3;
    pub const DELAY: u8 = 4;
    pub const PITCH_COARSE: u8 = 5;
    pub const PITCH_FINE: u8 = 6;
    pub const PITCH_ENV: u8 = 7;
    pub const FILTER_MODE: u8 = 8;
    pub const FILTER_CUT: u8 = 9;
    pub const FILTER_RES: u8 = 10;
    pub const FILTER_KEY: u8 = 11;
}

/// LFO-field indices packed into the low 3 bits of a `0x80..0xBF` tag.
mod lfo_field {
    pub const WAVE_SYNC: u8 = 0;
    pub const RATE: u8 = 1;
    pub const DELAY: u8 = 2;
    pub const LEVEL: u8 = 3;
    pub const PAN: u8 = 4;
    pub const PITCH: u8 = 5;
    pub const PHASE: u8 = 6;
    pub const FILTER: u8 = 7;
}

/// Envelope-field indices packed into the low 2 bits of a `0x40..0x7F` tag.
mod env_field {
    pub const A: u8 = 0;
    pub const D: u8 = 1;
    pub const S: u8 = 2;
    pub const R: u8 = 3;
}

fn tone_default_mode(index: usize) -> Mode {
    if index == 0 {
        defaults::TONE_MODE_INIT_TONE0
    } else {
        defaults::TONE_MODE
    }
}

/// Append-only writer over a caller-supplied buffer. A `(tag, value)` pair
/// that does not fully fit is dropped silently, matching the encoder's
/// "best-effort, truncate on overflow" contract; subsequent pairs are still
/// attempted.
struct Writer<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    fn push(&mut self, b: u8) -> bool {
        if self.len < self.buf.len() {
            self.buf[self.len] = b;
            self.len += 1;
            true
        } else {
            false
        }
    }

    fn push_pair(&mut self, tag: u8, value: u8) {
        if self.len + 2 <= self.buf.len() {
            self.push(tag);
            self.push(value);
        }
    }

    fn push_string_field(&mut self, tag: u8, s: &str) {
        let bytes = s.as_bytes();
        let needed = 1 + bytes.len().min(MAXSTR) + 1;
        if self.len + needed <= self.buf.len() {
            self.push(tag);
            for &b in bytes.iter().take(MAXSTR) {
                self.push(b);
            }
            self.push(0);
        }
    }
}

fn encode_tone(w: &mut Writer, tone: &Tone, idx: usize) {
    use defaults::*;
    let base = tag::TONE_BASE | ((idx as u8) << 4);

    if tone.wave as u8 != TONE_WAVE as u8 {
        w.push_pair(base | tone_field::WAVE, tone.wave as u8);
    }
    if tone.mode != tone_default_mode(idx) {
        w.push_pair(base | tone_field::MODE, tone.mode as u8);
    }
    if tone.level != TONE_LEVEL {
        w.push_pair(base | tone_field::LEVEL, tone.level);
    }
    if tone.pan != TONE_PAN {
        w.push_pair(base | tone_field::PAN, tone.pan);
    }
    if tone.delay != TONE_DELAY {
        w.push_pair(base | tone_field::DELAY, tone.delay);
    }
    if tone.pitch_coarse != TONE_PITCH_COARSE {
        w.push_pair(base | tone_field::PITCH_COARSE, tone.pitch_coarse);
    }
    if tone.pitch_fine != TONE_PITCH_FINE {
        w.push_pair(base | tone_field::PITCH_FINE, tone.pitch_fine);
    }
    if tone.pitch_env != TONE_PITCH_ENV {
        w.push_pair(base | tone_field::PITCH_ENV, tone.pitch_env);
    }
    if tone.filter_mode as u8 != TONE_FILTER_MODE as u8 {
        w.push_pair(base | tone_field::FILTER_MODE, tone.filter_mode as u8);
    }
    if tone.filter_cut != TONE_FILTER_CUT {
        w.push_pair(base | tone_field::FILTER_CUT, tone.filter_cut);
    }
    if tone.filter_res != TONE_FILTER_RES {
        w.push_pair(base | tone_field::FILTER_RES, tone.filter_res);
    }
    if tone.filter_key != TONE_FILTER_KEY {
        w.push_pair(base | tone_field::FILTER_KEY, tone.filter_key);
    }

    for (ei, env) in tone.env.iter().enumerate() {
        encode_env(w, env, idx, ei);
    }
    for (li, lfo) in tone.lfo.iter().enumerate() {
        encode_lfo(w, lfo, idx, li);
    }
}

fn encode_env(w: &mut Writer, env: &Envelope, tone_idx: usize, env_idx: usize) {
    use defaults::*;
    let base = tag::ENV_BASE | ((tone_idx as u8) << 4) | ((env_idx as u8) << 2);
    if env.a != ENV_A {
        w.push_pair(base | env_field::A, env.a);
    }
    if env.d != ENV_D {
        w.push_pair(base | env_field::D, env.d);
    }
    if env.s != ENV_S {
        w.push_pair(base | env_field::S, env.s);
    }
    if env.r != ENV_R {
        w.push_pair(base | env_field::R, env.r);
    }
}

fn encode_lfo(w: &mut Writer, lfo: &Lfo, tone_idx: usize, lfo_idx: usize) {
    use defaults::*;
    let base = tag::LFO_BASE | ((tone_idx as u8) << 4) | ((lfo_idx as u8) << 3);
    if lfo.wave as u8 != LFO_WAVE as u8 || lfo.sync != LFO_SYNC {
        let packed = (lfo.wave as u8 & 0x0F) | ((lfo.sync as u8) << 4);
        w.push_pair(base | lfo_field::WAVE_SYNC, packed);
    }
    if lfo.rate != LFO_RATE {
        w.push_pair(base | lfo_field::RATE, lfo.rate);
    }
    if lfo.delay != LFO_DELAY {
        w.push_pair(base | lfo_field::DELAY, lfo.delay);
    }
    if lfo.level != LFO_LEVEL {
        w.push_pair(base | lfo_field::LEVEL, lfo.level);
    }
    if lfo.pan != LFO_PAN {
        w.push_pair(base | lfo_field::PAN, lfo.pan);
    }
    if lfo.pitch != LFO_PITCH {
        w.push_pair(base | lfo_field::PITCH, lfo.pitch);
    }
    if lfo.phase != LFO_PHASE {
        w.push_pair(base | lfo_field::PHASE, lfo.phase);
    }
    if lfo.filter != LFO_FILTER {
        w.push_pair(base | lfo_field::FILTER, lfo.filter);
    }
}

fn envelope_is_default(e: &Envelope) -> bool {
    e.a == defaults::ENV_A && e.d == defaults::ENV_D && e.s == defaults::ENV_S && e.r == defaults::ENV_R
}

fn lfo_is_default(l: &Lfo) -> bool {
    l.wave as u8 == defaults::LFO_WAVE as u8
        && l.sync == defaults::LFO_SYNC
        && l.rate == defaults::LFO_RATE
        && l.delay == defaults::LFO_DELAY
        && l.level == defaults::LFO_LEVEL
        && l.pan == defaults::LFO_PAN
        && l.pitch == defaults::LFO_PITCH
        && l.phase == defaults::LFO_PHASE
        && l.filter == defaults::LFO_FILTER
}

fn tone_is_default(t: &Tone, idx: usize) -> bool {
    use defaults::*;
    t.wave as u8 == TONE_WAVE as u8
        && t.mode == tone_default_mode(idx)
        && t.level == TONE_LEVEL
        && t.pan == TONE_PAN
        && t.delay == TONE_DELAY
        && t.pitch_coarse == TONE_PITCH_COARSE
        && t.pitch_fine == TONE_PITCH_FINE
        && t.pitch_env == TONE_PITCH_ENV
        && t.filter_mode as u8 == TONE_FILTER_MODE as u8
        && t.filter_cut == TONE_FILTER_CUT
        && t.filter_res == TONE_FILTER_RES
        && t.filter_key == TONE_FILTER_KEY
        && t.env.iter().all(envelope_is_default)
        && t.lfo.iter().all(lfo_is_default)
}

/// Whether every field of `patch` is at its default (the patch's own name
/// plus every tone's parameters).
pub fn patch_is_default(patch: &Patch) -> bool {
    patch.name == defaults::PATCH_NAME && patch.tone.iter().enumerate().all(|(i, t)| tone_is_default(t, i))
}

fn encode_patch_payload(w: &mut Writer, patch: &Patch) {
    if patch.name != defaults::PATCH_NAME {
        w.push_string_field(tag::PATCH_NAME, &patch.name);
    }
    for (i, tone) in patch.tone.iter().enumerate() {
        encode_tone(w, tone, i);
    }
}

/// Emit `patch`'s SysEx frame into `buf`. Always emits the framing bytes,
/// even for an all-default patch (an empty payload is valid). Returns the
/// number of bytes written, or `Err` if the buffer cannot hold even the
/// empty frame shell.
pub fn encode_patch(patch: &Patch, buf: &mut [u8]) -> crate::error::Result<usize> {
    if buf.len() < 3 {
        return Err(crate::error::Error::DumpBufferTooSmall);
    }
    let mut w = Writer::new(buf);
    w.push(SYSEX_START);
    w.push(MANUFACTURER_ID);
    encode_patch_payload(&mut w, patch);
    w.push(SYSEX_END);
    Ok(w.len)
}

/// Emit a single SysEx frame containing every non-default patch, each
/// preceded by a `0x02` patch-select tag. Emits nothing at all (not even
/// the frame shell) if every patch is at its default.
pub fn encode_state(patches: &[Patch; MAXPATCH], buf: &mut [u8]) -> crate::error::Result<usize> {
    if patches.iter().all(patch_is_default) {
        return Ok(0);
    }
    if buf.len() < 3 {
        return Err(crate::error::Error::DumpBufferTooSmall);
    }
    let mut w = Writer::new(buf);
    w.push(SYSEX_START);
    w.push(MANUFACTURER_ID);
    for (i, patch) in patches.iter().enumerate() {
        if patch_is_default(patch) {
            continue;
        }
        w.push_pair(tag::GLOBAL_BASE | tag::SEL_PATCH, i as u8);
        encode_patch_payload(&mut w, patch);
    }
    w.push(SYSEX_END);
    Ok(w.len)
}

/// Decode one SysEx frame's payload (the bytes strictly between `0xF0` and
/// `0xF7`, manufacturer byte included) against `patches`. `default_patch`
/// is the patch a bare (unselected) frame applies to; a `0x02` selector
/// tag inside the frame redirects subsequent tags to another patch index.
/// Frames whose manufacturer byte isn't `0x7D` are ignored entirely.
pub fn decode_frame(payload: &[u8], patches: &mut [Patch; MAXPATCH], default_patch: usize, sample_rate: f64) {
    if payload.is_empty() || payload[0] != MANUFACTURER_ID {
        return;
    }
    let body = &payload[1..];
    let mut cursor = default_patch.min(MAXPATCH - 1);
    let mut i = 0usize;

    while i < body.len() {
        let t = body[i];
        i += 1;

        if t < tag::PATCH_BASE {
            // Global, Channel (reserved), Effects (reserved): all carry a
            // single value byte.
            let Some(&value) = body.get(i) else { break };
            i += 1;
            if t & !tag::GLOBAL_MASK == tag::GLOBAL_BASE && (t & tag::GLOBAL_MASK) == tag::SEL_PATCH {
                cursor = (value as usize).min(MAXPATCH - 1);
            }
            // SEL_CHANNEL/SEL_BANK and the reserved Channel/Effects ranges
            // are accepted but have no live state to mutate.
            continue;
        }

        if (tag::PATCH_BASE..tag::ENV_BASE).contains(&t) {
            if t == tag::PATCH_NAME {
                let start = i;
                while i < body.len() && body[i] != 0 {
                    i += 1;
                }
                let s = core::str::from_utf8(&body[start..i.min(body.len())]).unwrap_or("");
                patches[cursor].name = s.chars().take(MAXSTR).collect();
                if i < body.len() {
                    i += 1; // consume the terminator
                }
            } else {
                // unknown Patch-range tag: skip its one value byte.
                i += 1;
            }
            continue;
        }

        if (tag::ENV_BASE..=tag::ENV_END).contains(&t) {
            let Some(&value) = body.get(i) else { break };
            i += 1;
            let tone_idx = ((t >> 4) & 0x3) as usize;
            let env_idx = ((t >> 2) & 0x3) as usize;
            let field = t & 0x3;
            if tone_idx < MAXTONE && env_idx < MAXENV {
                let env = &mut patches[cursor].tone[tone_idx].env[env_idx];
                match field {
                    env_field::A => env.a = value,
                    env_field::D => env.d = value,
                    env_field::S => env.s = value,
                    _ => env.r = value,
                }
                env.refresh_cache(sample_rate);
                patches[cursor].refresh_all_flags();
            }
            continue;
        }

        if (tag::LFO_BASE..=tag::LFO_END).contains(&t) {
            let Some(&value) = body.get(i) else { break };
            i += 1;
            let tone_idx = ((t >> 4) & 0x3) as usize;
            let lfo_idx = ((t >> 3) & 0x1) as usize;
            let field = t & 0x7;
            if tone_idx < MAXTONE && lfo_idx < MAXLFO {
                let lfo = &mut patches[cursor].tone[tone_idx].lfo[lfo_idx];
                match field {
                    lfo_field::WAVE_SYNC => {
                        lfo.wave = Wave::from_u8(value & 0x0F);
                        lfo.sync = value & 0x10 != 0;
                    }
                    lfo_field::RATE => lfo.rate = value,
                    lfo_field::DELAY => lfo.delay = value,
                    lfo_field::LEVEL => lfo.level = value,
                    lfo_field::PAN => lfo.pan = value,
                    lfo_field::PITCH => lfo.pitch = value,
                    lfo_field::PHASE => lfo.phase = value,
                    _ => lfo.filter = value,
                }
                lfo.refresh_cache(sample_rate);
                patches[cursor].refresh_all_flags();
            }
            continue;
        }

        // Tone range (0xC0..=0xFF).
        let Some(&value) = body.get(i) else { break };
        i += 1;
        let tone_idx = ((t >> 4) & 0x3) as usize;
        let field = t & 0xF;
        if tone_idx < MAXTONE {
            let tone = &mut patches[cursor].tone[tone_idx];
            match field {
                tone_field::WAVE => tone.wave = Wave::from_u8(value),
                tone_field::MODE => tone.mode = Mode::from_u8(value),
                tone_field::LEVEL => tone.level = value,
                tone_field::PAN => tone.pan = value,
                tone_field::DELAY => tone.delay = value,
                tone_field::PITCH_COARSE => tone.pitch_coarse = value,
                tone_field::PITCH_FINE => tone.pitch_fine = value,
                tone_field::PITCH_ENV => tone.pitch_env = value,
                tone_field::FILTER_MODE => tone.filter_mode = crate::filter::FilterMode::from_u8(value),
                tone_field::FILTER_CUT => tone.filter_cut = value,
                tone_field::FILTER_RES => tone.filter_res = value,
                _ => tone.filter_key = value,
            }
            patches[cursor].refresh_all_flags();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f64 = 44_100.0;

    #[test]
    fn all_default_patch_encodes_to_empty_payload_frame() {
        let patch = Patch::new_default();
        let mut buf = [0u8; 16];
        let n = encode_patch(&patch, &mut buf).unwrap();
        assert_eq!(&buf[..n], &[SYSEX_START, MANUFACTURER_ID, SYSEX_END]);
    }

    #[test]
    fn all_default_bank_encodes_to_nothing() {
        let patches: [Patch; MAXPATCH] = core::array::from_fn(|_| Patch::new_default());
        let mut buf = [0u8; 64];
        let n = encode_state(&patches, &mut buf).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn round_trip_name_mode_and_lfo_rate() {
        let mut patch = Patch::new_default();
        patch.name = "TEST".to_string();
        patch.tone[0].mode = Mode::Mix;
        patch.tone[0].lfo[0].rate = 80;
        patch.tone[0].lfo[0].refresh_cache(RATE);
        patch.refresh_all_flags();

        let mut buf = [0u8; 256];
        let n = encode_patch(&patch, &mut buf).unwrap();

        let mut decoded: [Patch; MAXPATCH] = core::array::from_fn(|_| Patch::new_default());
        decode_frame(&buf[1..n - 1], &mut decoded, 0, RATE);

        assert_eq!(decoded[0].name, "TEST");
        assert_eq!(decoded[0].tone[0].mode, Mode::Mix);
        assert_eq!(decoded[0].tone[0].lfo[0].rate, 80);
    }

    #[test]
    fn decode_rejects_wrong_manufacturer_id() {
        let mut decoded: [Patch; MAXPATCH] = core::array::from_fn(|_| Patch::new_default());
        decoded[0].name = "UNCHANGED".to_string();
        let bogus = [0x00u8, tag::TONE_BASE, 1];
        decode_frame(&bogus, &mut decoded, 0, RATE);
        assert_eq!(decoded[0].name, "UNCHANGED");
    }

    #[test]
    fn dump_state_round_trips_multiple_patches_via_select_tag() {
        let mut patches: [Patch; MAXPATCH] = core::array::from_fn(|_| Patch::new_default());
        patches[0].tone[0].level = 50;
        patches[0].refresh_all_flags();
        patches[5].name = "FIVE".to_string();
        patches[5].refresh_all_flags();

        let mut buf = [0u8; 512];
        let n = encode_state(&patches, &mut buf).unwrap();
        assert!(n > 0);

        let mut decoded: [Patch; MAXPATCH] = core::array::from_fn(|_| Patch::new_default());
        decode_frame(&buf[1..n - 1], &mut decoded, 0, RATE);

        assert_eq!(decoded[0].tone[0].level, 50);
        assert_eq!(decoded[5].name, "FIVE");
    }

    #[test]
    fn dump_buffer_too_small_for_shell_is_an_error() {
        let patch = Patch::new_default();
        let mut buf = [0u8; 2];
        assert_eq!(encode_patch(&patch, &mut buf), Err(crate::error::Error::DumpBufferTooSmall));
    }

    #[test]
    fn field_that_does_not_fit_is_dropped_but_frame_still_closes() {
        let mut patch = Patch::new_default();
        patch.tone[0].level = 50;
        let mut buf = [0u8; 3]; // room only for F0 7D F7, no payload
        let n = encode_patch(&patch, &mut buf).unwrap();
        assert_eq!(&buf[..n], &[SYSEX_START, MANUFACTURER_ID, SYSEX_END]);
    }
}
