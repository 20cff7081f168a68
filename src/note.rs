//! Oscillator Voice and Note Voice
//!
//! One [`NoteVoice`] holds the four [`OscillatorState`]s that make up a
//! sounding note. Rendering a block walks the four tones in order, FM- or
//! ring-routing each tone's output into the next through the shared
//! `modula` scratch buffer, and accumulates MIX-routed tones into the
//! engine's stereo block accumulators.

use crate::envelope::Envelope;
use crate::filter::FilterState;
use crate::patch::{flags, Mode, Tone, MAXENV, MAXFRAME, MAXLFO};
use crate::phase::{constant_frequency, variable_frequency};
use crate::tables::FreqTable;
use crate::units::{to01, to11, to_dt};
use crate::vector;
use crate::waveform::{eval, wrap01, wrap_buffer, NoiseGen};

/// Per-block scratch owned by the engine and reused across every note and
/// tone rendered within a single `pull`. Never observed outside a pull.
pub struct Scratch {
    pub env0: [f64; MAXFRAME],
    pub env1: [f64; MAXFRAME],
    pub env2: [f64; MAXFRAME],
    pub lfo0: [f64; MAXFRAME],
    pub lfo1: [f64; MAXFRAME],
    pub lfo_phase_tmp: [f64; MAXFRAME],
    pub pitch: [f64; MAXFRAME],
    pub freq: [f64; MAXFRAME],
    pub phase: [f64; MAXFRAME],
    pub wave: [f64; MAXFRAME],
    pub cutoff: [f64; MAXFRAME],
    pub amp: [f64; MAXFRAME],
    pub modula: [f64; MAXFRAME],
}

impl Scratch {
    pub fn new() -> Self {
        Self {
            env0: [0.0; MAXFRAME],
            env1: [0.0; MAXFRAME],
            env2: [0.0; MAXFRAME],
            lfo0: [0.0; MAXFRAME],
            lfo1: [0.0; MAXFRAME],
            lfo_phase_tmp: [0.0; MAXFRAME],
            pitch: [0.0; MAXFRAME],
            freq: [0.0; MAXFRAME],
            phase: [0.0; MAXFRAME],
            wave: [0.0; MAXFRAME],
            cutoff: [0.0; MAXFRAME],
            amp: [0.0; MAXFRAME],
            modula: [0.0; MAXFRAME],
        }
    }
}

impl Default for Scratch {
    fn default() -> Self {
        Self::new()
    }
}

/// Reference pitch (MIDI 60, middle C) that filter key-tracking is measured
/// against: `keyTrack = (pitch - 60) / 60`, scaled by the bipolar
/// `filter_key` send. Not specified exactly by the source; chosen so that
/// `filter_key` at its neutral midpoint (64) contributes nothing.
const KEY_TRACK_REFERENCE: f64 = 60.0;
const KEY_TRACK_SPAN: f64 = 60.0;

/// The per-block working state of one tone of one sounding note.
#[derive(Debug, Clone, Copy)]
pub struct OscillatorState {
    /// Sample age since note-on.
    pub time: f64,
    /// Whether this oscillator still participates. Cleared permanently
    /// once the level envelope has decayed to zero, or never set if the
    /// tone's mode was OFF at note-on.
    pub active: bool,
    env_cache: [Envelope; MAXENV],
    /// Per-oscillator release line, independent of the tone's shared design
    /// cache in `env_cache`. Neutral (`0, 1`, never the binding constraint)
    /// from note-on until note-off freezes it from this oscillator's own
    /// sample age.
    rel_rm: [f64; MAXENV],
    rel_rb: [f64; MAXENV],
    phase: f64,
    lfo_phase: [f64; MAXLFO],
    filter: FilterState,
}

impl OscillatorState {
    pub fn silent() -> Self {
        Self {
            time: 0.0,
            active: false,
            env_cache: [Envelope::new(0, 0, 0, 0); MAXENV],
            rel_rm: [0.0; MAXENV],
            rel_rb: [1.0; MAXENV],
            phase: 0.0,
            lfo_phase: [0.0; MAXLFO],
            filter: FilterState::new(),
        }
    }

    /// Initialize this oscillator at note-on. `now_samples` is the
    /// engine's global sample counter, used to seed free-running LFO
    /// phase. Tones whose mode is OFF are left inactive and otherwise
    /// untouched, matching their permanent non-participation.
    pub fn note_on(&mut self, tone: &Tone, now_samples: f64, sample_rate: f64) {
        self.time = 0.0;
        self.active = tone.mode != Mode::Off;
        if !self.active {
            return;
        }
        self.env_cache = tone.env;
        self.rel_rm = [0.0; MAXENV];
        self.rel_rb = [1.0; MAXENV];
        self.phase = 0.0;
        for k in 0..MAXLFO {
            self.lfo_phase[k] = tone.lfo[k].init_phase(now_samples, sample_rate);
        }
        self.filter.reset();
    }

    /// Freeze each envelope's release line from this oscillator's current
    /// sample age. Runs unconditionally on note-off, even for oscillators
    /// whose tone was OFF at note-on (a no-op there since nothing reads
    /// their cache again).
    pub fn note_off(&mut self) {
        for i in 0..MAXENV {
            let (rm, rb) = self.env_cache[i].release_line_at(self.time);
            self.rel_rm[i] = rm;
            self.rel_rb[i] = rb;
        }
    }
}

/// Render one tone of one note for `n` samples. Returns whether the
/// oscillator is still active after this block (false retires it).
#[allow(clippy::too_many_arguments)]
fn render_oscillator(
    osc: &mut OscillatorState,
    tone: &Tone,
    prev_mode: Mode,
    note_pitch: u8,
    note_level: u8,
    n: usize,
    sample_rate: f64,
    freq_table: &FreqTable,
    rng: &mut NoiseGen,
    s: &mut Scratch,
    out_l: &mut [f64],
    out_r: &mut [f64],
) -> bool {
    let time0 = osc.time;

    // Step 1: envelope buffers. ENV0 (amplitude) always evaluates, since
    // its value gates both output level and retirement regardless of the
    // derived participation flag; ENV1/ENV2 are true optimizations, safe
    // to skip entirely since an unset flag means their contribution is
    // zero either way (degenerate envelope or neutral send).
    osc.env_cache[0].render_block(time0, &mut s.env0[..n], osc.rel_rm[0], osc.rel_rb[0]);
    if tone.flags & flags::ENV1 != 0 {
        osc.env_cache[1].render_block(time0, &mut s.env1[..n], osc.rel_rm[1], osc.rel_rb[1]);
    }
    if tone.flags & flags::ENV2 != 0 {
        osc.env_cache[2].render_block(time0, &mut s.env2[..n], osc.rel_rm[2], osc.rel_rb[2]);
    }

    // Step 2: LFO buffers, sharing lfo_phase_tmp as scratch phase.
    if tone.flags & flags::LFO0 != 0 {
        tone.lfo[0].render_block(
            time0,
            &mut osc.lfo_phase[0],
            sample_rate,
            &mut s.lfo0[..n],
            &mut s.lfo_phase_tmp[..n],
            rng,
        );
    }
    if tone.flags & flags::LFO1 != 0 {
        tone.lfo[1].render_block(
            time0,
            &mut osc.lfo_phase[1],
            sample_rate,
            &mut s.lfo1[..n],
            &mut s.lfo_phase_tmp[..n],
            rng,
        );
    }

    // Step 3: pitch.
    let base_note = note_pitch as f64 + (tone.pitch_coarse as f64 - 64.0) + to11(tone.pitch_fine);
    if tone.flags & flags::PITCH != 0 {
        vector::set(&mut s.pitch[..n], base_note);
        if tone.flags & flags::LFO0 != 0 {
            vector::acc(&mut s.pitch[..n], &s.lfo0[..n], tone.lfo[0].pitch as f64 - 64.0);
        }
        if tone.flags & flags::LFO1 != 0 {
            vector::acc(&mut s.pitch[..n], &s.lfo1[..n], tone.lfo[1].pitch as f64 - 64.0);
        }
        if tone.flags & flags::ENV1 != 0 {
            vector::acc(&mut s.pitch[..n], &s.env1[..n], tone.pitch_env as f64 - 64.0);
        }
        for i in 0..n {
            let clamped = s.pitch[i].max(0.0).min(127.0);
            s.freq[i] = freq_table.lookup(clamped);
        }
        if prev_mode == Mode::Mod {
            for i in 0..n {
                s.freq[i] *= s.modula[i] + 1.0;
            }
        }
        variable_frequency(&mut osc.phase, &s.freq[..n], sample_rate, &mut s.phase[..n]);
    } else {
        let semis = base_note.max(0.0).min(127.0);
        let freq = freq_table.lookup(semis);
        constant_frequency(&mut osc.phase, freq, sample_rate, &mut s.phase[..n]);
    }

    // Step 4: waveform.
    wrap_buffer(&mut s.phase[..n]);
    eval(tone.wave, &s.phase[..n], &mut s.wave[..n], rng);
    if prev_mode == Mode::Rng {
        for i in 0..n {
            s.wave[i] *= s.modula[i];
        }
    }

    // Step 5: filter.
    let key_track = (note_pitch as f64 - KEY_TRACK_REFERENCE) / KEY_TRACK_SPAN;
    let base_cut = to01(tone.filter_cut) + to11(tone.filter_key) * key_track;
    vector::set(&mut s.cutoff[..n], base_cut);
    if tone.flags & flags::LFO0 != 0 {
        vector::acc(&mut s.cutoff[..n], &s.lfo0[..n], to11(tone.lfo[0].filter));
    }
    if tone.flags & flags::LFO1 != 0 {
        vector::acc(&mut s.cutoff[..n], &s.lfo1[..n], to11(tone.lfo[1].filter));
    }
    if tone.flags & flags::ENV2 != 0 {
        vector::acc(&mut s.cutoff[..n], &s.env2[..n], to11(tone.filter_env));
    }
    for i in 0..n {
        s.cutoff[i] = s.cutoff[i].max(0.0).min(1.0);
    }
    osc.filter
        .process_block(&mut s.wave[..n], &s.cutoff[..n], tone.filter_mode, to01(tone.filter_res));

    // Step 6: level (pan is intentionally not rendered; see DESIGN.md).
    let base_level = to01(tone.level) * to01(note_level);
    vector::set(&mut s.amp[..n], base_level);
    if tone.flags & flags::LFO0 != 0 {
        vector::acc(&mut s.amp[..n], &s.lfo0[..n], to11(tone.lfo[0].level));
    }
    if tone.flags & flags::LFO1 != 0 {
        vector::acc(&mut s.amp[..n], &s.lfo1[..n], to11(tone.lfo[1].level));
    }
    for i in 0..n {
        s.amp[i] *= s.env0[i];
    }

    // Step 7: output routing.
    match tone.mode {
        Mode::Mix => {
            for i in 0..n {
                let v = s.wave[i] * s.amp[i];
                out_l[i] += v;
                out_r[i] += v;
            }
        }
        Mode::Mod | Mode::Rng => {
            for i in 0..n {
                s.modula[i] = s.wave[i] * s.amp[i];
            }
        }
        Mode::Off => {}
    }

    // Step 8: advance time, wrap stored phases, re-evaluate retirement.
    osc.time += n as f64;
    osc.phase = wrap01(osc.phase);
    for p in osc.lfo_phase.iter_mut() {
        *p = wrap01(*p);
    }
    let last_level = osc.env_cache[0].value_at(time0 + (n - 1) as f64, osc.rel_rm[0], osc.rel_rb[0]);
    osc.active = last_level > 0.0;
    osc.active
}

/// A live sounding instance of a patch at a specific pitch.
#[derive(Debug, Clone, Copy)]
pub struct NoteVoice {
    /// Global sample time this note began sounding.
    pub start: f64,
    pub pitch: u8,
    /// Zero means the slot is free / the note has fully retired.
    pub level: u8,
    pub channel: u8,
    osc: [OscillatorState; 4],
}

impl NoteVoice {
    pub fn silent() -> Self {
        Self {
            start: 0.0,
            pitch: 0,
            level: 0,
            channel: 0,
            osc: [OscillatorState::silent(); 4],
        }
    }

    pub fn is_free(&self) -> bool {
        self.level == 0
    }

    pub fn note_on(
        &mut self,
        patch_tones: &[Tone; 4],
        pitch: u8,
        level: u8,
        channel: u8,
        now_samples: f64,
        sample_rate: f64,
    ) {
        self.start = now_samples;
        self.pitch = pitch;
        self.level = level.max(1);
        self.channel = channel;
        for j in 0..4 {
            self.osc[j].note_on(&patch_tones[j], now_samples, sample_rate);
        }
    }

    pub fn note_off(&mut self) {
        for o in self.osc.iter_mut() {
            o.note_off();
        }
    }

    /// Render this note's contribution to one block. `now` is the engine's
    /// global sample counter at the start of the block. Returns the number
    /// of oscillators actually rendered this block (for telemetry).
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        patch_tones: &[Tone; 4],
        now: f64,
        n: usize,
        sample_rate: f64,
        freq_table: &FreqTable,
        rng: &mut NoiseGen,
        s: &mut Scratch,
        out_l: &mut [f64],
        out_r: &mut [f64],
    ) -> usize {
        vector::set(&mut s.modula[..n], 0.0);
        let mut prev_mode = Mode::Off;
        let mut participating = 0usize;
        let mut any_active = false;

        for j in 0..4 {
            let tone = &patch_tones[j];
            let osc = &mut self.osc[j];
            let effective_mode = if osc.active { tone.mode } else { Mode::Off };

            let delay_elapsed = now - self.start >= to_dt(sample_rate, tone.delay);
            let should_render = effective_mode != Mode::Off && delay_elapsed;

            if should_render {
                render_oscillator(
                    osc,
                    tone,
                    prev_mode,
                    self.pitch,
                    self.level,
                    n,
                    sample_rate,
                    freq_table,
                    rng,
                    s,
                    out_l,
                    out_r,
                );
                participating += 1;
            } else if effective_mode == Mode::Mod || effective_mode == Mode::Rng {
                // Gated by delay: the next tone sees silence, not a stale
                // modula buffer from a previous block.
                vector::set(&mut s.modula[..n], 0.0);
            }

            if osc.active {
                any_active = true;
            }
            prev_mode = effective_mode;
        }

        if !any_active {
            self.level = 0;
        }

        participating
    }
}
