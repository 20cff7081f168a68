//! LFO Kernel
//!
//! A constant-frequency phase accumulator feeding the waveform kernel, with
//! an optional linear ramp-in (`delay`) that fades the LFO in over its first
//! `1/dm` seconds after note-on.

use crate::phase::constant_frequency;
use crate::units::to_dt;
use crate::waveform::{eval, NoiseGen, Wave};

/// Stored parameters plus the derived cache for one LFO.
#[derive(Debug, Clone, Copy)]
pub struct Lfo {
    pub wave: Wave,
    pub sync: bool,
    pub rate: u8,
    pub delay: u8,
    pub level: u8,
    pub pan: u8,
    pub pitch: u8,
    pub phase: u8,
    pub filter: u8,

    freq: f64,
    dm: f64,
    /// Nonzero iff rate>0 AND at least one send differs from its neutral
    /// midpoint (64).
    pub flags: bool,
}

impl Lfo {
    pub fn new(wave: Wave, sync: bool, rate: u8, delay: u8, level: u8, pan: u8, pitch: u8, phase: u8, filter: u8) -> Self {
        let mut l = Self {
            wave,
            sync,
            rate,
            delay,
            level,
            pan,
            pitch,
            phase,
            filter,
            freq: 0.0,
            dm: 0.0,
            flags: false,
        };
        l.refresh_cache(0.0);
        l
    }

    /// Recompute `freq`, `dm`, and the participation flag. Must run after any
    /// write to rate/delay/level/pan/pitch/phase/filter.
    pub fn refresh_cache(&mut self, sample_rate: f64) {
        let rt = to_dt(sample_rate, self.rate);
        let dt = to_dt(sample_rate, self.delay);

        self.freq = if rt > 0.0 { sample_rate / rt } else { 0.0 };
        self.dm = if dt > 0.0 { 1.0 / dt } else { 0.0 };

        self.flags = self.rate > 0
            && (self.level != 64
                || self.pan != 64
                || self.pitch != 64
                || self.phase != 64
                || self.filter != 64);
    }

    #[inline]
    pub fn freq(&self) -> f64 {
        self.freq
    }

    /// Phase to seed an oscillator's LFO phase accumulator with at note-on:
    /// free-running (`frac(now * freq / rate)`) unless `sync` is set, in
    /// which case the LFO always restarts at phase 0.
    pub fn init_phase(&self, now_samples: f64, sample_rate: f64) -> f64 {
        if self.sync {
            0.0
        } else {
            crate::waveform::wrap01(now_samples * self.freq / sample_rate)
        }
    }

    /// Render one block starting at oscillator sample age `time_at_start`,
    /// advancing `phase_acc` and writing the (possibly ramped) waveform into
    /// `out`.
    pub fn render_block(
        &self,
        time_at_start: f64,
        phase_acc: &mut f64,
        sample_rate: f64,
        out: &mut [f64],
        scratch_phase: &mut [f64],
        rng: &mut NoiseGen,
    ) {
        let n = out.len().min(scratch_phase.len());
        constant_frequency(phase_acc, self.freq, sample_rate, &mut scratch_phase[..n]);
        crate::waveform::wrap_buffer(&mut scratch_phase[..n]);
        eval(self.wave, &scratch_phase[..n], &mut out[..n], rng);

        if self.dm > 0.0 {
            let mut k = self.dm * time_at_start;
            for v in out.iter_mut().take(n) {
                let k_clamped = k.min(1.0);
                *v *= k_clamped;
                k += self.dm;
            }
        }
    }
}
