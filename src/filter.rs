//! Filter Kernel
//!
//! A 4-pole ladder filter approximation (Stilson/Smith topology, Kellett
//! coefficients). Runs serially sample-by-sample — this stage cannot be
//! vectorized across samples because each output feeds back into the next.

/// Which side of the ladder's output is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FilterMode {
    Lpf = 0,
    Hpf = 1,
}

impl FilterMode {
    pub fn from_u8(v: u8) -> Self {
        if v == 0 {
            FilterMode::Lpf
        } else {
            FilterMode::Hpf
        }
    }
}

/// Persistent ladder state, carried across blocks and reset to zero on
/// note-on.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterState {
    b: [f64; 5],
}

impl FilterState {
    pub fn new() -> Self {
        Self { b: [0.0; 5] }
    }

    pub fn reset(&mut self) {
        self.b = [0.0; 5];
    }

    /// Process one block in place. `wave` holds the input samples and is
    /// overwritten with the filtered output. `cutoff` is per-sample,
    /// normalized to `[0,1]`; `resonance` is a scalar in `[0,1]`.
    pub fn process_block(&mut self, wave: &mut [f64], cutoff: &[f64], mode: FilterMode, resonance: f64) {
        let n = wave.len().min(cutoff.len());
        let mut prev = self.b;
        for i in 0..n {
            let c = cutoff[i].max(0.0).min(1.0);
            let one_minus_c = 1.0 - c;
            let big_b = c + 0.8 * c * one_minus_c;
            let big_a = 2.0 * big_b - 1.0;
            let k_res = resonance
                * (1.0 + 0.5 * one_minus_c * (1.0 - one_minus_c + 5.6 * one_minus_c * one_minus_c));

            let mut b = [0.0f64; 5];
            b[0] = wave[i] - k_res * prev[4];
            for pole in 0..4 {
                b[pole + 1] = b[pole] * big_b + (prev[pole] * big_b - prev[pole + 1] * big_a);
            }
            b[4] -= b[4] * b[4] * b[4] * 0.166_667;

            wave[i] = match mode {
                FilterMode::Lpf => b[4],
                FilterMode::Hpf => wave[i] - b[4],
            };

            prev = b;
        }
        self.b = prev;
    }
}
