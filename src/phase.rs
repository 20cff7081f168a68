//! Phase Accumulators
//!
//! Two ways of turning a frequency into a stream of phase values, both
//! producing *unwrapped* phase (callers wrap before waveform evaluation so
//! that interpolation and FM math stay continuous across the wrap point).

/// Produce `out.len()` successive unwrapped phase values from a single
/// frequency, advancing a scalar accumulator carried across calls.
pub fn constant_frequency(acc: &mut f64, freq: f64, sample_rate: f64, out: &mut [f64]) {
    let step = freq / sample_rate;
    let mut phase = *acc;
    for p in out.iter_mut() {
        *p = phase;
        phase += step;
    }
    *acc = phase;
}

/// Produce `out.len()` successive unwrapped phase values from a per-sample
/// frequency buffer, advancing a scalar accumulator carried across calls.
pub fn variable_frequency(acc: &mut f64, freq: &[f64], sample_rate: f64, out: &mut [f64]) {
    let n = freq.len().min(out.len());
    let mut phase = *acc;
    for i in 0..n {
        out[i] = phase;
        phase += freq[i] / sample_rate;
    }
    *acc = phase;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn constant_frequency_advances_by_exact_step() {
        let mut acc = 0.0;
        let mut out = [0.0; 4];
        constant_frequency(&mut acc, 100.0, 1000.0, &mut out);
        assert_eq!(out, [0.0, 0.1, 0.2, 0.3]);
        assert_abs_diff_eq!(acc, 0.4, epsilon = 1e-12);
    }

    #[test]
    fn constant_frequency_state_carries_across_calls() {
        let mut acc = 0.0;
        let mut out = [0.0; 2];
        constant_frequency(&mut acc, 100.0, 1000.0, &mut out);
        constant_frequency(&mut acc, 100.0, 1000.0, &mut out);
        assert_abs_diff_eq!(out[0], 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(out[1], 0.3, epsilon = 1e-12);
    }

    #[test]
    fn variable_frequency_integrates_per_sample_rate() {
        let mut acc = 0.0;
        let freq = [100.0, 200.0, 300.0, 400.0];
        let mut out = [0.0; 4];
        variable_frequency(&mut acc, &freq, 1000.0, &mut out);
        assert_eq!(out[0], 0.0);
        assert_abs_diff_eq!(out[1], 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(out[2], 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(out[3], 0.6, epsilon = 1e-12);
    }

    #[test]
    fn phases_are_not_wrapped() {
        let mut acc = 0.0;
        let mut out = [0.0; 8];
        constant_frequency(&mut acc, 1000.0, 1000.0, &mut out);
        assert!(out[7] > 1.0);
    }
}
