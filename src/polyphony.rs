//! Polyphony Manager
//!
//! A fixed 256-slot ring of [`NoteVoice`]s. Note-on always advances the
//! ring and overwrites the oldest slot on wrap — there is no voice-stealing
//! policy beyond FIFO ring replacement (see `DESIGN.md` for why this crate
//! keeps that behavior rather than adding an alternative).

use crate::note::{NoteVoice, Scratch};
use crate::patch::{Channel, Patch, Tone, MAXNOTE, NO_NOTE};
use crate::tables::FreqTable;
use crate::waveform::NoiseGen;

/// The note ring plus the ring-index cursor. Lives inside the engine,
/// mutated only under its single mutex.
pub struct NoteRing {
    notes: [NoteVoice; MAXNOTE],
    curr_note: usize,
}

impl NoteRing {
    pub fn new() -> Self {
        Self {
            notes: [NoteVoice::silent(); MAXNOTE],
            curr_note: 0,
        }
    }

    /// Allocate the next ring slot for a note-on, recording it in the
    /// owning channel's per-pitch lookup so a matching note-off can find
    /// it. Always overwrites the oldest slot on wrap; only tones with
    /// mode != OFF get their oscillator initialized.
    pub fn note_on(
        &mut self,
        channel: &mut Channel,
        patch: &Patch,
        pitch: u8,
        velocity: u8,
        channel_index: u8,
        now_samples: f64,
        sample_rate: f64,
    ) {
        let slot = self.curr_note;
        self.notes[slot].note_on(&patch.tone, pitch, velocity, channel_index, now_samples, sample_rate);
        channel.note[pitch as usize] = slot as u16;
        self.curr_note = (self.curr_note + 1) % MAXNOTE;
    }

    /// The ring's next-write cursor. Exposed crate-wide for tests that need
    /// to observe FIFO wraparound directly.
    pub(crate) fn curr_note(&self) -> usize {
        self.curr_note
    }

    /// The pitch currently recorded in ring slot `slot`, regardless of
    /// whether that slot is still sounding. Exposed for telemetry/tests
    /// that need to observe FIFO wraparound directly.
    pub fn slot_pitch(&self, slot: usize) -> u8 {
        self.notes[slot].pitch
    }

    /// Release the note currently sounding at `pitch` on `channel`, if
    /// any. A note-off against an already-silent slot is a no-op.
    pub fn note_off(&mut self, channel: &mut Channel, pitch: u8) {
        let slot = channel.note[pitch as usize];
        if slot == NO_NOTE {
            return;
        }
        self.notes[slot as usize].note_off();
        channel.note[pitch as usize] = NO_NOTE;
    }

    /// Render every active slot's contribution to one sub-block, using
    /// `patch_tones_for` to look up the patch tones for a slot's channel.
    /// Returns the total number of oscillators rendered this block.
    #[allow(clippy::too_many_arguments)]
    pub fn render_block<F>(
        &mut self,
        now: f64,
        n: usize,
        sample_rate: f64,
        freq_table: &FreqTable,
        rng: &mut NoiseGen,
        scratch: &mut Scratch,
        out_l: &mut [f64],
        out_r: &mut [f64],
        mut patch_tones_for: F,
    ) -> usize
    where
        F: FnMut(u8) -> [Tone; 4],
    {
        let mut active_count = 0usize;
        for note in self.notes.iter_mut() {
            if note.is_free() {
                continue;
            }
            let tones = patch_tones_for(note.channel);
            active_count += note.render(
                &tones, now, n, sample_rate, freq_table, rng, scratch, out_l, out_r,
            );
        }
        active_count
    }
}

impl Default for NoteRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Envelope;

    const RATE: f64 = 44_100.0;

    fn loud_patch() -> Patch {
        let mut patch = Patch::new_default();
        patch.tone[0].env[0] = Envelope::new(0, 0, 127, 0);
        for e in patch.tone[0].env.iter_mut() {
            e.refresh_cache(RATE);
        }
        patch.refresh_all_flags();
        patch
    }

    #[test]
    fn note_on_records_slot_in_channel() {
        let mut ring = NoteRing::new();
        let mut channel = Channel::new_default(0);
        let patch = loud_patch();
        ring.note_on(&mut channel, &patch, 69, 127, 0, 0.0, RATE);
        assert_eq!(channel.note[69], 0);
    }

    #[test]
    fn note_off_resets_sentinel_and_is_idempotent() {
        let mut ring = NoteRing::new();
        let mut channel = Channel::new_default(0);
        let patch = loud_patch();
        ring.note_on(&mut channel, &patch, 69, 127, 0, 0.0, RATE);
        ring.note_off(&mut channel, 69);
        assert_eq!(channel.note[69], NO_NOTE);
        // second release of the same pitch is a no-op, not an error.
        ring.note_off(&mut channel, 69);
        assert_eq!(channel.note[69], NO_NOTE);
    }

    #[test]
    fn ring_wraps_and_overwrites_oldest_slot() {
        let mut ring = NoteRing::new();
        let mut channel = Channel::new_default(0);
        let patch = loud_patch();

        for i in 0..(MAXNOTE + 1) {
            let pitch = (i % 100) as u8;
            ring.note_on(&mut channel, &patch, pitch, 100, 0, i as f64, RATE);
        }
        // the 257th note-on should have wrapped back to slot 0, overwriting
        // the very first note-on's slot.
        assert_eq!(ring.curr_note, 1);
        assert_eq!(ring.notes[0].pitch, 0);
    }

    #[test]
    fn render_block_sums_active_oscillators_across_notes() {
        let mut ring = NoteRing::new();
        let mut channel = Channel::new_default(0);
        let patch = loud_patch();
        ring.note_on(&mut channel, &patch, 60, 127, 0, 0.0, RATE);
        ring.note_on(&mut channel, &patch, 64, 127, 0, 0.0, RATE);

        let mut scratch = Scratch::new();
        let mut rng = NoiseGen::new();
        let freq = FreqTable::new();
        let mut out_l = [0.0; 64];
        let mut out_r = [0.0; 64];
        let active = ring.render_block(
            0.0,
            64,
            RATE,
            &freq,
            &mut rng,
            &mut scratch,
            &mut out_l,
            &mut out_r,
            |_ch| patch.tone,
        );
        assert_eq!(active, 2);
    }
}
