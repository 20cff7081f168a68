//! Control API
//!
//! A MIDI-style byte-stream decoder recognizing only note-on (`0x90|c`),
//! note-off (`0x80|c`), and SysEx (`0xF0..0xF7`). Every other status byte
//! is skipped one byte at a time and scanning resumes — `feed` never
//! fails; malformed or unrecognized input is silently absorbed.

use crate::patch::{Channel, Patch, MAXCHANNEL, MAXPATCH};
use crate::polyphony::NoteRing;
use crate::sysex;

const STATUS_NOTE_OFF: u8 = 0x80;
const STATUS_NOTE_ON: u8 = 0x90;
const STATUS_SYSEX_START: u8 = 0xF0;
const STATUS_SYSEX_END: u8 = 0xF7;

/// Decode `bytes` as a MIDI-like control stream, dispatching note-on/off
/// events to `ring` and SysEx frames to [`sysex::decode_frame`]. Returns
/// the number of bytes consumed, which is always `bytes.len()`: the
/// decoder always scans to the end, it simply may skip bytes it does not
/// recognize along the way.
#[allow(clippy::too_many_arguments)]
pub fn feed(
    bytes: &[u8],
    patches: &mut [Patch; MAXPATCH],
    channels: &mut [Channel; MAXCHANNEL],
    ring: &mut NoteRing,
    current_patch_index: usize,
    now_samples: f64,
    sample_rate: f64,
) -> usize {
    let mut i = 0usize;
    while i < bytes.len() {
        let status = bytes[i];

        if (STATUS_NOTE_OFF..STATUS_NOTE_OFF + MAXCHANNEL as u8).contains(&status) {
            let channel = status - STATUS_NOTE_OFF;
            match (bytes.get(i + 1), bytes.get(i + 2)) {
                (Some(&pitch), Some(_velocity)) if pitch < 128 => {
                    ring.note_off(&mut channels[channel as usize], pitch);
                    i += 3;
                }
                _ => {
                    log::trace!("control: truncated note-off, skipping status byte");
                    i += 1;
                }
            }
            continue;
        }

        if (STATUS_NOTE_ON..STATUS_NOTE_ON + MAXCHANNEL as u8).contains(&status) {
            let channel = status - STATUS_NOTE_ON;
            match (bytes.get(i + 1), bytes.get(i + 2)) {
                (Some(&pitch), Some(&velocity)) if pitch < 128 => {
                    let patch_index = channels[channel as usize].patch as usize;
                    ring.note_on(
                        &mut channels[channel as usize],
                        &patches[patch_index],
                        pitch,
                        velocity,
                        channel,
                        now_samples,
                        sample_rate,
                    );
                    i += 3;
                }
                _ => {
                    log::trace!("control: truncated note-on, skipping status byte");
                    i += 1;
                }
            }
            continue;
        }

        if status == STATUS_SYSEX_START {
            if let Some(end_offset) = bytes[i + 1..].iter().position(|&b| b == STATUS_SYSEX_END) {
                let payload_start = i + 1;
                let payload_end = payload_start + end_offset;
                sysex::decode_frame(&bytes[payload_start..payload_end], patches, current_patch_index, sample_rate);
                i = payload_end + 1;
            } else {
                log::trace!("control: unterminated SysEx frame, discarding remainder");
                i = bytes.len();
            }
            continue;
        }

        log::trace!("control: unrecognized status byte {:#04x}, skipping", status);
        i += 1;
    }
    bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Envelope;

    const RATE: f64 = 44_100.0;

    fn init() -> ([Patch; MAXPATCH], [Channel; MAXCHANNEL], NoteRing) {
        let patches: [Patch; MAXPATCH] = core::array::from_fn(|_| Patch::new_default());
        let channels: [Channel; MAXCHANNEL] = core::array::from_fn(|i| Channel::new_default(i as u8));
        (patches, channels, NoteRing::new())
    }

    #[test]
    fn note_on_then_off_round_trips_through_the_channel_slot() {
        let (mut patches, mut channels, mut ring) = init();
        patches[0].tone[0].env[0] = Envelope::new(0, 0, 127, 0);
        patches[0].refresh_all_flags();

        let bytes = [0x90, 69, 127];
        feed(&bytes, &mut patches, &mut channels, &mut ring, 0, 0.0, RATE);
        assert_ne!(channels[0].note[69], crate::patch::NO_NOTE);

        let bytes = [0x80, 69, 0];
        feed(&bytes, &mut patches, &mut channels, &mut ring, 0, 0.0, RATE);
        assert_eq!(channels[0].note[69], crate::patch::NO_NOTE);
    }

    #[test]
    fn unrecognized_status_byte_is_skipped_not_fatal() {
        let (mut patches, mut channels, mut ring) = init();
        let bytes = [0xA0, 0x12, 0x90, 60, 100];
        let consumed = feed(&bytes, &mut patches, &mut channels, &mut ring, 0, 0.0, RATE);
        assert_eq!(consumed, bytes.len());
        assert_ne!(channels[0].note[60], crate::patch::NO_NOTE);
    }

    #[test]
    fn sysex_frame_is_decoded_and_scanning_resumes_after_it() {
        let (mut patches, mut channels, mut ring) = init();
        let mut buf = [0u8; 16];
        patches[0].tone[0].level = 50;
        let n = sysex::encode_patch(&patches[0], &mut buf).unwrap();

        let mut stream = buf[..n].to_vec();
        stream.extend_from_slice(&[0x90, 60, 100]);

        let mut fresh: [Patch; MAXPATCH] = core::array::from_fn(|_| Patch::new_default());
        feed(&stream, &mut fresh, &mut channels, &mut ring, 0, 0.0, RATE);

        assert_eq!(fresh[0].tone[0].level, 50);
        assert_ne!(channels[0].note[60], crate::patch::NO_NOTE);
    }

    #[test]
    fn unterminated_sysex_discards_remainder_without_panicking() {
        let (mut patches, mut channels, mut ring) = init();
        let bytes = [0xF0, 0x7D, 0x10];
        let consumed = feed(&bytes, &mut patches, &mut channels, &mut ring, 0, 0.0, RATE);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn truncated_note_on_is_skipped() {
        let (mut patches, mut channels, mut ring) = init();
        let bytes = [0x90, 60];
        let consumed = feed(&bytes, &mut patches, &mut channels, &mut ring, 0, 0.0, RATE);
        assert_eq!(consumed, bytes.len());
        assert_eq!(channels[0].note[60], crate::patch::NO_NOTE);
    }
}
