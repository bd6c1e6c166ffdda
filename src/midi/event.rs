// MIDI message types
// Channel voice messages the engine emits and schedules

/// Controller number of the "all notes off" channel mode message
pub const ALL_NOTES_OFF_CC: u8 = 0x7B;

/// Number of MIDI channels addressed by panic messages
pub const MIDI_CHANNELS: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
}

impl MidiEvent {
    /// Channel mode message silencing every sounding note on `channel`
    pub fn all_notes_off(channel: u8) -> Self {
        MidiEvent::ControlChange {
            channel: channel & 0x0F,
            controller: ALL_NOTES_OFF_CC,
            value: 0,
        }
    }

    /// Channel this message is addressed to (0-15)
    pub fn channel(&self) -> u8 {
        match *self {
            MidiEvent::NoteOn { channel, .. }
            | MidiEvent::NoteOff { channel, .. }
            | MidiEvent::ControlChange { channel, .. } => channel,
        }
    }

    /// Encode to raw wire bytes
    pub fn to_bytes(&self) -> [u8; 3] {
        match *self {
            MidiEvent::NoteOn {
                channel,
                note,
                velocity,
            } => [0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F],
            MidiEvent::NoteOff { channel, note } => [0x80 | (channel & 0x0F), note & 0x7F, 0],
            MidiEvent::ControlChange {
                channel,
                controller,
                value,
            } => [0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F],
        }
    }

    /// Parse a raw MIDI message
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 3 {
            return None;
        }

        let status = bytes[0];
        let channel = status & 0x0F;

        match status & 0xF0 {
            0x90 => {
                let note = bytes[1];
                let velocity = bytes[2];
                // Velocity 0 = Note Off
                if velocity == 0 {
                    Some(MidiEvent::NoteOff { channel, note })
                } else {
                    Some(MidiEvent::NoteOn {
                        channel,
                        note,
                        velocity,
                    })
                }
            }
            0x80 => Some(MidiEvent::NoteOff {
                channel,
                note: bytes[1],
            }),
            0xB0 => Some(MidiEvent::ControlChange {
                channel,
                controller: bytes[1],
                value: bytes[2],
            }),
            _ => None,
        }
    }
}

/// Convert a row value to a 7-bit MIDI data byte
pub fn to_data_byte(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 127.0) as u8
}

/// Convert a row value to a MIDI channel (0-15)
pub fn to_channel(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 15.0) as u8
}

/// Note name for display, e.g. 60 -> "C4"
pub fn midi_note_name(note: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    let octave = (note / 12) as i32 - 1;
    format!("{}{}", NAMES[(note % 12) as usize], octave)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_bytes() {
        let event = MidiEvent::NoteOn {
            channel: 2,
            note: 60,
            velocity: 100,
        };
        assert_eq!(event.to_bytes(), [0x92, 60, 100]);
        assert_eq!(MidiEvent::from_bytes(&[0x92, 60, 100]), Some(event));
    }

    #[test]
    fn test_note_off_velocity_zero() {
        // Note On with velocity 0 = Note Off
        let event = MidiEvent::from_bytes(&[0x90, 64, 0]).unwrap();
        assert_eq!(event, MidiEvent::NoteOff { channel: 0, note: 64 });
    }

    #[test]
    fn test_all_notes_off() {
        let event = MidiEvent::all_notes_off(15);
        assert_eq!(event.to_bytes(), [0xBF, 0x7B, 0]);
        assert_eq!(event.channel(), 15);
    }

    #[test]
    fn test_short_message_rejected() {
        assert!(MidiEvent::from_bytes(&[]).is_none());
        assert!(MidiEvent::from_bytes(&[0x90, 60]).is_none());
        assert!(MidiEvent::from_bytes(&[0xE0, 0, 64]).is_none());
    }

    #[test]
    fn test_data_byte_conversion() {
        assert_eq!(to_data_byte(-3.0), 0);
        assert_eq!(to_data_byte(64.4), 64);
        assert_eq!(to_data_byte(300.0), 127);
        assert_eq!(to_data_byte(f64::NAN), 0);
        assert_eq!(to_channel(20.0), 15);
    }

    #[test]
    fn test_note_names() {
        assert_eq!(midi_note_name(60), "C4");
        assert_eq!(midi_note_name(61), "C#4");
        assert_eq!(midi_note_name(0), "C-1");
    }
}
