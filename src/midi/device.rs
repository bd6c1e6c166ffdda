// MIDI output devices
// Port enumeration and a midir-backed MessageWriter

use crate::midi::error::MidiError;
use crate::midi::output::MessageWriter;
use midir::{MidiOutput, MidiOutputConnection, MidiOutputPort};

const CLIENT_NAME: &str = "steptracker";

#[derive(Clone, Debug)]
pub struct MidiDeviceInfo {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

/// Lists all available MIDI output ports
pub fn list_output_ports() -> Vec<MidiDeviceInfo> {
    let mut devices = Vec::new();

    if let Ok(midi_out) = MidiOutput::new(CLIENT_NAME) {
        for (index, port) in midi_out.ports().iter().enumerate() {
            if let Ok(name) = midi_out.port_name(port) {
                devices.push(MidiDeviceInfo {
                    id: format!("midi_out_{}", index),
                    name,
                    // First port is treated as the default
                    is_default: index == 0,
                });
            }
        }
    }

    devices
}

/// Open connection to a MIDI output port
pub struct MidirPortWriter {
    connection: MidiOutputConnection,
    port_name: String,
}

impl MidirPortWriter {
    /// Connect to the first port whose name contains `pattern`,
    /// or to the first port at all when `pattern` is `None`
    pub fn connect(pattern: Option<&str>) -> Result<Self, MidiError> {
        let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| MidiError::Init(e.to_string()))?;
        let ports = midi_out.ports();
        if ports.is_empty() {
            return Err(MidiError::NoPorts);
        }

        let (port, port_name) = match pattern {
            Some(pattern) => find_port(&midi_out, &ports, pattern)
                .ok_or_else(|| MidiError::PortNotFound(pattern.to_string()))?,
            None => {
                let port = ports[0].clone();
                let name = midi_out
                    .port_name(&port)
                    .unwrap_or_else(|_| "Unknown".to_string());
                (port, name)
            }
        };

        let connection = midi_out
            .connect(&port, "steptracker-out")
            .map_err(|e| MidiError::Connect(e.to_string()))?;

        log::info!("Connected to MIDI output '{}'", port_name);
        Ok(Self {
            connection,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

fn find_port(
    midi_out: &MidiOutput,
    ports: &[MidiOutputPort],
    pattern: &str,
) -> Option<(MidiOutputPort, String)> {
    ports.iter().find_map(|port| {
        let name = midi_out.port_name(port).ok()?;
        name.contains(pattern).then(|| (port.clone(), name))
    })
}

impl MessageWriter for MidirPortWriter {
    fn send(&mut self, bytes: &[u8]) -> Result<(), MidiError> {
        self.connection
            .send(bytes)
            .map_err(|e| MidiError::Send(e.to_string()))
    }
}
