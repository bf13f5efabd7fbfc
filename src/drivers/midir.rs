// SPDX-FileCopyrightText: The midio authors
// SPDX-License-Identifier: MPL-2.0

//! Portable backend driven by [`midir`].
//!
//! Ports are selected by a configured name prefix with a port index as
//! fallback. Input bytes arrive through the `midir` callback and are
//! queued; [`MidiPort::poll_byte`] pops the queue.

use std::sync::mpsc::{self, Receiver};

use midir::{
    Ignore, MidiInput, MidiInputConnection, MidiInputPort, MidiOutput, MidiOutputConnection,
    MidiOutputPort,
};

use crate::{
    config::{MIDIR_INPUT_PORT, MIDIR_OUTPUT_PORT, MIDIR_PORT_NAME},
    DriverDescriptor, DriverError, DriverId, DriverResult, MidiBackend, MidiPort, PortDirection,
    PortIndex, SoundConfig,
};

pub const DRIVER_DESCRIPTOR: &DriverDescriptor = &DriverDescriptor {
    id: DriverId::Midir,
    short_name: "midir",
    name: "Portable MIDI (midir)",
};

/// Port index used when the configuration is silent.
pub const DEFAULT_PORT: PortIndex = PortIndex(0);

const CLIENT_NAME: &str = "midio";

#[derive(Debug, Clone, Copy, Default)]
pub struct MidirBackend;

impl MidirBackend {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn new_input() -> Result<MidiInput, midir::InitError> {
    let mut input = MidiInput::new(CLIENT_NAME)?;
    input.ignore(Ignore::None);
    Ok(input)
}

fn configured_port_index(config: &SoundConfig, key: &str) -> PortIndex {
    let index = config.get_int(key, 0);
    match usize::try_from(index) {
        Ok(index) => PortIndex(index),
        Err(_) => {
            log::warn!("Ignoring negative config value for \"{key}\": {index}");
            PortIndex(0)
        }
    }
}

fn select_input_port(
    input: &MidiInput,
    config: &SoundConfig,
) -> Option<(MidiInputPort, String)> {
    if let Some(prefix) = config.get_str(MIDIR_PORT_NAME) {
        for port in input.ports() {
            let Ok(port_name) = input.port_name(&port) else {
                continue;
            };
            if port_name.starts_with(prefix) {
                return Some((port, port_name));
            }
        }
    }
    let PortIndex(index) = configured_port_index(config, MIDIR_INPUT_PORT);
    let port = input.ports().into_iter().nth(index)?;
    let port_name = input.port_name(&port).ok()?;
    Some((port, port_name))
}

fn select_output_port(
    output: &MidiOutput,
    config: &SoundConfig,
) -> Option<(MidiOutputPort, String)> {
    if let Some(prefix) = config.get_str(MIDIR_PORT_NAME) {
        for port in output.ports() {
            let Ok(port_name) = output.port_name(&port) else {
                continue;
            };
            if port_name.starts_with(prefix) {
                return Some((port, port_name));
            }
        }
    }
    let PortIndex(index) = configured_port_index(config, MIDIR_OUTPUT_PORT);
    let port = output.ports().into_iter().nth(index)?;
    let port_name = output.port_name(&port).ok()?;
    Some((port, port_name))
}

fn unavailable(direction: PortDirection, msg: impl ToString) -> DriverError {
    DriverError::Unavailable {
        direction,
        msg: msg.to_string().into(),
    }
}

fn open_failed(direction: PortDirection, msg: impl ToString) -> DriverError {
    DriverError::Open {
        direction,
        msg: msg.to_string().into(),
    }
}

impl MidiBackend for MidirBackend {
    fn descriptor(&self) -> &DriverDescriptor {
        DRIVER_DESCRIPTOR
    }

    fn detect(&self, direction: PortDirection, config: &SoundConfig) -> DriverResult<()> {
        // The client created for enumeration is closed again on drop.
        match direction {
            PortDirection::Input => {
                let input = new_input().map_err(|err| unavailable(direction, err))?;
                select_input_port(&input, config)
                    .map(|_| ())
                    .ok_or_else(|| unavailable(direction, "no matching input port"))
            }
            PortDirection::Output => {
                let output =
                    MidiOutput::new(CLIENT_NAME).map_err(|err| unavailable(direction, err))?;
                select_output_port(&output, config)
                    .map(|_| ())
                    .ok_or_else(|| unavailable(direction, "no matching output port"))
            }
        }
    }

    fn open(
        &self,
        direction: PortDirection,
        _voices: u16,
        config: &SoundConfig,
    ) -> DriverResult<Box<dyn MidiPort>> {
        match direction {
            PortDirection::Input => {
                let input = new_input().map_err(|err| open_failed(direction, err))?;
                let (port, port_name) = select_input_port(&input, config)
                    .ok_or_else(|| open_failed(direction, "no matching input port"))?;
                let (tx, rx) = mpsc::channel();
                let connection = input
                    .connect(
                        &port,
                        CLIENT_NAME,
                        move |micros, message, _context: &mut ()| {
                            log::trace!("Received MIDI input: {micros} {message:02x?}");
                            for &byte in message {
                                tx.send(byte).ok();
                            }
                        },
                        (),
                    )
                    .map_err(|err| open_failed(direction, err))?;
                Ok(Box::new(MidirPort {
                    description: port_name,
                    direction,
                    stream: Stream::Input {
                        _connection: connection,
                        rx,
                    },
                }))
            }
            PortDirection::Output => {
                let output =
                    MidiOutput::new(CLIENT_NAME).map_err(|err| open_failed(direction, err))?;
                let (port, port_name) = select_output_port(&output, config)
                    .ok_or_else(|| open_failed(direction, "no matching output port"))?;
                let connection = output
                    .connect(&port, CLIENT_NAME)
                    .map_err(|err| open_failed(direction, err))?;
                Ok(Box::new(MidirPort {
                    description: port_name,
                    direction,
                    stream: Stream::Output {
                        connection,
                        assembler: MessageAssembler::new(),
                    },
                }))
            }
        }
    }
}

enum Stream {
    Output {
        connection: MidiOutputConnection,
        assembler: MessageAssembler,
    },
    Input {
        // Kept alive for the lifetime of the port; bytes arrive
        // through the queue.
        _connection: MidiInputConnection<()>,
        rx: Receiver<u8>,
    },
}

/// Reassembles the byte-wise output stream into complete MIDI messages.
///
/// `midir` transmits whole messages, but the raw-output contract hands
/// over one byte at a time. Bytes are buffered until a message is
/// complete; running status is honored for channel messages and system
/// real-time bytes pass through immediately.
#[derive(Debug)]
struct MessageAssembler {
    buf: Vec<u8>,
    out: Vec<u8>,
    one_shot: [u8; 1],
    running_status: Option<u8>,
}

/// Message length implied by a status byte, zero for system exclusive.
const fn message_len(status: u8) -> usize {
    match status {
        0xc0..=0xdf | 0xf1 | 0xf3 => 2,
        0xf2 => 3,
        0xf4..=0xf6 => 1,
        0xf0 => 0,
        _ => 3,
    }
}

impl MessageAssembler {
    fn new() -> Self {
        Self {
            buf: Vec::with_capacity(8),
            out: Vec::with_capacity(8),
            one_shot: [0],
            running_status: None,
        }
    }

    /// Accepts the next output byte and returns the message it completes,
    /// if any. Stray data bytes without a running status are dropped.
    fn push(&mut self, byte: u8) -> Option<&[u8]> {
        if byte >= 0xf8 {
            // System real-time, passes through even between the bytes
            // of another message.
            self.one_shot = [byte];
            return Some(&self.one_shot);
        }
        if byte == 0xf7 {
            // EOX terminates a system exclusive message. Without one in
            // progress it terminates nothing and is dropped.
            if self.buf.first() == Some(&0xf0) {
                self.buf.push(byte);
                return Some(self.complete());
            }
            self.buf.clear();
            return None;
        }
        if byte >= 0x80 {
            // A status byte aborts any partial message.
            self.buf.clear();
            self.buf.push(byte);
            // System common messages clear the running status.
            self.running_status = if byte < 0xf0 { Some(byte) } else { None };
        } else {
            if self.buf.is_empty() {
                let status = self.running_status?;
                self.buf.push(status);
            }
            self.buf.push(byte);
        }
        let status = self.buf[0];
        if status != 0xf0 && self.buf.len() == message_len(status) {
            return Some(self.complete());
        }
        None
    }

    fn complete(&mut self) -> &[u8] {
        std::mem::swap(&mut self.buf, &mut self.out);
        self.buf.clear();
        &self.out
    }
}

#[allow(missing_debug_implementations)]
pub struct MidirPort {
    description: String,
    direction: PortDirection,
    stream: Stream,
}

impl MidiPort for MidirPort {
    fn description(&self) -> &str {
        &self.description
    }

    fn direction(&self) -> PortDirection {
        self.direction
    }

    fn put_byte(&mut self, data: u8) {
        if let Stream::Output {
            connection,
            assembler,
        } = &mut self.stream
        {
            // Errors are dropped by contract; this path must not stall
            // the caller.
            if let Some(message) = assembler.push(data) {
                connection.send(message).ok();
            }
        }
    }

    fn poll_byte(&mut self) -> Option<u8> {
        match &mut self.stream {
            Stream::Output { .. } => None,
            Stream::Input { rx, .. } => rx.try_recv().ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(assembler: &mut MessageAssembler, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut messages = Vec::new();
        for &byte in bytes {
            if let Some(message) = assembler.push(byte) {
                messages.push(message.to_vec());
            }
        }
        messages
    }

    #[test]
    fn assembles_three_byte_channel_message() {
        let mut assembler = MessageAssembler::new();
        assert_eq!(None, assembler.push(0x90));
        assert_eq!(None, assembler.push(60));
        assert_eq!(Some(&[0x90, 60, 100][..]), assembler.push(100));
    }

    #[test]
    fn assembles_two_byte_channel_message() {
        let mut assembler = MessageAssembler::new();
        assert_eq!(
            vec![vec![0xc0, 5]],
            feed(&mut assembler, &[0xc0, 5])
        );
    }

    #[test]
    fn honors_running_status() {
        let mut assembler = MessageAssembler::new();
        let messages = feed(&mut assembler, &[0x90, 60, 100, 64, 100, 0x80, 60, 0]);
        assert_eq!(
            vec![
                vec![0x90, 60, 100],
                vec![0x90, 64, 100],
                vec![0x80, 60, 0],
            ],
            messages
        );
    }

    #[test]
    fn real_time_bytes_pass_through_mid_message() {
        let mut assembler = MessageAssembler::new();
        let messages = feed(&mut assembler, &[0x90, 60, 0xf8, 100]);
        assert_eq!(vec![vec![0xf8], vec![0x90, 60, 100]], messages);
    }

    #[test]
    fn stray_data_bytes_are_dropped() {
        let mut assembler = MessageAssembler::new();
        assert_eq!(None, assembler.push(60));
        // A later complete message still assembles.
        let messages = feed(&mut assembler, &[0x90, 60, 100]);
        assert_eq!(vec![vec![0x90, 60, 100]], messages);
    }

    #[test]
    fn assembles_system_exclusive() {
        let mut assembler = MessageAssembler::new();
        let messages = feed(&mut assembler, &[0xf0, 0x7e, 0x7f, 0x06, 0x01, 0xf7]);
        assert_eq!(vec![vec![0xf0, 0x7e, 0x7f, 0x06, 0x01, 0xf7]], messages);
    }

    #[test]
    fn system_common_clears_running_status() {
        let mut assembler = MessageAssembler::new();
        let messages = feed(&mut assembler, &[0x90, 60, 100, 0xf6, 64, 100]);
        // Tune request goes out alone, the trailing data bytes are dropped.
        assert_eq!(vec![vec![0x90, 60, 100], vec![0xf6]], messages);
    }

    #[test]
    fn stray_eox_is_dropped() {
        let mut assembler = MessageAssembler::new();
        assert_eq!(None, assembler.push(0xf7));
        let messages = feed(&mut assembler, &[0x90, 60, 100]);
        assert_eq!(vec![vec![0x90, 60, 100]], messages);
    }

    #[test]
    fn negative_port_index_falls_back_to_zero() {
        let mut config = SoundConfig::default();
        config.set(MIDIR_OUTPUT_PORT, "-1");
        assert_eq!(
            PortIndex(0),
            configured_port_index(&config, MIDIR_OUTPUT_PORT)
        );

        config.set(MIDIR_OUTPUT_PORT, "2");
        assert_eq!(
            PortIndex(2),
            configured_port_index(&config, MIDIR_OUTPUT_PORT)
        );
    }
}
