// SPDX-FileCopyrightText: The midio authors
// SPDX-License-Identifier: MPL-2.0

//! ALSA raw MIDI devices, addressed by card/device index.
//!
//! Output handles are opened in blocking mode and drained before close;
//! input handles are opened non-blocking to match the poll-style read
//! contract.

use std::io::{Read as _, Write as _};

use alsa::{rawmidi::Rawmidi, Direction};

use crate::{
    config::{
        ALSA_INPUT_CARD, ALSA_RAWMIDI_CARD, ALSA_RAWMIDI_DEVICE, ALSA_RAWMIDI_INPUT_DEVICE,
    },
    DriverDescriptor, DriverError, DriverId, DriverResult, MidiBackend, MidiPort, PortDirection,
    SoundConfig,
};

pub const DRIVER_DESCRIPTOR: &DriverDescriptor = &DriverDescriptor {
    id: DriverId::AlsaRawmidi,
    short_name: "alsa-rawmidi",
    name: "ALSA RawMIDI",
};

/// Subsystem default card index when the configuration is silent.
pub const DEFAULT_CARD: i32 = 0;
/// Subsystem default device index when the configuration is silent.
pub const DEFAULT_DEVICE: i32 = 0;

#[derive(Debug, Clone, Copy, Default)]
pub struct AlsaRawmidiBackend;

impl AlsaRawmidiBackend {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Resolves the `hw:CARD,DEV` device specifier for `direction`.
fn device_spec(direction: PortDirection, config: &SoundConfig) -> String {
    let (card, device) = match direction {
        PortDirection::Input => (
            config.get_int(ALSA_INPUT_CARD, DEFAULT_CARD),
            config.get_int(ALSA_RAWMIDI_INPUT_DEVICE, DEFAULT_DEVICE),
        ),
        PortDirection::Output => (
            config.get_int(ALSA_RAWMIDI_CARD, DEFAULT_CARD),
            config.get_int(ALSA_RAWMIDI_DEVICE, DEFAULT_DEVICE),
        ),
    };
    format!("hw:{card},{device}")
}

const fn stream_direction(direction: PortDirection) -> Direction {
    match direction {
        PortDirection::Input => Direction::Capture,
        PortDirection::Output => Direction::Playback,
    }
}

impl MidiBackend for AlsaRawmidiBackend {
    fn descriptor(&self) -> &DriverDescriptor {
        DRIVER_DESCRIPTOR
    }

    fn detect(&self, direction: PortDirection, config: &SoundConfig) -> DriverResult<()> {
        let spec = device_spec(direction, config);
        // Probe only: the handle is closed again before returning.
        match Rawmidi::new(&spec, stream_direction(direction), true) {
            Ok(handle) => {
                drop(handle);
                Ok(())
            }
            Err(err) => Err(DriverError::Unavailable {
                direction,
                msg: format!("{spec}: {err}").into(),
            }),
        }
    }

    fn open(
        &self,
        direction: PortDirection,
        _voices: u16,
        config: &SoundConfig,
    ) -> DriverResult<Box<dyn MidiPort>> {
        let spec = device_spec(direction, config);
        let nonblock = direction == PortDirection::Input;
        let handle = Rawmidi::new(&spec, stream_direction(direction), nonblock).map_err(|err| {
            DriverError::Open {
                direction,
                msg: format!("{spec}: {err}").into(),
            }
        })?;
        let description = handle
            .info()
            .and_then(|info| info.get_name())
            .unwrap_or_else(|_| spec);
        Ok(Box::new(AlsaRawmidiPort {
            handle,
            description,
            direction,
        }))
    }
}

#[allow(missing_debug_implementations)]
pub struct AlsaRawmidiPort {
    handle: Rawmidi,
    description: String,
    direction: PortDirection,
}

impl MidiPort for AlsaRawmidiPort {
    fn description(&self) -> &str {
        &self.description
    }

    fn direction(&self) -> PortDirection {
        self.direction
    }

    fn put_byte(&mut self, data: u8) {
        // Errors are dropped by contract; this path must not stall
        // the caller.
        self.handle.io().write_all(&[data]).ok();
    }

    fn poll_byte(&mut self) -> Option<u8> {
        let mut buf = [0u8; 1];
        match self.handle.io().read(&mut buf) {
            Ok(1) => Some(buf[0]),
            _ => None,
        }
    }

    fn drain(&mut self) {
        if self.direction == PortDirection::Output {
            self.handle.drain().ok();
        }
    }
}

impl Drop for AlsaRawmidiPort {
    fn drop(&mut self) {
        // Flush pending output before the handle is closed.
        if self.direction == PortDirection::Output {
            self.handle.drain().ok();
        }
    }
}
