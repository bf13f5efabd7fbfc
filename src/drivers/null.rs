// SPDX-FileCopyrightText: The midio authors
// SPDX-License-Identifier: MPL-2.0

//! Fallback driver without a device behind it.
//!
//! Always detects, discards all output, and never produces input. Keeping
//! it registered last guarantees that driver selection can always settle
//! on something.

use crate::{
    DriverDescriptor, DriverId, DriverResult, MidiBackend, MidiPort, PortDirection, SoundConfig,
};

pub const DRIVER_DESCRIPTOR: &DriverDescriptor = &DriverDescriptor {
    id: DriverId::None,
    short_name: "none",
    name: "No MIDI device",
};

#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

impl NullBackend {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MidiBackend for NullBackend {
    fn descriptor(&self) -> &DriverDescriptor {
        DRIVER_DESCRIPTOR
    }

    fn detect(&self, _direction: PortDirection, _config: &SoundConfig) -> DriverResult<()> {
        Ok(())
    }

    fn open(
        &self,
        direction: PortDirection,
        _voices: u16,
        _config: &SoundConfig,
    ) -> DriverResult<Box<dyn MidiPort>> {
        Ok(Box::new(NullPort { direction }))
    }
}

#[derive(Debug)]
pub struct NullPort {
    direction: PortDirection,
}

impl MidiPort for NullPort {
    fn description(&self) -> &str {
        DRIVER_DESCRIPTOR.name
    }

    fn direction(&self) -> PortDirection {
        self.direction
    }

    fn put_byte(&mut self, _data: u8) {}
}
