// SPDX-FileCopyrightText: The midio authors
// SPDX-License-Identifier: MPL-2.0

use std::borrow::Cow;

use thiserror::Error;

use crate::SoundConfig;


/// Direction of a raw MIDI byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

/// Identifies one of the selectable backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum DriverId {
    /// Fallback driver without a device behind it.
    None,
    /// Portable backend driven by `midir`.
    Midir,
    /// ALSA raw MIDI devices, addressed by card/device index.
    AlsaRawmidi,
}

/// Index of a port within a backend's enumeration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::From)]
#[display("{_0}")]
pub struct PortIndex(pub usize);

/// Immutable identity of a backend.
///
/// The runtime device description is deliberately not part of the
/// descriptor. It depends on the opened device and therefore lives on
/// [`MidiPort::description`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverDescriptor {
    pub id: DriverId,
    /// Short name used in configuration and logs, e.g. "alsa-rawmidi".
    pub short_name: &'static str,
    /// Human-readable name, e.g. "ALSA RawMIDI".
    pub name: &'static str,
}

#[derive(Debug, Error)]
pub enum DriverError {
    /// The probe could not open a device in the requested direction.
    #[error("no {direction} device detected: {msg}")]
    Unavailable {
        direction: PortDirection,
        msg: Cow<'static, str>,
    },
    /// Opening the exclusive device handle failed.
    #[error("could not open {direction} device: {msg}")]
    Open {
        direction: PortDirection,
        msg: Cow<'static, str>,
    },
    /// The requested driver is not registered.
    #[error("driver `{0}` is not registered")]
    NotRegistered(DriverId),
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// A selectable raw MIDI backend.
///
/// Backends are stateless descriptors of a capability. The live hardware
/// handle is the [`MidiPort`] returned by [`MidiBackend::open`] and is
/// released when the port is dropped.
pub trait MidiBackend {
    #[must_use]
    fn descriptor(&self) -> &DriverDescriptor;

    /// Probes whether a port can be opened in `direction`.
    ///
    /// The probe opens the underlying resource briefly and closes it again
    /// before returning. It never leaves a handle open, regardless of the
    /// outcome.
    fn detect(&self, direction: PortDirection, config: &SoundConfig) -> DriverResult<()>;

    /// Opens the exclusive device handle.
    ///
    /// `voices` is a polyphony hint for synthesizer-style backends. Raw
    /// byte-stream backends have no polyphony concept and ignore it.
    ///
    /// On failure no handle is left behind and `Err` is returned; a port is
    /// only ever handed out for a device that actually opened.
    fn open(
        &self,
        direction: PortDirection,
        voices: u16,
        config: &SoundConfig,
    ) -> DriverResult<Box<dyn MidiPort>>;
}

/// A live, exclusively owned MIDI device handle.
///
/// Dropping the port flushes buffered output (for output ports) and
/// releases the device, so a subsequent open can recreate it.
///
/// The capability slots beyond [`put_byte`](Self::put_byte) and
/// [`poll_byte`](Self::poll_byte) carry no-op default bodies. A backend
/// only overrides the slots it supports; calling an unsupported slot is
/// always safe and does nothing, so callers never need a presence check.
pub trait MidiPort: Send {
    /// Human-readable device description.
    ///
    /// Non-empty after a successful open, as reported by the device or its
    /// port name.
    #[must_use]
    fn description(&self) -> &str;

    #[must_use]
    fn direction(&self) -> PortDirection;

    /// Writes exactly one byte to the device, best-effort.
    ///
    /// Write errors are silently dropped by contract: this entry point is
    /// meant to be callable from time-critical code and must not block,
    /// allocate, or force error handling on the caller.
    fn put_byte(&mut self, data: u8);

    /// Non-blocking read of one byte.
    ///
    /// Returns `None` when no byte is pending or the read failed, which
    /// keeps a received zero byte distinguishable from "no data".
    fn poll_byte(&mut self) -> Option<u8> {
        None
    }

    /// Flushes buffered output, best-effort.
    fn drain(&mut self) {}

    // Capability slots for synthesizer-style backends.

    fn load_patches(&mut self, _patches: &[u8], _drums: &[u8]) {}

    fn adjust_patches(&mut self, _patches: &[u8], _drums: &[u8]) {}

    fn key_on(&mut self, _inst: u16, _note: u8, _bend: i16, _vol: u8, _pan: u8) {}

    fn key_off(&mut self, _voice: u16) {}

    fn set_volume(&mut self, _voice: u16, _vol: u8) {}

    fn set_pitch(&mut self, _voice: u16, _note: u8, _bend: i16) {}

    fn set_pan(&mut self, _voice: u16, _pan: u8) {}

    fn set_vibrato(&mut self, _voice: u16, _amount: u8) {}
}
