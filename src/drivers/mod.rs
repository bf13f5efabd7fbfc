// SPDX-FileCopyrightText: The midio authors
// SPDX-License-Identifier: MPL-2.0

//! The selectable backends.
//!
//! Backends are mutually exclusive views onto the platform's MIDI
//! subsystem. All of them implement the same narrow contract, see
//! [`MidiBackend`](crate::MidiBackend).

use crate::MidiBackend;

pub mod null;

#[cfg(feature = "midir")]
pub mod midir;

#[cfg(all(target_os = "linux", feature = "alsa-rawmidi"))]
pub mod alsa_rawmidi;

/// All backends enabled at build time, in detection priority order:
/// platform-native first, the null fallback last.
#[must_use]
pub fn default_backends() -> Vec<Box<dyn MidiBackend>> {
    let mut backends: Vec<Box<dyn MidiBackend>> = Vec::new();
    #[cfg(all(target_os = "linux", feature = "alsa-rawmidi"))]
    backends.push(Box::new(alsa_rawmidi::AlsaRawmidiBackend::new()));
    #[cfg(feature = "midir")]
    backends.push(Box::new(midir::MidirBackend::new()));
    backends.push(Box::new(null::NullBackend::new()));
    backends
}
