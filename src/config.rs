// SPDX-FileCopyrightText: The midio authors
// SPDX-License-Identifier: MPL-2.0

//! The "sound" configuration section.
//!
//! Backends resolve their device addressing from a flat key–value store
//! that the embedding application populates, falling back to subsystem
//! defaults for absent keys. Loading and persisting configuration files
//! is the application's concern, not this crate's.

use std::collections::BTreeMap;

/// Selects a driver explicitly instead of probing, see
/// [`DriverRegistry::configured_driver`](crate::DriverRegistry::configured_driver).
pub const MIDI_DRIVER: &str = "midi_driver";

/// ALSA card index for the output direction.
pub const ALSA_RAWMIDI_CARD: &str = "alsa_rawmidi_card";
/// ALSA device index for the output direction.
pub const ALSA_RAWMIDI_DEVICE: &str = "alsa_rawmidi_device";
/// ALSA card index for the input direction.
pub const ALSA_INPUT_CARD: &str = "alsa_input_card";
/// ALSA device index for the input direction.
pub const ALSA_RAWMIDI_INPUT_DEVICE: &str = "alsa_rawmidi_input_device";

/// Name prefix selecting a `midir` port, both directions.
pub const MIDIR_PORT_NAME: &str = "midir_port_name";
/// Port index used when no name prefix is configured or matches.
pub const MIDIR_OUTPUT_PORT: &str = "midir_output_port";
pub const MIDIR_INPUT_PORT: &str = "midir_input_port";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoundConfig {
    entries: BTreeMap<String, String>,
}

impl SoundConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Integer lookup with a default for absent keys.
    ///
    /// A present but malformed value also falls back to the default.
    #[must_use]
    pub fn get_int(&self, key: &str, default: i32) -> i32 {
        let Some(value) = self.get_str(key) else {
            return default;
        };
        match value.trim().parse() {
            Ok(int) => int,
            Err(_) => {
                log::warn!("Ignoring malformed config value for \"{key}\": \"{value}\"");
                default
            }
        }
    }
}

impl<K, V> FromIterator<(K, V)> for SoundConfig
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}
