// SPDX-FileCopyrightText: The midio authors
// SPDX-License-Identifier: MPL-2.0

use crate::{
    config::MIDI_DRIVER, drivers, DriverError, DriverId, DriverResult, MidiBackend, MidiPort,
    PortDirection, SoundConfig,
};

/// Ordered collection of the selectable backends.
///
/// Detection walks the registration order, so platform-native backends
/// should be registered first and the null fallback last, which is what
/// [`DriverRegistry::new`] does.
#[allow(missing_debug_implementations)]
pub struct DriverRegistry {
    backends: Vec<Box<dyn MidiBackend>>,
    last_error: Option<String>,
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverRegistry {
    /// Registry with all backends enabled at build time.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for backend in drivers::default_backends() {
            registry.register(backend);
        }
        registry
    }

    /// Registry without any backends.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            backends: Vec::new(),
            last_error: None,
        }
    }

    pub fn register(&mut self, backend: Box<dyn MidiBackend>) {
        log::debug!(
            "Registered MIDI driver `{id}`",
            id = backend.descriptor().id
        );
        self.backends.push(backend);
    }

    pub fn backends(&self) -> impl Iterator<Item = &dyn MidiBackend> + '_ {
        self.backends.iter().map(|backend| backend.as_ref())
    }

    #[must_use]
    pub fn find(&self, id: DriverId) -> Option<&dyn MidiBackend> {
        self.backends()
            .find(|backend| backend.descriptor().id == id)
    }

    /// Driver explicitly selected through the `midi_driver` config key.
    ///
    /// Unknown driver names are ignored, like any other malformed config
    /// value.
    #[must_use]
    pub fn configured_driver(config: &SoundConfig) -> Option<DriverId> {
        let value = config.get_str(MIDI_DRIVER)?;
        match value.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                log::warn!("Ignoring unknown `{MIDI_DRIVER}` value \"{value}\"");
                None
            }
        }
    }

    /// First registered driver whose probe succeeds for `direction`.
    pub fn detect_first(
        &mut self,
        direction: PortDirection,
        config: &SoundConfig,
    ) -> Option<DriverId> {
        for backend in &self.backends {
            let id = backend.descriptor().id;
            match backend.detect(direction, config) {
                Ok(()) => {
                    log::debug!("Detected {direction} device for driver `{id}`");
                    return Some(id);
                }
                Err(err) => {
                    log::debug!("Driver `{id}` detected no {direction} device: {err}");
                    self.last_error = Some(err.to_string());
                }
            }
        }
        None
    }

    /// Opens a port through the driver registered for `id`.
    pub fn open(
        &mut self,
        id: DriverId,
        direction: PortDirection,
        voices: u16,
        config: &SoundConfig,
    ) -> DriverResult<Box<dyn MidiPort>> {
        let Some(backend) = self
            .backends
            .iter()
            .find(|backend| backend.descriptor().id == id)
        else {
            let err = DriverError::NotRegistered(id);
            self.last_error = Some(err.to_string());
            return Err(err);
        };
        match backend.open(direction, voices, config) {
            Ok(port) => {
                log::debug!(
                    "Opened {direction} port \"{description}\" via driver `{id}`",
                    description = port.description()
                );
                Ok(port)
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Opens a port through the first driver that both detects and opens.
    ///
    /// A driver selected through the `midi_driver` config key takes
    /// precedence over the registration order and is not probed first.
    pub fn open_first(
        &mut self,
        direction: PortDirection,
        voices: u16,
        config: &SoundConfig,
    ) -> DriverResult<Box<dyn MidiPort>> {
        if let Some(id) = Self::configured_driver(config) {
            return self.open(id, direction, voices, config);
        }
        for backend in &self.backends {
            let id = backend.descriptor().id;
            if let Err(err) = backend.detect(direction, config) {
                log::debug!("Driver `{id}` detected no {direction} device: {err}");
                self.last_error = Some(err.to_string());
                continue;
            }
            match backend.open(direction, voices, config) {
                Ok(port) => {
                    log::debug!(
                        "Opened {direction} port \"{description}\" via driver `{id}`",
                        description = port.description()
                    );
                    return Ok(port);
                }
                Err(err) => {
                    log::warn!("Driver `{id}` detected a {direction} device but failed to open it: {err}");
                    self.last_error = Some(err.to_string());
                }
            }
        }
        Err(DriverError::Unavailable {
            direction,
            msg: "no usable MIDI driver".into(),
        })
    }

    /// The most recent failure, formatted for display.
    ///
    /// Overwritten by every failing detect or open that goes through the
    /// registry; successful calls leave it untouched.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::{drivers::null::NullBackend, DriverDescriptor};

    const MOCK_DESCRIPTOR: &DriverDescriptor = &DriverDescriptor {
        id: DriverId::Midir,
        short_name: "mock",
        name: "Mock driver",
    };

    /// Backend that counts probes and keeps a gauge of open handles.
    struct MockBackend {
        available: bool,
        probes: Arc<AtomicUsize>,
        open_handles: Arc<AtomicUsize>,
    }

    struct MockPort {
        open_handles: Arc<AtomicUsize>,
    }

    impl MockBackend {
        fn new(available: bool) -> Self {
            Self {
                available,
                probes: Arc::new(AtomicUsize::new(0)),
                open_handles: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl MidiBackend for MockBackend {
        fn descriptor(&self) -> &DriverDescriptor {
            MOCK_DESCRIPTOR
        }

        fn detect(&self, direction: PortDirection, _config: &SoundConfig) -> DriverResult<()> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.available {
                Ok(())
            } else {
                Err(DriverError::Unavailable {
                    direction,
                    msg: "mock device absent".into(),
                })
            }
        }

        fn open(
            &self,
            direction: PortDirection,
            _voices: u16,
            _config: &SoundConfig,
        ) -> DriverResult<Box<dyn MidiPort>> {
            if !self.available {
                return Err(DriverError::Open {
                    direction,
                    msg: "mock device absent".into(),
                });
            }
            self.open_handles.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockPort {
                open_handles: Arc::clone(&self.open_handles),
            }))
        }
    }

    impl MidiPort for MockPort {
        fn description(&self) -> &str {
            "Mock device"
        }

        fn direction(&self) -> PortDirection {
            PortDirection::Output
        }

        fn put_byte(&mut self, _data: u8) {}
    }

    impl Drop for MockPort {
        fn drop(&mut self) {
            self.open_handles.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn detect_first_walks_registration_order() {
        let absent = MockBackend::new(false);
        let probes = Arc::clone(&absent.probes);
        let mut registry = DriverRegistry::empty();
        registry.register(Box::new(absent));
        registry.register(Box::new(NullBackend::new()));

        let config = SoundConfig::default();
        let detected = registry.detect_first(PortDirection::Output, &config);
        assert_eq!(Some(DriverId::None), detected);
        assert_eq!(1, probes.load(Ordering::SeqCst));
    }

    #[test]
    fn probe_leaves_no_handle_open() {
        let backend = MockBackend::new(true);
        let open_handles = Arc::clone(&backend.open_handles);
        let mut registry = DriverRegistry::empty();
        registry.register(Box::new(backend));

        let config = SoundConfig::default();
        assert_eq!(
            Some(DriverId::Midir),
            registry.detect_first(PortDirection::Output, &config)
        );
        assert_eq!(0, open_handles.load(Ordering::SeqCst));
    }

    #[test]
    fn open_and_drop_round_trips_resource_state() {
        let backend = MockBackend::new(true);
        let open_handles = Arc::clone(&backend.open_handles);
        let mut registry = DriverRegistry::empty();
        registry.register(Box::new(backend));

        let config = SoundConfig::default();
        let port = registry
            .open(DriverId::Midir, PortDirection::Output, 16, &config)
            .unwrap();
        assert_eq!(1, open_handles.load(Ordering::SeqCst));
        drop(port);
        assert_eq!(0, open_handles.load(Ordering::SeqCst));
    }

    #[test]
    fn open_unregistered_driver_fails() {
        let mut registry = DriverRegistry::empty();
        registry.register(Box::new(NullBackend::new()));

        let config = SoundConfig::default();
        let err = registry
            .open(DriverId::Midir, PortDirection::Output, 0, &config)
            .err()
            .unwrap();
        assert!(matches!(err, DriverError::NotRegistered(DriverId::Midir)));
    }

    #[test]
    fn failing_detect_records_last_error() {
        let mut registry = DriverRegistry::empty();
        registry.register(Box::new(MockBackend::new(false)));

        let config = SoundConfig::default();
        assert!(registry.last_error().is_none());
        assert_eq!(None, registry.detect_first(PortDirection::Input, &config));
        let last_error = registry.last_error().unwrap();
        assert!(last_error.contains("mock device absent"));
    }

    #[test]
    fn open_first_skips_undetected_drivers() {
        let mut registry = DriverRegistry::empty();
        registry.register(Box::new(MockBackend::new(false)));
        registry.register(Box::new(NullBackend::new()));

        let config = SoundConfig::default();
        let port = registry
            .open_first(PortDirection::Output, 16, &config)
            .unwrap();
        assert_eq!("No MIDI device", port.description());
    }

    #[test]
    fn open_first_without_usable_driver_fails() {
        let mut registry = DriverRegistry::empty();
        registry.register(Box::new(MockBackend::new(false)));

        let config = SoundConfig::default();
        let err = registry
            .open_first(PortDirection::Output, 16, &config)
            .err()
            .unwrap();
        assert!(matches!(err, DriverError::Unavailable { .. }));
    }

    #[test]
    fn configured_driver_takes_precedence() {
        let mut registry = DriverRegistry::empty();
        registry.register(Box::new(MockBackend::new(true)));
        registry.register(Box::new(NullBackend::new()));

        let mut config = SoundConfig::default();
        config.set(MIDI_DRIVER, "none");
        let port = registry
            .open_first(PortDirection::Output, 16, &config)
            .unwrap();
        assert_eq!("No MIDI device", port.description());
    }

    #[test]
    fn unknown_configured_driver_is_ignored() {
        let mut config = SoundConfig::default();
        config.set(MIDI_DRIVER, "gravis-ultrasound");
        assert_eq!(None, DriverRegistry::configured_driver(&config));

        config.set(MIDI_DRIVER, "alsa-rawmidi");
        assert_eq!(
            Some(DriverId::AlsaRawmidi),
            DriverRegistry::configured_driver(&config)
        );
    }

    #[test]
    fn find_by_id() {
        let registry = {
            let mut registry = DriverRegistry::empty();
            registry.register(Box::new(NullBackend::new()));
            registry
        };
        assert!(registry.find(DriverId::None).is_some());
        assert!(registry.find(DriverId::AlsaRawmidi).is_none());
    }
}
