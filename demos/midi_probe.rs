// SPDX-FileCopyrightText: The midio authors
// SPDX-License-Identifier: MPL-2.0

//! Lists the registered drivers, probes them, opens the first usable
//! output port, and plays a short note.

use std::{thread::sleep, time::Duration};

use midio::{DriverRegistry, PortDirection, SoundConfig};

fn main() {
    pretty_env_logger::init();
    match run() {
        Ok(()) => (),
        Err(err) => println!("Error: {err}"),
    }
}

fn run() -> anyhow::Result<()> {
    let config = SoundConfig::default();
    let mut registry = DriverRegistry::new();

    println!("Registered drivers:");
    for backend in registry.backends() {
        let descriptor = backend.descriptor();
        let detected = backend.detect(PortDirection::Output, &config).is_ok();
        println!(
            "  {short_name}: {name} (output detected: {detected})",
            short_name = descriptor.short_name,
            name = descriptor.name,
        );
    }

    let mut port = registry.open_first(PortDirection::Output, 16, &config)?;
    println!(
        "Opened output port: {description}",
        description = port.description()
    );

    // Note on, middle C, mezzo-forte.
    for byte in [0x90, 60, 100] {
        port.put_byte(byte);
    }
    sleep(Duration::from_millis(500));
    // Note off.
    for byte in [0x80, 60, 0] {
        port.put_byte(byte);
    }
    port.drain();
    Ok(())
}
