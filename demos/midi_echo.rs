// SPDX-FileCopyrightText: The midio authors
// SPDX-License-Identifier: MPL-2.0

//! Echoes every byte received on the first usable input port back to the
//! first usable output port.

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

    let mut input = registry.open_first(PortDirection::Input, 0, &config)?;
    let mut output = registry.open_first(PortDirection::Output, 0, &config)?;
    println!(
        "Echoing {input} -> {output}, press CTRL-C to exit...",
        input = input.description(),
        output = output.description(),
    );

    loop {
        while let Some(byte) = input.poll_byte() {
            output.put_byte(byte);
        }
        sleep(Duration::from_millis(1));
    }
}
