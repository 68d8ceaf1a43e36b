use synthcheck::{audio, serial, stimulus};

/// Comma-separated audio device names that replace hardware enumeration.
const TEST_DEVICES_ENV: &str = "SYNTHCHECK_TEST_DEVICES";

pub(crate) fn parse_device_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn print_section(title: &str, entries: &[String]) {
    if entries.is_empty() {
        println!("No {title} detected.");
    } else {
        println!("Available {title}:");
        for entry in entries {
            println!("  - {entry}");
        }
    }
}

pub(crate) fn list_devices() {
    if let Ok(raw) = std::env::var(TEST_DEVICES_ENV) {
        print_section("serial ports", &[]);
        print_section("audio devices", &parse_device_list(&raw));
        print_section("MIDI outputs", &[]);
        return;
    }

    let ports = serial::list_serial_ports()
        .map(|ports| {
            ports
                .into_iter()
                .map(|port| format!("{} ({})", port.port_name, port.description))
                .collect::<Vec<_>>()
        })
        .unwrap_or_else(|err| {
            eprintln!("Failed to list serial ports: {err}");
            Vec::new()
        });
    print_section("serial ports", &ports);

    let devices = audio::list_devices()
        .map(|devices| {
            devices
                .into_iter()
                .map(|device| {
                    format!(
                        "{} (in: {}, out: {})",
                        device.name, device.input_channel_count, device.output_channel_count
                    )
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_else(|err| {
            eprintln!("Failed to list audio devices: {err}");
            Vec::new()
        });
    print_section("audio devices", &devices);

    let midi = stimulus::list_ports().unwrap_or_else(|err| {
        eprintln!("Failed to list MIDI outputs: {err}");
        Vec::new()
    });
    print_section("MIDI outputs", &midi);
}
