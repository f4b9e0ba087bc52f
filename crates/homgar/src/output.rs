//! Output formatting: device table, JSON, watch lines.

use std::io::{self, Write};

use tabled::{Table, Tabled, settings::Style};

use homgar_core::{Device, DeviceTable};

// ── Rows ─────────────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "KEY")]
    key: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "MODEL")]
    model: String,
    #[tabled(rename = "CONNECTED")]
    connected: String,
    #[tabled(rename = "RSSI")]
    rssi: String,
    #[tabled(rename = "READINGS")]
    readings: String,
}

impl From<&Device> for DeviceRow {
    fn from(device: &Device) -> Self {
        Self {
            key: device.key.clone(),
            name: device.name.clone(),
            model: device
                .model
                .clone()
                .unwrap_or_else(|| device.family().to_string()),
            connected: match device.connected {
                Some(true) => "yes".into(),
                Some(false) => "no".into(),
                None => "-".into(),
            },
            rssi: device
                .rssi
                .map_or_else(|| "-".into(), |r| format!("{r} dBm")),
            readings: readings_text(device, "\n"),
        }
    }
}

fn readings_text(device: &Device, separator: &str) -> String {
    device
        .readings()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}

// ── Renderers ────────────────────────────────────────────────────────

/// Pretty table of every device, ordered by key.
pub fn render_table(table: &DeviceTable) -> String {
    let rows: Vec<DeviceRow> = table.values().map(|d| DeviceRow::from(d.as_ref())).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Pretty-printed JSON array of devices.
pub fn render_json(table: &DeviceTable) -> Result<String, serde_json::Error> {
    let devices: Vec<&Device> = table.values().map(AsRef::as_ref).collect();
    serde_json::to_string_pretty(&devices)
}

/// One line for a device in the watch stream.
pub fn render_update(timestamp: &str, device: &Device) -> String {
    let readings = readings_text(device, " ");
    if readings.is_empty() {
        format!("{timestamp} {} ({})", device.key, device.name)
    } else {
        format!("{timestamp} {} ({}) {readings}", device.key, device.name)
    }
}

/// Keys whose device differs between two tables, new keys included.
pub fn changed_keys<'a>(before: &DeviceTable, after: &'a DeviceTable) -> Vec<&'a str> {
    after
        .iter()
        .filter(|(key, device)| before.get(*key).is_none_or(|old| old != *device))
        .map(|(key, _)| key.as_str())
        .collect()
}

pub fn print_output(output: &str) {
    if output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}
