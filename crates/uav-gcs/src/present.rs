use std::io::Write;

use time::macros::format_description;
use time::OffsetDateTime;
use uav_proto::telemetry::TelemetryMessage;

pub const WAITING_LINE: &str = ">>> waiting for UAV telemetry... <<<";

/// Presentation collaborator, fed a snapshot of the telemetry cell on
/// every refresh.
pub trait TelemetryView: Send {
    fn render(&mut self, snapshot: Option<&TelemetryMessage>);
}

/// Clears the terminal and prints the panel.
#[derive(Debug, Default)]
pub struct ConsolePanel;

impl TelemetryView for ConsolePanel {
    fn render(&mut self, snapshot: Option<&TelemetryMessage>) {
        let mut out = std::io::stdout().lock();
        // A closed stdout is not worth killing the loop over.
        let _ = write!(out, "\x1b[2J\x1b[H{}", render_panel(snapshot));
        let _ = out.flush();
    }
}

pub fn render_panel(snapshot: Option<&TelemetryMessage>) -> String {
    let Some(t) = snapshot else {
        return format!("{WAITING_LINE}\n");
    };

    let rule = "=".repeat(50);
    let mut s = String::new();
    s.push_str(&format!("{rule}\n"));
    s.push_str("         GROUND CONTROL STATION (GCS)\n");
    s.push_str(&format!("{rule}\n"));
    s.push_str(" Link: >> LIVE STREAM <<\n");
    s.push_str(&format!(" Last update: {}\n", clock(t.timestamp)));
    s.push_str(&format!("{rule}\n"));
    s.push_str(" [STATUS]\n");
    s.push_str(&format!("   Battery: {}%\n", t.battery));
    s.push_str(&format!("   Flight:  {}\n", t.status.label()));
    s.push_str(&format!("   Speed:   {:.2} m/s\n", t.speed));
    s.push_str(&format!("{rule}\n"));
    s.push_str(" [POSITION]\n");
    s.push_str(&format!("   X: {:.2}\n", t.position.x));
    s.push_str(&format!("   Y: {:.2}\n", t.position.y));
    s.push_str(&format!("   Z (altitude): {:.2} m\n", t.position.z));
    s.push_str(&format!("{rule}\n"));
    s.push_str("\n* Press Ctrl-C to exit.\n");
    s
}

/// HH:MM:SS (UTC) of a unix-seconds timestamp.
fn clock(ts: f64) -> String {
    let fmt = format_description!("[hour]:[minute]:[second]");
    OffsetDateTime::from_unix_timestamp_nanos((ts * 1e9) as i128)
        .ok()
        .and_then(|t| t.format(fmt).ok())
        .unwrap_or_else(|| "--:--:--".to_string())
}
