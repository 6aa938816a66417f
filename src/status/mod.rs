// Status file: a fixed 4-line textual snapshot, rewritten every iteration.
// No locking - a reader racing the writer sees either the old or the new
// snapshot in full, never a torn mix, because each write replaces the
// whole file content in one go.

use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_STATUS_PATH: &str = "/var/run/earlyoom/status";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Term,
    Kill,
    Emergency,
    High,
}

impl Status {
    fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Term => "term",
            Self::Kill => "kill",
            Self::Emergency => "emergency",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StatusSnapshot {
    pub status: Status,
    pub mem_available_pct: f64,
    pub setpoint_pct: f64,
    pub epoch_secs: u64,
}

impl StatusSnapshot {
    pub fn now(status: Status, mem_available_pct: f64, setpoint_pct: f64) -> Self {
        let epoch_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            status,
            mem_available_pct,
            setpoint_pct,
            epoch_secs,
        }
    }

    pub fn render(&self) -> String {
        format!(
            "{}\n{:.2}\n{:.2}\n{}\n",
            self.status.as_str(),
            self.mem_available_pct,
            self.setpoint_pct,
            self.epoch_secs
        )
    }

    pub fn write_to(&self, path: &str) -> std::io::Result<()> {
        fs::write(path, self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_has_four_lines() {
        let snap = StatusSnapshot {
            status: Status::Kill,
            mem_available_pct: 3.25,
            setpoint_pct: 5.0,
            epoch_secs: 1_700_000_000,
        };
        let rendered = snap.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "kill");
        assert_eq!(lines[1], "3.25");
        assert_eq!(lines[2], "5.00");
        assert_eq!(lines[3], "1700000000");
    }

    #[test]
    fn test_write_to_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status");
        let snap = StatusSnapshot::now(Status::Ok, 42.0, 10.0);
        snap.write_to(path.to_str().unwrap()).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().next(), Some("ok"));
    }
}
