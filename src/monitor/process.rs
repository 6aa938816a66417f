// Per-PID process introspection against /proc

use procfs::process::Process;
use procfs::ProcError;
use std::fs;
use std::path::Path;

/// Wall/CPU time accounting for a single process, all fields in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessTimes {
    pub utime: f64,
    pub stime: f64,
    pub cutime: f64,
    pub cstime: f64,
    pub starttime: f64,
    pub runtime: f64,
}

/// A per-PID read failure. All variants are expected, recoverable
/// conditions during a `/proc` scan: the caller drops the candidate and
/// moves on rather than treating these as fatal.
#[derive(Debug, Clone)]
pub enum ProbeError {
    /// The process exited between directory listing and field read.
    NotFound,
    /// The calling UID lacks access to this PID's files.
    Permission,
    /// A field was present but not in the expected shape.
    ParseError(String),
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "process not found"),
            Self::Permission => write!(f, "permission denied"),
            Self::ParseError(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for ProbeError {}

impl From<ProcError> for ProbeError {
    fn from(err: ProcError) -> Self {
        match err {
            ProcError::NotFound(_) => Self::NotFound,
            ProcError::PermissionDenied(_) => Self::Permission,
            other => Self::ParseError(other.to_string()),
        }
    }
}

/// A live handle onto one PID's `/proc` entry. Holding one does not mean
/// the process is still alive by the time an accessor is called; every
/// accessor re-reads its own field and reports `NotFound` if the process
/// has gone away.
pub struct ProcessHandle {
    pid: i32,
    inner: Process,
}

impl ProcessHandle {
    /// Open a handle for `pid`. Fails immediately if the PID directory
    /// cannot be opened at all.
    pub fn open(pid: i32) -> Result<Self, ProbeError> {
        let inner = Process::new(pid)?;
        Ok(Self { pid, inner })
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Kernel-assigned badness, from `/proc/<pid>/oom_score`.
    pub fn oom_score(&self) -> Result<i32, ProbeError> {
        let score = self.inner.oom_score()?;
        Ok(score as i32)
    }

    /// User-settable adjustment, from `/proc/<pid>/oom_score_adj`.
    /// `-1000` marks the process kernel-unkillable.
    pub fn oom_score_adj(&self) -> Result<i32, ProbeError> {
        let status = self.inner.status()?;
        Ok(i32::from(status.oom_score_adj))
    }

    /// Resident set size in KiB. `0` typically means a kernel thread.
    pub fn rss_kib(&self) -> Result<i64, ProbeError> {
        let stat = self.inner.stat()?;
        let page_size = procfs::page_size();
        Ok((stat.rss as i64 * page_size as i64) / 1024)
    }

    /// Process short name, truncated by the kernel to 15 bytes.
    pub fn comm(&self) -> Result<String, ProbeError> {
        let stat = self.inner.stat()?;
        Ok(stat.comm)
    }

    /// Real UID that owns this process.
    pub fn uid(&self) -> Result<u32, ProbeError> {
        let status = self.inner.status()?;
        Ok(status.ruid)
    }

    /// CPU and wall-clock accounting, in seconds.
    pub fn times(&self) -> Result<ProcessTimes, ProbeError> {
        let stat = self.inner.stat()?;
        let ticks_per_sec = procfs::ticks_per_second() as f64;
        if ticks_per_sec <= 0.0 {
            return Err(ProbeError::ParseError("invalid ticks_per_second".into()));
        }

        let uptime = procfs::Uptime::new()
            .map_err(|e| ProbeError::ParseError(e.to_string()))?
            .uptime;
        let starttime = stat.starttime as f64 / ticks_per_sec;
        let runtime = (uptime - starttime).max(0.0);

        Ok(ProcessTimes {
            utime: stat.utime as f64 / ticks_per_sec,
            stime: stat.stime as f64 / ticks_per_sec,
            cutime: stat.cutime as f64 / ticks_per_sec,
            cstime: stat.cstime as f64 / ticks_per_sec,
            starttime,
            runtime,
        })
    }

    /// Whether the PID entry is still present in `/proc`.
    pub fn is_alive(&self) -> bool {
        Path::new(&format!("/proc/{}/stat", self.pid)).exists()
    }
}

/// List every numeric entry under `/proc`, i.e. every currently-known PID.
/// Returned in directory-iteration order, which callers treat as the
/// implicit tiebreak key during selection.
pub fn list_pids() -> std::io::Result<Vec<i32>> {
    let mut pids = Vec::new();
    for entry in fs::read_dir("/proc")? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(pid) = name.to_str().and_then(|s| s.parse::<i32>().ok()) {
            pids.push(pid);
        }
    }
    Ok(pids)
}

/// Signal-zero liveness probe usable without a full `ProcessHandle`
/// (e.g. right after sending a kill signal).
pub fn pid_exists(pid: i32) -> bool {
    Path::new(&format!("/proc/{pid}/stat")).exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_error_display() {
        assert_eq!(ProbeError::NotFound.to_string(), "process not found");
        assert_eq!(ProbeError::Permission.to_string(), "permission denied");
        assert_eq!(
            ProbeError::ParseError("bad".into()).to_string(),
            "parse error: bad"
        );
    }

    #[test]
    fn test_list_pids_includes_init() {
        let pids = list_pids().expect("list /proc");
        assert!(pids.contains(&1));
    }

    #[test]
    fn test_self_pid_is_alive() {
        let pid = std::process::id() as i32;
        assert!(pid_exists(pid));
    }

    #[test]
    fn test_nonexistent_pid_is_not_alive() {
        assert!(!pid_exists(i32::MAX));
    }

    #[test]
    fn test_handle_open_self() {
        let pid = std::process::id() as i32;
        let handle = ProcessHandle::open(pid).expect("open self");
        assert_eq!(handle.pid(), pid);
        assert!(handle.rss_kib().is_ok());
    }
}
