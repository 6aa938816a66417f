// Emergency kill (C5): unconditional SIGKILL of a named process list under
// catastrophic pressure. New relative to the teacher's plain selector;
// grounded in the pattern of iterating candidates and killing until a
// watermark recovers, adapted here to byte-exact name matching instead of
// an RSS-fraction cutoff.

use crate::monitor::{list_pids, MemorySnapshot, ProcessHandle};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

/// Walk `names` in order, killing every PID whose `comm` matches before
/// moving to the next name. Re-checks `mem_available_pct` against
/// `mem_high_pct` between names and stops early once pressure has
/// recovered. Returns the total number of processes killed.
pub fn emergency_kill<F>(names: &[String], mem_high_pct: f64, mut refresh_snapshot: F) -> u32
where
    F: FnMut() -> Option<MemorySnapshot>,
{
    let mut total_kills = 0;

    for name in names {
        if let Some(snapshot) = refresh_snapshot() {
            if snapshot.mem_available_pct > mem_high_pct {
                log::info!("emergency: memory recovered above high watermark before '{name}'");
                break;
            }
        }

        let Ok(pids) = list_pids() else { continue };
        for pid in pids {
            let Ok(handle) = ProcessHandle::open(pid) else {
                continue;
            };
            let Ok(comm) = handle.comm() else { continue };
            if comm != *name {
                continue;
            }

            match signal::kill(Pid::from_raw(pid), Signal::SIGKILL) {
                Ok(()) => {
                    total_kills += 1;
                    log::warn!("emergency kill: pid {pid} ({name})");
                }
                Err(e) => {
                    log::debug!("emergency kill of pid {pid} ({name}) failed: {e}");
                }
            }
        }
    }

    total_kills
}
