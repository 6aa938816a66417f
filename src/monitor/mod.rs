// Memory and process monitoring against /proc

mod meminfo;
mod process;

pub use meminfo::MemorySnapshot;
pub use process::{list_pids, pid_exists, ProbeError, ProcessHandle, ProcessTimes};
