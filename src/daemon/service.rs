// Control loop (C6): priority order Emergency > Kill > Term > Hysteresis > idle.

use crate::config::Thresholds;
use crate::killer::{emergency_kill, kill_with_escalation, VictimSelector};
use crate::monitor::MemorySnapshot;
use crate::notify::Notifier;
use crate::status::{Status, StatusSnapshot, DEFAULT_STATUS_PATH};
use anyhow::Result;
use nix::libc::{setpriority, PRIO_PROCESS};
use nix::sys::signal::Signal;
use std::fs;
use std::io::Error;
use std::time::Duration;

/// Set the daemon's own scheduling priority and protect it from the very
/// killer it runs.
fn set_daemon_priority(priority: i32) {
    #[allow(unsafe_code)]
    let result = unsafe { setpriority(PRIO_PROCESS, 0, priority) };

    if result != 0 {
        let err = Error::last_os_error();
        log::warn!("failed to set niceness to {priority}: {err}");
    } else {
        log::info!("set niceness to {priority}");
    }

    match fs::write("/proc/self/oom_score_adj", "-100") {
        Ok(()) => log::info!("set oom_score_adj to -100"),
        Err(e) => log::warn!("failed to set oom_score_adj: {e}"),
    }
}

/// 50ms once SIGKILL is in effect, 500ms while still waiting on SIGTERM,
/// or the "no victim" one-second fallback per §7.
fn escalation_sleep_ms(escalated_to_kill: Option<bool>) -> u64 {
    match escalated_to_kill {
        Some(true) => 50,
        Some(false) => 500,
        None => 1000,
    }
}

#[derive(Debug, Clone, Copy)]
enum Decision {
    Emergency,
    Kill,
    Term,
    Hysteresis(Signal),
    Idle,
}

/// State carried between iterations: which signal hysteresis is latched on,
/// the emergency debounce countdown, and the periodic-report countdown.
struct ControlState {
    hysteresis_sig: Option<Signal>,
    emergency_cooldown_ms: i64,
    report_countdown_ms: i64,
}

impl ControlState {
    fn new(report_interval_ms: u64) -> Self {
        Self {
            hysteresis_sig: None,
            emergency_cooldown_ms: 0,
            report_countdown_ms: report_interval_ms as i64,
        }
    }
}

pub struct DaemonService {
    thresholds: Thresholds,
    notifier: Notifier,
    status_path: String,
}

impl DaemonService {
    pub fn new(thresholds: Thresholds) -> Self {
        let notifier = Notifier::new(thresholds.notify || thresholds.notify_dbus)
            .with_hooks(thresholds.pre_kill_script.clone(), thresholds.post_kill_script.clone());
        Self {
            thresholds,
            notifier,
            status_path: DEFAULT_STATUS_PATH.to_string(),
        }
    }

    fn decide(&self, snap: &MemorySnapshot, state: &ControlState) -> Decision {
        let t = &self.thresholds;

        if !t.emerg_kill.is_empty()
            && state.emergency_cooldown_ms <= 0
            && snap.mem_available_pct <= t.mem_emerg_pct
            && snap.swap_free_pct <= t.swap_kill_pct
        {
            return Decision::Emergency;
        }

        if snap.mem_available_pct <= t.mem_kill_pct && snap.swap_free_pct <= t.swap_kill_pct {
            return Decision::Kill;
        }

        if snap.mem_available_pct <= t.mem_term_pct && snap.swap_free_pct <= t.swap_term_pct {
            return Decision::Term;
        }

        if let Some(sig) = state.hysteresis_sig {
            if snap.mem_available_pct <= t.mem_high_pct {
                return Decision::Hysteresis(sig);
            }
        }

        Decision::Idle
    }

    fn write_status(&self, status: Status, snap: &MemorySnapshot, setpoint_pct: f64) {
        let snapshot = StatusSnapshot::now(status, snap.mem_available_pct, setpoint_pct);
        if let Err(e) = snapshot.write_to(&self.status_path) {
            log::debug!("failed to write status file {}: {e}", self.status_path);
        }
    }

    fn adaptive_sleep_ms(&self, snap: &MemorySnapshot) -> u64 {
        let mem_headroom_kib =
            ((snap.mem_available_pct - self.thresholds.mem_term_pct) * 10.0 * snap.mem_total_mib()).max(0.0);
        let swap_headroom_kib =
            ((snap.swap_free_pct - self.thresholds.swap_term_pct) * 10.0 * snap.swap_total_mib()).max(0.0);

        let sleep_ms = mem_headroom_kib / 6000.0 + swap_headroom_kib / 800.0;
        sleep_ms.clamp(100.0, 1000.0) as u64
    }

    /// Probe-kill our own candidate path with signal 0 so a broken
    /// permission setup is caught at startup, not on the first real kill.
    pub fn startup_self_test(&self) -> Result<()> {
        let selector = VictimSelector::new(&self.thresholds);
        let outcome = selector.select();
        if outcome.proc_unreadable {
            return Err(crate::error::AppError::CannotEnterProc.into());
        }
        if let Some(victim) = outcome.victim {
            let result = kill_with_escalation(
                victim.pid,
                None,
                self.thresholds.dryrun,
                || None,
                self.thresholds.mem_kill_pct,
                self.thresholds.swap_kill_pct,
            );
            log::info!(
                "startup self-test probed pid {}: {}",
                victim.pid,
                result.description()
            );
        } else {
            log::info!("startup self-test found no candidate process");
        }
        Ok(())
    }

    /// Select a victim and run it through the escalator. Returns whether a
    /// `SIGKILL` was in effect by the end of the wait, so the caller can
    /// pick the next iteration's sleep interval; `None` if no victim was
    /// found (the "no victim" idle-sleep fallback applies).
    fn act_on_signal(&self, sig: Signal, status: Status, setpoint_pct: f64, snap: &MemorySnapshot) -> Option<bool> {
        self.write_status(status, snap, setpoint_pct);

        let selector = VictimSelector::new(&self.thresholds);
        let outcome = selector.select();
        let Some(victim) = outcome.victim else {
            log::warn!("no victim found for {status:?} signal");
            return None;
        };

        log::warn!(
            "sending {sig:?} to pid {} ({}), rss {} KiB, badness {}",
            victim.pid,
            crate::sanitize_for_log(&victim.name),
            victim.rss_kib,
            victim.badness
        );

        self.notifier.run_pre_kill_hook(&victim);

        let outcome = kill_with_escalation(
            victim.pid,
            Some(sig),
            self.thresholds.dryrun,
            MemorySnapshot::read_ok,
            self.thresholds.mem_kill_pct,
            self.thresholds.swap_kill_pct,
        );

        if outcome.is_success() {
            self.notifier.run_post_kill_hook(&victim);
            if self.thresholds.notify {
                self.notifier.notify_kill(&victim);
            }
        } else {
            log::error!("failed to signal pid {}: {}", victim.pid, outcome.description());
        }

        Some(outcome.escalated_to_kill)
    }

    fn iterate(&self, state: &mut ControlState) -> u64 {
        let snap = match MemorySnapshot::read() {
            Ok(s) => s,
            Err(e) => {
                log::error!("failed to read meminfo: {e}");
                return 1000;
            }
        };

        let decision = self.decide(&snap, &state);
        let sleep_ms;

        match decision {
            Decision::Emergency => {
                self.write_status(Status::Emergency, &snap, self.thresholds.mem_emerg_pct);
                let kills = emergency_kill(
                    &self.thresholds.emerg_kill,
                    self.thresholds.mem_high_pct,
                    MemorySnapshot::read_ok,
                );
                log::warn!("emergency kill pass finished: {kills} process(es) killed");
                state.emergency_cooldown_ms = 30_000;
                state.hysteresis_sig = Some(Signal::SIGKILL);
                sleep_ms = 2000;
            }
            Decision::Kill => {
                let escalated = self.act_on_signal(Signal::SIGKILL, Status::Kill, self.thresholds.mem_kill_pct, &snap);
                state.hysteresis_sig = Some(Signal::SIGKILL);
                sleep_ms = escalation_sleep_ms(escalated);
            }
            Decision::Term => {
                let escalated = self.act_on_signal(Signal::SIGTERM, Status::Term, self.thresholds.mem_term_pct, &snap);
                state.hysteresis_sig = Some(Signal::SIGTERM);
                sleep_ms = escalation_sleep_ms(escalated);
            }
            Decision::Hysteresis(sig) => {
                let escalated = self.act_on_signal(sig, Status::High, self.thresholds.mem_high_pct, &snap);
                state.hysteresis_sig = Some(sig);
                sleep_ms = escalation_sleep_ms(escalated);
            }
            Decision::Idle => {
                self.write_status(Status::Ok, &snap, 0.0);
                state.hysteresis_sig = None;

                if self.thresholds.report_interval_ms > 0 && state.report_countdown_ms <= 0 {
                    log::info!("{snap}");
                    state.report_countdown_ms = self.thresholds.report_interval_ms as i64;
                }

                sleep_ms = self.adaptive_sleep_ms(&snap);
            }
        }

        state.emergency_cooldown_ms -= sleep_ms as i64;
        state.report_countdown_ms -= sleep_ms as i64;
        sleep_ms
    }

    pub fn run(&self) -> Result<()> {
        crate::notify::hooks::HookValidator::validate_hooks(
            self.thresholds.pre_kill_script.as_deref(),
            self.thresholds.post_kill_script.as_deref(),
        )?;

        if let Some(priority) = self.thresholds.priority {
            set_daemon_priority(priority);
        }

        self.startup_self_test()?;

        let mut state = ControlState::new(self.thresholds.report_interval_ms);

        loop {
            let sleep_ms = self.iterate(&mut state);
            std::thread::sleep(Duration::from_millis(sleep_ms));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawConfig;

    fn snapshot(mem_available_pct: f64, swap_free_pct: f64) -> MemorySnapshot {
        MemorySnapshot {
            mem_total_kib: 16_000_000,
            swap_total_kib: 8_000_000,
            mem_available_pct,
            swap_free_pct,
        }
    }

    fn service() -> DaemonService {
        let thresholds = Thresholds::finalize(RawConfig::default(), 16_000_000, 8_000_000).unwrap();
        DaemonService::new(thresholds)
    }

    #[test]
    fn test_decide_idle_when_plentiful() {
        let svc = service();
        let state = ControlState::new(svc.thresholds.report_interval_ms);
        let decision = svc.decide(&snapshot(80.0, 80.0), &state);
        assert!(matches!(decision, Decision::Idle));
    }

    #[test]
    fn test_decide_term_below_term_threshold() {
        let svc = service();
        let state = ControlState::new(svc.thresholds.report_interval_ms);
        let decision = svc.decide(
            &snapshot(svc.thresholds.mem_term_pct - 0.1, svc.thresholds.swap_term_pct - 0.1),
            &state,
        );
        assert!(matches!(decision, Decision::Term));
    }

    #[test]
    fn test_decide_kill_below_kill_threshold() {
        let svc = service();
        let state = ControlState::new(svc.thresholds.report_interval_ms);
        let decision = svc.decide(
            &snapshot(svc.thresholds.mem_kill_pct - 0.1, svc.thresholds.swap_kill_pct - 0.1),
            &state,
        );
        assert!(matches!(decision, Decision::Kill));
    }

    #[test]
    fn test_decide_hysteresis_holds_while_above_high() {
        let svc = service();
        let mut state = ControlState::new(svc.thresholds.report_interval_ms);
        state.hysteresis_sig = Some(Signal::SIGTERM);
        let decision = svc.decide(&snapshot(svc.thresholds.mem_high_pct - 0.1, 80.0), &state);
        assert!(matches!(decision, Decision::Hysteresis(Signal::SIGTERM)));
    }

    #[test]
    fn test_decide_clears_hysteresis_above_high() {
        let svc = service();
        let mut state = ControlState::new(svc.thresholds.report_interval_ms);
        state.hysteresis_sig = Some(Signal::SIGTERM);
        let decision = svc.decide(&snapshot(svc.thresholds.mem_high_pct + 5.0, 80.0), &state);
        assert!(matches!(decision, Decision::Idle));
    }

    #[test]
    fn test_adaptive_sleep_clamped_low_near_threshold() {
        let svc = service();
        let sleep_ms = svc.adaptive_sleep_ms(&snapshot(svc.thresholds.mem_term_pct, svc.thresholds.swap_term_pct));
        assert_eq!(sleep_ms, 100);
    }

    #[test]
    fn test_adaptive_sleep_clamped_high_far_from_threshold() {
        let svc = service();
        let sleep_ms = svc.adaptive_sleep_ms(&snapshot(95.0, 95.0));
        assert_eq!(sleep_ms, 1000);
    }
}
