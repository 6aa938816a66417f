// Notification sidecar: fire-and-forget, never blocks the control loop.
//
// A kill is always followed (never preceded) by at most one notification
// attempt. Success or failure of the notifier is not observed here; the
// SIGCHLD reaper installed at startup collects whatever child this spawns.
// Pre/post-kill hook scripts follow the same fire-and-forget contract.

pub mod hooks;

#[cfg(feature = "dbus-notify")]
use notify_rust::{Notification, Timeout};
use std::process::Command;

use crate::killer::ProcCandidate;
use crate::sanitize_for_log;

/// Strip shell metacharacters from a value before it's passed to a hook
/// script as an environment variable. Scripts sometimes `eval` or log their
/// environment; this keeps a crafted process name from reaching a shell.
fn sanitize_env_value(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            c if c.is_alphanumeric() => c,
            ' ' | '.' | '-' | '_' | '/' => c,
            _ => '_',
        })
        .take(256)
        .collect()
}

pub struct Notifier {
    enabled: bool,
    pre_kill_script: Option<String>,
    post_kill_script: Option<String>,
}

impl Notifier {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            pre_kill_script: None,
            post_kill_script: None,
        }
    }

    pub fn with_hooks(mut self, pre_kill_script: Option<String>, post_kill_script: Option<String>) -> Self {
        self.pre_kill_script = pre_kill_script;
        self.post_kill_script = post_kill_script;
        self
    }

    /// Fire a notification for a process that was just killed. Never
    /// waits on the result.
    pub fn notify_kill(&self, candidate: &ProcCandidate) {
        if !self.enabled {
            return;
        }

        #[cfg(feature = "dbus-notify")]
        {
            self.send_dbus(candidate);
        }

        #[cfg(not(feature = "dbus-notify"))]
        {
            self.spawn_notify_send(candidate);
        }
    }

    /// Spawn the pre-kill script, if configured, before a victim is signalled.
    pub fn run_pre_kill_hook(&self, candidate: &ProcCandidate) {
        if let Some(script) = &self.pre_kill_script {
            self.spawn_hook(script, candidate);
        }
    }

    /// Spawn the post-kill script, if configured, after a victim is signalled.
    pub fn run_post_kill_hook(&self, candidate: &ProcCandidate) {
        if let Some(script) = &self.post_kill_script {
            self.spawn_hook(script, candidate);
        }
    }

    fn spawn_hook(&self, script: &str, candidate: &ProcCandidate) {
        let result = Command::new(script)
            .env("OOM_SENTINEL_PID", candidate.pid.to_string())
            .env("OOM_SENTINEL_NAME", sanitize_env_value(&candidate.name))
            .env("OOM_SENTINEL_RSS", candidate.rss_kib.to_string())
            .env("OOM_SENTINEL_SCORE", candidate.oom_score_adj.to_string())
            .spawn();

        match result {
            Ok(child) => log::debug!("spawned hook {script} (pid {})", child.id()),
            Err(e) => log::warn!("failed to spawn hook {script}: {e}"),
        }
    }

    #[cfg(not(feature = "dbus-notify"))]
    fn spawn_notify_send(&self, candidate: &ProcCandidate) {
        let body = format!(
            "killed pid {} ({}), rss {} KiB",
            candidate.pid,
            sanitize_for_log(&candidate.name),
            candidate.rss_kib
        );

        match Command::new("notify-send")
            .arg("oom-sentinel")
            .arg(&body)
            .spawn()
        {
            Ok(child) => {
                log::debug!("spawned notify-send (pid {})", child.id());
            }
            Err(e) => log::debug!("failed to spawn notify-send: {e}"),
        }
    }

    #[cfg(feature = "dbus-notify")]
    fn send_dbus(&self, candidate: &ProcCandidate) {
        let body = format!(
            "pid {} ({}), rss {} KiB",
            candidate.pid,
            sanitize_for_log(&candidate.name),
            candidate.rss_kib
        );

        let result = Notification::new()
            .summary("oom-sentinel: process killed")
            .body(&body)
            .icon("dialog-warning")
            .timeout(Timeout::Milliseconds(6000))
            .show();

        if let Err(e) = result {
            log::debug!("failed to send D-Bus notification: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> ProcCandidate {
        ProcCandidate {
            pid: 1234,
            uid: 1000,
            badness: 500,
            rss_kib: 204_800,
            name: "chromium".to_string(),
            username: "alice".to_string(),
            utime: 0.0,
            stime: 0.0,
            runtime: 0.0,
            oom_score_adj: 0,
        }
    }

    #[test]
    fn test_disabled_notifier_does_not_spawn() {
        let notifier = Notifier::new(false);
        // Should return immediately without touching the process table.
        notifier.notify_kill(&candidate());
    }

    #[test]
    fn test_no_hooks_configured_is_a_noop() {
        let notifier = Notifier::new(false);
        notifier.run_pre_kill_hook(&candidate());
        notifier.run_post_kill_hook(&candidate());
    }

    #[test]
    fn test_sanitize_env_value_strips_shell_metacharacters() {
        assert_eq!(sanitize_env_value("firefox"), "firefox");
        assert_eq!(sanitize_env_value("$(whoami)"), "__whoami_");
        assert_eq!(sanitize_env_value("a;b|c"), "a_b_c");
    }

    #[test]
    fn test_hook_spawns_script_with_env() {
        let dir = tempfile::TempDir::new().unwrap();
        let script_path = dir.path().join("hook.sh");
        std::fs::write(&script_path, "#!/bin/sh\nexit 0\n").unwrap();
        let mut perms = std::fs::metadata(&script_path).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        std::fs::set_permissions(&script_path, perms).unwrap();

        let notifier =
            Notifier::new(false).with_hooks(Some(script_path.to_str().unwrap().to_string()), None);
        notifier.run_pre_kill_hook(&candidate());
    }
}
