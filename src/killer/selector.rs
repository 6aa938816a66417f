// Streaming victim selection (C3)
//
// Deliberately not collect-and-sort: the selector keeps a single running
// best candidate and replaces it in place, so a stale PID read early in
// the scan can never outbid a fresh high-RSS hit later without an
// explicit comparison against the current best.

use crate::config::Thresholds;
use crate::monitor::{list_pids, ProcessHandle};

/// A fully-resolved victim candidate. Only built for PIDs that survive
/// every skip rule.
#[derive(Debug, Clone)]
pub struct ProcCandidate {
    pub pid: i32,
    pub uid: u32,
    pub badness: i64,
    pub rss_kib: i64,
    pub name: String,
    pub username: String,
    pub utime: f64,
    pub stime: f64,
    pub runtime: f64,
    pub oom_score_adj: i32,
}

/// Per-scan read counters, exposed so callers (and tests) can confirm the
/// lazy-read optimization contract is honoured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionStats {
    pub scanned: u64,
    pub oom_score_reads: u64,
    pub name_reads: u64,
    pub user_lookups: u64,
    pub rss_reads: u64,
    pub candidates: u64,
}

pub struct SelectionOutcome {
    pub victim: Option<ProcCandidate>,
    pub stats: SelectionStats,
    /// `true` iff the scan could not even list `/proc` (as opposed to
    /// finding zero surviving candidates). The startup self-test treats
    /// this as the fatal "cannot enter /proc" condition; steady-state
    /// iterations treat it like any other empty scan and retry later.
    pub proc_unreadable: bool,
}

/// `true` iff `candidate` replaces `best` under the spec's total order:
/// higher badness wins outright; on a badness tie, higher RSS wins.
fn candidate_wins(candidate: &ProcCandidate, best: &ProcCandidate) -> bool {
    candidate.badness > best.badness
        || (candidate.badness == best.badness && candidate.rss_kib > best.rss_kib)
}

pub struct VictimSelector<'a> {
    thresholds: &'a Thresholds,
}

impl<'a> VictimSelector<'a> {
    pub fn new(thresholds: &'a Thresholds) -> Self {
        Self { thresholds }
    }

    /// Scan `/proc` once and return at most one victim.
    pub fn select(&self) -> SelectionOutcome {
        let mut stats = SelectionStats::default();

        let Ok(pids) = list_pids() else {
            return SelectionOutcome {
                victim: None,
                stats,
                proc_unreadable: true,
            };
        };

        let own_pid = std::process::id() as i32;
        if pids.len() == 1 && pids[0] == own_pid {
            log::warn!("only our own PID is visible under /proc; hidepid in effect?");
            return SelectionOutcome {
                victim: None,
                stats,
                proc_unreadable: false,
            };
        }

        let needs_name =
            self.thresholds.prefer.is_some() || self.thresholds.avoid.is_some() || self.thresholds.prefer_old.is_some();
        let needs_user = self.thresholds.avoid_users.is_some();

        let mut best: Option<ProcCandidate> = None;

        for pid in pids {
            stats.scanned += 1;
            if pid <= 1 {
                continue;
            }

            let Ok(handle) = ProcessHandle::open(pid) else {
                continue;
            };

            stats.oom_score_reads += 1;
            let Ok(oom_score) = handle.oom_score() else {
                continue;
            };
            let Ok(oom_score_adj) = handle.oom_score_adj() else {
                continue;
            };
            if oom_score_adj == -1000 {
                continue;
            }
            let Ok(uid) = handle.uid() else {
                continue;
            };

            let mut badness: i64 = i64::from(oom_score);
            if self.thresholds.ignore_oom_score_adj && oom_score_adj > 0 {
                badness -= i64::from(oom_score_adj);
            }

            let mut name: Option<String> = None;
            let mut utime = 0.0;
            let mut stime = 0.0;
            let mut runtime = 0.0;

            if needs_name {
                stats.name_reads += 1;
                let Ok(comm) = handle.comm() else {
                    continue;
                };

                if let Some(re) = &self.thresholds.prefer {
                    if re.is_match(&comm) {
                        badness += 300;
                    }
                }
                if let Some(re) = &self.thresholds.avoid {
                    if re.is_match(&comm) {
                        badness -= 300;
                    }
                }
                if self.thresholds.prefer_old.is_some() {
                    let Ok(times) = handle.times() else {
                        continue;
                    };
                    utime = times.utime;
                    stime = times.stime;
                    runtime = times.runtime;
                    if let Some(re) = &self.thresholds.prefer_old {
                        if re.is_match(&comm) {
                            badness += (times.runtime as i64) / 600;
                        }
                    }
                }

                name = Some(comm);
            }

            let mut username = String::new();
            if needs_user {
                stats.user_lookups += 1;
                let Some(resolved) = resolve_username(uid) else {
                    continue;
                };
                if let Some(re) = &self.thresholds.avoid_users {
                    if re.is_match(&resolved) {
                        badness -= 150;
                    }
                }
                username = resolved;
            }

            let should_probe_rss = match &best {
                None => true,
                Some(current) => badness >= current.badness,
            };
            if !should_probe_rss {
                continue;
            }

            stats.rss_reads += 1;
            let Ok(rss_kib) = handle.rss_kib() else {
                continue;
            };
            if rss_kib == 0 {
                continue;
            }

            // Re-check oom_score_adj fresh: it may have changed since the
            // stage-1 read while we were resolving name/user.
            let Ok(fresh_adj) = handle.oom_score_adj() else {
                continue;
            };
            if fresh_adj == -1000 {
                continue;
            }

            if name.is_none() {
                let Ok(comm) = handle.comm() else {
                    continue;
                };
                name = Some(comm);
            }

            stats.candidates += 1;

            let candidate = ProcCandidate {
                pid,
                uid,
                badness,
                rss_kib,
                name: name.unwrap_or_default(),
                username,
                utime,
                stime,
                runtime,
                oom_score_adj: fresh_adj,
            };

            match &best {
                None => best = Some(candidate),
                Some(current) => {
                    if candidate_wins(&candidate, current) {
                        best = Some(candidate);
                    }
                }
            }
        }

        SelectionOutcome {
            victim: best,
            stats,
            proc_unreadable: false,
        }
    }
}

fn resolve_username(uid: u32) -> Option<String> {
    users::get_user_by_uid(uid).map(|u| u.name().to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(badness: i64, rss_kib: i64) -> ProcCandidate {
        ProcCandidate {
            pid: 100,
            uid: 1000,
            badness,
            rss_kib,
            name: "proc".to_string(),
            username: String::new(),
            utime: 0.0,
            stime: 0.0,
            runtime: 0.0,
            oom_score_adj: 0,
        }
    }

    #[test]
    fn test_higher_badness_wins() {
        let a = candidate(100, 10);
        let b = candidate(50, 1_000_000);
        assert!(candidate_wins(&a, &b));
        assert!(!candidate_wins(&b, &a));
    }

    #[test]
    fn test_tie_breaks_on_rss() {
        let a = candidate(100, 5000);
        let b = candidate(100, 1000);
        assert!(candidate_wins(&a, &b));
        assert!(!candidate_wins(&b, &a));
    }

    #[test]
    fn test_full_tie_does_not_replace() {
        let a = candidate(100, 5000);
        let b = candidate(100, 5000);
        assert!(!candidate_wins(&a, &b));
    }

    #[test]
    fn test_select_against_live_proc_does_not_panic() {
        let thresholds = Thresholds::finalize(
            crate::config::RawConfig::default(),
            16_000_000,
            8_000_000,
        )
        .unwrap();
        let selector = VictimSelector::new(&thresholds);
        let outcome = selector.select();
        assert!(outcome.stats.scanned > 0);
    }
}
