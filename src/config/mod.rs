// Configuration: CLI -> config file -> environment -> validated Thresholds

mod args;
mod env;
mod file;

pub use args::Args;
pub use file::ConfigFile;

use crate::error::AppError;
use regex::Regex;

const MAX_EMERG_NAMES: usize = 64;
const MAX_EMERG_NAME_LEN: usize = 32;

/// Every configurable value in its raw, not-yet-validated form. Each field
/// is `None` until some layer (CLI, file, env) sets it; `Thresholds::finalize`
/// fills in defaults and enforces invariants.
#[derive(Debug, Default, Clone)]
pub struct RawConfig {
    pub mem_term_pct: Option<f64>,
    pub mem_kill_pct: Option<f64>,
    pub mem_high_pct: Option<f64>,
    pub mem_emerg_pct: Option<f64>,
    pub mem_term_kib: Option<u64>,
    pub mem_kill_kib: Option<u64>,

    pub swap_term_pct: Option<f64>,
    pub swap_kill_pct: Option<f64>,
    pub swap_term_kib: Option<u64>,
    pub swap_kill_kib: Option<u64>,

    pub ignore_oom_score_adj: Option<bool>,
    pub notify: Option<bool>,
    pub notify_dbus: Option<bool>,
    pub dryrun: Option<bool>,
    pub debug: Option<bool>,
    pub report_interval_secs: Option<u64>,
    pub priority: Option<i32>,

    pub prefer: Option<String>,
    pub avoid: Option<String>,
    pub avoid_users: Option<String>,
    pub prefer_old: Option<String>,
    pub emerg_kill: Option<Vec<String>>,

    pub pre_kill_script: Option<String>,
    pub post_kill_script: Option<String>,
}

/// Parse `"WARN"` or `"WARN,KILL"` into `(term, kill)`, defaulting `kill`
/// to half of `term` when only one value is given.
fn parse_pct_pair(s: &str, code: i32) -> Result<(f64, f64), AppError> {
    let mut parts = s.split(',');
    let term: f64 = parts
        .next()
        .unwrap_or_default()
        .trim()
        .parse()
        .map_err(|_| AppError::BadNumericArgument(code, format!("invalid percentage: {s}")))?;
    let kill = match parts.next() {
        Some(k) => k
            .trim()
            .parse()
            .map_err(|_| AppError::BadNumericArgument(code, format!("invalid percentage: {s}")))?,
        None => term / 2.0,
    };
    Ok((term, kill))
}

fn parse_kib_pair(s: &str, code: i32) -> Result<(u64, u64), AppError> {
    let mut parts = s.split(',');
    let term: u64 = parts
        .next()
        .unwrap_or_default()
        .trim()
        .parse()
        .map_err(|_| AppError::BadNumericArgument(code, format!("invalid KiB value: {s}")))?;
    let kill = match parts.next() {
        Some(k) => k
            .trim()
            .parse()
            .map_err(|_| AppError::BadNumericArgument(code, format!("invalid KiB value: {s}")))?,
        None => term / 2,
    };
    Ok((term, kill))
}

impl RawConfig {
    pub fn from_args(args: &Args) -> Result<Self, AppError> {
        let mut raw = Self::default();

        if let Some(s) = &args.mem_pct {
            let (term, kill) = parse_pct_pair(s, 14)?;
            raw.mem_term_pct = Some(term);
            raw.mem_kill_pct = Some(kill);
        }
        if let Some(s) = &args.swap_pct {
            let (term, kill) = parse_pct_pair(s, 15)?;
            raw.swap_term_pct = Some(term);
            raw.swap_kill_pct = Some(kill);
        }
        if let Some(s) = &args.mem_kib {
            let (term, kill) = parse_kib_pair(s, 14)?;
            raw.mem_term_kib = Some(term);
            raw.mem_kill_kib = Some(kill);
        }
        if let Some(s) = &args.swap_kib {
            let (term, kill) = parse_kib_pair(s, 15)?;
            raw.swap_term_kib = Some(term);
            raw.swap_kill_kib = Some(kill);
        }

        raw.ignore_oom_score_adj = Some(args.ignore_oom_score_adj);
        raw.notify = Some(args.notify || args.notify_compat.is_some());
        raw.debug = Some(args.debug);
        raw.dryrun = Some(args.dry_run);
        raw.report_interval_secs = args.report;
        raw.prefer = args.prefer.clone();
        raw.avoid = args.avoid.clone();
        raw.pre_kill_script = args.pre_kill_script.clone();
        raw.post_kill_script = args.post_kill_script.clone();
        if args.priority {
            raw.priority = Some(-100);
        }

        Ok(raw)
    }

    /// Apply a parsed config file on top of this raw bundle. Config file
    /// values win over whatever the CLI already set.
    pub fn apply_file(mut self, file: &ConfigFile) -> Result<Self, AppError> {
        if let Some(v) = file.get("memory_high") {
            self.mem_high_pct = Some(parse_f64(v, 14)?);
        }
        if let Some(v) = file.get("memory_low") {
            self.mem_term_pct = Some(parse_f64(v, 14)?);
        }
        if let Some(v) = file.get("memory_kill") {
            self.mem_kill_pct = Some(parse_f64(v, 14)?);
        }
        if let Some(v) = file.get("memory_emerg") {
            self.mem_emerg_pct = Some(parse_f64(v, 14)?);
        }
        if let Some(v) = file.get("swap_low") {
            self.swap_term_pct = Some(parse_f64(v, 15)?);
        }
        if let Some(v) = file.get("swap_kill") {
            self.swap_kill_pct = Some(parse_f64(v, 15)?);
        }
        if let Some(v) = file.get("report_interval") {
            self.report_interval_secs = Some(
                v.parse()
                    .map_err(|_| AppError::BadNumericArgument(14, format!("bad report_interval: {v}")))?,
            );
        }
        if let Some(v) = file.get("nice") {
            self.priority = Some(
                v.parse()
                    .map_err(|_| AppError::BadNumericArgument(16, format!("bad nice: {v}")))?,
            );
        }
        if let Some(v) = file.get("ignore_oom_score_adj") {
            self.ignore_oom_score_adj = Some(parse_file_bool(v)?);
        }
        if let Some(v) = file.get("notify_dbus") {
            self.notify_dbus = Some(parse_file_bool(v)?);
        }
        if let Some(v) = file.get("prefer_regex") {
            self.prefer = Some(v.to_string());
        }
        if let Some(v) = file.get("avoid_regex") {
            self.avoid = Some(v.to_string());
        }
        if let Some(v) = file.get("avoid_users") {
            self.avoid_users = Some(v.to_string());
        }
        if let Some(v) = file.get("prefer_old") {
            self.prefer_old = Some(v.to_string());
        }
        if let Some(v) = file.get("emerg_kill") {
            self.emerg_kill = Some(file::parse_name_list(
                v,
                MAX_EMERG_NAMES,
                MAX_EMERG_NAME_LEN,
            )?);
        }

        Ok(self)
    }
}

fn parse_f64(s: &str, code: i32) -> Result<f64, AppError> {
    s.parse()
        .map_err(|_| AppError::BadNumericArgument(code, format!("invalid percentage: {s}")))
}

fn parse_file_bool(s: &str) -> Result<bool, AppError> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(AppError::BadArgument(format!("invalid boolean: {s}"))),
    }
}

/// The validated, immutable-for-the-daemon's-lifetime threshold and
/// behaviour bundle. Constructed once at startup from a `RawConfig` plus
/// the initial `MemorySnapshot` (needed to turn `-M`/`-S` KiB values into
/// percentages).
#[derive(Debug, Clone)]
pub struct Thresholds {
    pub mem_high_pct: f64,
    pub mem_term_pct: f64,
    pub mem_kill_pct: f64,
    pub mem_emerg_pct: f64,
    pub swap_term_pct: f64,
    pub swap_kill_pct: f64,

    pub prefer: Option<Regex>,
    pub avoid: Option<Regex>,
    pub avoid_users: Option<Regex>,
    pub prefer_old: Option<Regex>,
    pub emerg_kill: Vec<String>,

    pub ignore_oom_score_adj: bool,
    pub notify: bool,
    pub notify_dbus: bool,
    pub dryrun: bool,
    pub debug: bool,
    pub report_interval_ms: u64,
    pub priority: Option<i32>,

    pub pre_kill_script: Option<String>,
    pub post_kill_script: Option<String>,
}

impl Thresholds {
    pub fn finalize(raw: RawConfig, mem_total_kib: u64, swap_total_kib: u64) -> Result<Self, AppError> {
        let mut mem_term_pct = raw.mem_term_pct.unwrap_or(10.0);
        let mut mem_kill_pct = raw.mem_kill_pct.unwrap_or(mem_term_pct / 2.0);

        if let Some(kib) = raw.mem_term_kib {
            let pct = kib_to_pct(kib, mem_total_kib);
            mem_term_pct = mem_term_pct.min(pct);
        }
        if let Some(kib) = raw.mem_kill_kib {
            let pct = kib_to_pct(kib, mem_total_kib);
            mem_kill_pct = mem_kill_pct.min(pct);
        }

        let mut swap_term_pct = raw.swap_term_pct.unwrap_or(10.0);
        let mut swap_kill_pct = raw.swap_kill_pct.unwrap_or(swap_term_pct / 2.0);

        if let Some(kib) = raw.swap_term_kib {
            let pct = kib_to_pct(kib, swap_total_kib);
            swap_term_pct = swap_term_pct.min(pct);
        }
        if let Some(kib) = raw.swap_kill_kib {
            let pct = kib_to_pct(kib, swap_total_kib);
            swap_kill_pct = swap_kill_pct.min(pct);
        }

        if mem_term_pct > 99.0 {
            log::warn!("mem term% clamped from {mem_term_pct} to 99");
            mem_term_pct = 99.0;
        }
        if swap_term_pct > 100.0 {
            log::warn!("swap term% clamped from {swap_term_pct} to 100");
            swap_term_pct = 100.0;
        }

        let mem_high_pct = raw
            .mem_high_pct
            .unwrap_or_else(|| (mem_term_pct * 2.0).min(99.0))
            .max(mem_term_pct);
        let mem_emerg_pct = raw
            .mem_emerg_pct
            .unwrap_or_else(|| mem_kill_pct / 2.0)
            .min(mem_kill_pct);

        if mem_kill_pct > mem_term_pct {
            log::warn!("mem_kill_pct ({mem_kill_pct}) is greater than mem_term_pct ({mem_term_pct})");
        }
        if swap_kill_pct > swap_term_pct {
            log::warn!(
                "swap_kill_pct ({swap_kill_pct}) is greater than swap_term_pct ({swap_term_pct})"
            );
        }

        if let Some(priority) = raw.priority {
            if !(-20..=19).contains(&priority) {
                return Err(AppError::BadNumericArgument(
                    16,
                    format!("priority {priority} out of range -20..=19"),
                ));
            }
        }

        let prefer = compile_optional(raw.prefer.as_deref())?;
        let avoid = compile_optional(raw.avoid.as_deref())?;
        let avoid_users = compile_optional(raw.avoid_users.as_deref())?;
        let prefer_old = compile_optional(raw.prefer_old.as_deref())?;

        Ok(Self {
            mem_high_pct,
            mem_term_pct,
            mem_kill_pct,
            mem_emerg_pct,
            swap_term_pct,
            swap_kill_pct,
            prefer,
            avoid,
            avoid_users,
            prefer_old,
            emerg_kill: raw.emerg_kill.unwrap_or_default(),
            ignore_oom_score_adj: raw.ignore_oom_score_adj.unwrap_or(false),
            notify: raw.notify.unwrap_or(false),
            notify_dbus: raw.notify_dbus.unwrap_or(false),
            dryrun: raw.dryrun.unwrap_or(false),
            debug: raw.debug.unwrap_or(false),
            report_interval_ms: raw.report_interval_secs.unwrap_or(60) * 1000,
            priority: raw.priority,
            pre_kill_script: raw.pre_kill_script,
            post_kill_script: raw.post_kill_script,
        })
    }
}

impl Thresholds {
    /// Load (CLI → config file → env) and validate into a `Thresholds`
    /// bundle. Reads `/proc/meminfo` once up front so `-M`/`-S` absolute
    /// KiB thresholds can be converted to percentages.
    pub fn from_args(args: Args) -> Result<Self, AppError> {
        let mut raw = RawConfig::from_args(&args)?;

        if let Some(path) = &args.config {
            let file = ConfigFile::load(path)?;
            raw = raw.apply_file(&file)?;
        }

        let raw = apply_env_overrides(raw).map_err(|e| AppError::BadArgument(e.to_string()))?;

        let snap = crate::monitor::MemorySnapshot::read()
            .map_err(|e| AppError::CannotOpenProc(e.to_string()))?;

        Self::finalize(raw, snap.mem_total_kib, snap.swap_total_kib)
    }
}

/// The validated threshold bundle is the daemon's top-level configuration.
pub type Config = Thresholds;

fn kib_to_pct(kib: u64, total_kib: u64) -> f64 {
    if total_kib == 0 {
        100.0
    } else {
        100.0 * kib as f64 / total_kib as f64
    }
}

fn compile_optional(pattern: Option<&str>) -> Result<Option<Regex>, AppError> {
    match pattern {
        Some(p) => Regex::new(p)
            .map(Some)
            .map_err(|e| AppError::RegexCompile(e.to_string())),
        None => Ok(None),
    }
}

pub use env::apply_env_overrides;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pct_pair_single_value() {
        let (term, kill) = parse_pct_pair("10", 14).unwrap();
        assert_eq!(term, 10.0);
        assert_eq!(kill, 5.0);
    }

    #[test]
    fn test_parse_pct_pair_both_values() {
        let (term, kill) = parse_pct_pair("10,5", 14).unwrap();
        assert_eq!(term, 10.0);
        assert_eq!(kill, 5.0);
    }

    #[test]
    fn test_finalize_defaults() {
        let raw = RawConfig::default();
        let thresholds = Thresholds::finalize(raw, 16_000_000, 8_000_000).unwrap();
        assert_eq!(thresholds.mem_term_pct, 10.0);
        assert_eq!(thresholds.mem_kill_pct, 5.0);
        assert!(thresholds.mem_high_pct >= thresholds.mem_term_pct);
        assert!(thresholds.mem_emerg_pct <= thresholds.mem_kill_pct);
    }

    #[test]
    fn test_finalize_takes_minimum_of_pct_and_kib() {
        let mut raw = RawConfig::default();
        raw.mem_term_pct = Some(50.0);
        raw.mem_term_kib = Some(1000);
        let thresholds = Thresholds::finalize(raw, 10_000, 1000).unwrap();
        assert_eq!(thresholds.mem_term_pct, 10.0);
    }

    #[test]
    fn test_finalize_rejects_out_of_range_priority() {
        let mut raw = RawConfig::default();
        raw.priority = Some(50);
        assert!(Thresholds::finalize(raw, 1000, 1000).is_err());
    }

    #[test]
    fn test_finalize_rejects_bad_regex() {
        let mut raw = RawConfig::default();
        raw.prefer = Some("(".to_string());
        assert!(Thresholds::finalize(raw, 1000, 1000).is_err());
    }

    #[test]
    fn test_apply_file_overrides_cli() {
        let raw = RawConfig {
            mem_term_pct: Some(20.0),
            ..Default::default()
        };
        let file = ConfigFile::default();
        let raw = raw.apply_file(&file).unwrap();
        assert_eq!(raw.mem_term_pct, Some(20.0));
    }
}
