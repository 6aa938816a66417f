// Environment variable configuration overrides

use super::RawConfig;
use anyhow::Result;
use std::env;

/// Apply `OOM_SENTINEL_*` environment overrides onto an already CLI+file
/// merged `RawConfig`. Applied last, so an environment variable wins over
/// both the command line and the config file.
pub fn apply_env_overrides(mut raw: RawConfig) -> Result<RawConfig> {
    if let Ok(val) = env::var("OOM_SENTINEL_MEM_TERM") {
        raw.mem_term_pct = Some(val.parse()?);
    }
    if let Ok(val) = env::var("OOM_SENTINEL_MEM_KILL") {
        raw.mem_kill_pct = Some(val.parse()?);
    }
    if let Ok(val) = env::var("OOM_SENTINEL_SWAP_TERM") {
        raw.swap_term_pct = Some(val.parse()?);
    }
    if let Ok(val) = env::var("OOM_SENTINEL_SWAP_KILL") {
        raw.swap_kill_pct = Some(val.parse()?);
    }
    if let Ok(val) = env::var("OOM_SENTINEL_REPORT_INTERVAL") {
        raw.report_interval_secs = Some(val.parse()?);
    }
    if let Ok(val) = env::var("OOM_SENTINEL_IGNORE_OOM_SCORE_ADJ") {
        raw.ignore_oom_score_adj = Some(parse_bool(&val)?);
    }
    if let Ok(val) = env::var("OOM_SENTINEL_NOTIFY") {
        raw.notify = Some(parse_bool(&val)?);
    }
    if let Ok(val) = env::var("OOM_SENTINEL_NOTIFY_DBUS") {
        raw.notify_dbus = Some(parse_bool(&val)?);
    }
    if let Ok(val) = env::var("OOM_SENTINEL_DRY_RUN") {
        raw.dryrun = Some(parse_bool(&val)?);
    }
    if let Ok(val) = env::var("OOM_SENTINEL_PRIORITY") {
        raw.priority = Some(val.parse()?);
    }
    if let Ok(val) = env::var("OOM_SENTINEL_PRE_KILL_SCRIPT") {
        raw.pre_kill_script = Some(val);
    }
    if let Ok(val) = env::var("OOM_SENTINEL_POST_KILL_SCRIPT") {
        raw.post_kill_script = Some(val);
    }

    Ok(raw)
}

/// Accepts: true/false, 1/0, yes/no, on/off (case-insensitive)
fn parse_bool(s: &str) -> Result<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("invalid boolean value: {s}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true").unwrap());
        assert!(parse_bool("TRUE").unwrap());
        assert!(parse_bool("1").unwrap());
        assert!(parse_bool("yes").unwrap());
        assert!(parse_bool("on").unwrap());

        assert!(!parse_bool("false").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(!parse_bool("no").unwrap());
        assert!(!parse_bool("off").unwrap());

        assert!(parse_bool("invalid").is_err());
    }

    #[test]
    fn test_env_override_applies() {
        env::set_var("OOM_SENTINEL_MEM_TERM", "12.5");
        let raw = apply_env_overrides(RawConfig::default()).unwrap();
        assert_eq!(raw.mem_term_pct, Some(12.5));
        env::remove_var("OOM_SENTINEL_MEM_TERM");
    }
}
