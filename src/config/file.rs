// Configuration file parsing: line-oriented key=value, `#`/`;` comments

use crate::error::AppError;
use std::collections::HashMap;
use std::io::BufRead;

const RECOGNIZED_KEYS: &[&str] = &[
    "report_interval",
    "nice",
    "ignore_oom_score_adj",
    "notify_dbus",
    "memory_high",
    "memory_low",
    "memory_kill",
    "memory_emerg",
    "swap_low",
    "swap_kill",
    "prefer_regex",
    "avoid_regex",
    "avoid_users",
    "prefer_old",
    "emerg_kill",
];

/// A parsed configuration file: raw `key -> value` pairs. Values are kept
/// as strings; callers interpret them per the recognized-key list.
#[derive(Debug, Default, Clone)]
pub struct ConfigFile {
    values: HashMap<String, String>,
}

impl ConfigFile {
    pub fn load(path: &str) -> Result<Self, AppError> {
        let file = std::fs::File::open(path)
            .map_err(|e| AppError::ConfigUnreadable(format!("{path}: {e}")))?;
        Self::parse(std::io::BufReader::new(file))
    }

    fn parse<R: BufRead>(reader: R) -> Result<Self, AppError> {
        let mut values = HashMap::new();

        for line in reader.lines() {
            let line = line.map_err(|e| AppError::ConfigUnreadable(e.to_string()))?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                log::warn!("ignoring unparseable config line: {line}");
                continue;
            };
            let key = key.trim();
            let value = value.trim().to_string();

            if !RECOGNIZED_KEYS.contains(&key) {
                log::warn!("ignoring unrecognized config key: {key}");
                continue;
            }

            values.insert(key.to_string(), value);
        }

        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Split a comma-separated list and cap it at `max_entries` names of at
/// most `max_len` bytes each, per the emergency kill-list limits.
pub fn parse_name_list(s: &str, max_entries: usize, max_len: usize) -> Result<Vec<String>, AppError> {
    let mut names = Vec::new();
    for raw in s.split(',') {
        let name = raw.trim();
        if name.is_empty() {
            continue;
        }
        if name.len() > max_len {
            return Err(AppError::BadArgument(format!(
                "emerg_kill entry '{name}' exceeds {max_len} bytes"
            )));
        }
        names.push(name.to_string());
        if names.len() > max_entries {
            return Err(AppError::BadArgument(format!(
                "emerg_kill exceeds {max_entries} entries"
            )));
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse_str(text: &str) -> ConfigFile {
        ConfigFile::parse(Cursor::new(text)).unwrap()
    }

    #[test]
    fn test_parses_key_value() {
        let cfg = parse_str("memory_kill = 5\nswap_kill=3\n");
        assert_eq!(cfg.get("memory_kill"), Some("5"));
        assert_eq!(cfg.get("swap_kill"), Some("3"));
    }

    #[test]
    fn test_ignores_comments_and_blank_lines() {
        let cfg = parse_str("# a comment\n; also a comment\n\nmemory_high=20\n");
        assert_eq!(cfg.get("memory_high"), Some("20"));
        assert!(cfg.get("nice").is_none());
    }

    #[test]
    fn test_ignores_unrecognized_keys() {
        let cfg = parse_str("bogus_key=1\nmemory_low=8\n");
        assert!(cfg.get("bogus_key").is_none());
        assert_eq!(cfg.get("memory_low"), Some("8"));
    }

    #[test]
    fn test_parse_name_list_caps_entries() {
        let names = "a,b,c";
        assert_eq!(parse_name_list(names, 64, 32).unwrap(), vec!["a", "b", "c"]);
        assert!(parse_name_list(names, 2, 32).is_err());
    }

    #[test]
    fn test_parse_name_list_caps_length() {
        let long_name = "x".repeat(33);
        assert!(parse_name_list(&long_name, 64, 32).is_err());
    }
}
