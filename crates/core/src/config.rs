use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Longest accepted `purge_interval`, in seconds (ten years).
pub const MAX_PURGE_INTERVAL: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("config has no targets")]
    NoTargets,
    #[error("target #{index}: path is empty")]
    EmptyPath { index: usize },
    #[error("target #{index} ({}): purge_interval must be greater than zero", .path.display())]
    ZeroInterval { index: usize, path: PathBuf },
    #[error(
        "target #{index} ({}): purge_interval {secs} exceeds the maximum of {}",
        .path.display(),
        MAX_PURGE_INTERVAL
    )]
    IntervalTooLarge {
        index: usize,
        path: PathBuf,
        secs: u64,
    },
    #[error("target #{index} ({}): invalid filter {filter:?}: {source}", .path.display())]
    InvalidFilter {
        index: usize,
        path: PathBuf,
        filter: String,
        #[source]
        source: regex::Error,
    },
}

/// One purge job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// File or directory; existence is checked on every cycle, not at load time.
    pub path: PathBuf,
    /// Regex matched against file names during a directory walk. Empty matches everything.
    #[serde(default)]
    pub filter: String,
    /// Seconds between purge cycles.
    pub purge_interval: u64,
    /// Pages per second, 0 = unthrottled.
    #[serde(default)]
    pub rate: u64,
}

impl Target {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval)
    }

    /// Reject intervals a timer cannot be armed with.
    pub fn check_interval(&self, index: usize) -> Result<(), ConfigError> {
        match self.purge_interval {
            0 => Err(ConfigError::ZeroInterval {
                index,
                path: self.path.clone(),
            }),
            secs if secs > MAX_PURGE_INTERVAL => Err(ConfigError::IntervalTooLarge {
                index,
                path: self.path.clone(),
                secs,
            }),
            _ => Ok(()),
        }
    }

    /// Compile `filter`. Empty compiles to a matcher that accepts every name.
    pub fn compile_filter(&self) -> Result<Regex, ConfigError> {
        self.compile_filter_at(0)
    }

    /// Like [`Target::compile_filter`], reporting errors against target number `index`.
    pub fn compile_filter_at(&self, index: usize) -> Result<Regex, ConfigError> {
        Regex::new(&self.filter).map_err(|source| ConfigError::InvalidFilter {
            index,
            path: self.path.clone(),
            filter: self.filter.clone(),
            source,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub targets: Vec<Target>,
}

impl Config {
    pub fn from_toml(s: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Config::from_toml(&s, path)
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.targets.is_empty() {
        return Err(ConfigError::NoTargets);
    }
    for (index, target) in config.targets.iter().enumerate() {
        if target.path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath { index });
        }
        target.check_interval(index)?;
        target.compile_filter_at(index)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(path: &str, filter: &str, interval: u64) -> Target {
        Target {
            path: path.into(),
            filter: filter.into(),
            purge_interval: interval,
            rate: 0,
        }
    }

    #[test]
    fn parses_targets_in_order_with_defaults() {
        let src = r#"
            [[targets]]
            path = "/data/logs"
            filter = "\\.log$"
            purge_interval = 5
            rate = 1048576

            [[targets]]
            path = "/data/big.bin"
            purge_interval = 10
        "#;
        let cfg = Config::from_toml(src, Path::new("test.toml")).unwrap();
        assert_eq!(cfg.targets.len(), 2);
        assert_eq!(cfg.targets[0].path, PathBuf::from("/data/logs"));
        assert_eq!(cfg.targets[0].filter, r"\.log$");
        assert_eq!(cfg.targets[0].rate, 1 << 20);
        assert_eq!(cfg.targets[1].filter, "");
        assert_eq!(cfg.targets[1].rate, 0);
        assert_eq!(cfg.targets[1].interval(), Duration::from_secs(10));
    }

    #[test]
    fn missing_interval_is_a_parse_error() {
        let src = "[[targets]]\npath = \"/tmp\"\n";
        let err = Config::from_toml(src, Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn validate_accepts_good_config() {
        let cfg = Config {
            targets: vec![target("/var/log", r"\.log$", 60), target("/tmp/x", "", 1)],
        };
        validate_config(&cfg).unwrap();
    }

    #[test]
    fn validate_rejects_empty_target_list() {
        let err = validate_config(&Config::default()).unwrap_err();
        assert!(matches!(err, ConfigError::NoTargets));
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let cfg = Config {
            targets: vec![target("/var/log", "", 60), target("/var/tmp", "", 0)],
        };
        match validate_config(&cfg).unwrap_err() {
            ConfigError::ZeroInterval { index, path } => {
                assert_eq!(index, 1);
                assert_eq!(path, PathBuf::from("/var/tmp"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_rejects_interval_beyond_maximum() {
        let cfg = Config {
            targets: vec![target("/var/log", "", MAX_PURGE_INTERVAL)],
        };
        validate_config(&cfg).unwrap();

        let cfg = Config {
            targets: vec![target("/var/log", "", u64::MAX)],
        };
        match validate_config(&cfg).unwrap_err() {
            ConfigError::IntervalTooLarge { index, secs, .. } => {
                assert_eq!(index, 0);
                assert_eq!(secs, u64::MAX);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_rejects_bad_filter() {
        let cfg = Config {
            targets: vec![target("/var/log", "(unclosed", 60)],
        };
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFilter { index: 0, .. }));
    }

    #[test]
    fn validate_rejects_empty_path() {
        let cfg = Config {
            targets: vec![target("", "", 60)],
        };
        assert!(matches!(
            validate_config(&cfg).unwrap_err(),
            ConfigError::EmptyPath { index: 0 }
        ));
    }

    #[test]
    fn empty_filter_matches_everything() {
        let re = target("/tmp", "", 1).compile_filter().unwrap();
        assert!(re.is_match("anything.bin"));
    }
}
