//! Pipeline configuration.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::verify::{parse_pubkey_list, VerifiedPubkeys};
use crate::Error;

pub const ENV_VERIFIED_PUBKEYS: &str = "LIGHTFOOT_VERIFIED_PUBKEYS";
pub const ENV_WORKERS: &str = "LIGHTFOOT_WORKERS";
pub const ENV_WORKER_RESERVE: &str = "LIGHTFOOT_WORKER_RESERVE";
pub const ENV_WORKER_FLOOR: &str = "LIGHTFOOT_WORKER_FLOOR";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "LIGHTFOOT_REQUEST_TIMEOUT_SECS";

/// Cores left free for the event source and cache when sizing the pool.
pub const DEFAULT_WORKER_RESERVE: usize = 5;
/// Smallest pool built from the sizing rule.
pub const DEFAULT_WORKER_FLOOR: usize = 4;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Explicit pool size. `Some(0)` disables the pool; `None` applies the
    /// sizing rule.
    pub workers: Option<usize>,
    pub reserve: usize,
    pub floor: usize,
    /// Per-request deadline for pooled work. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: None,
            reserve: DEFAULT_WORKER_RESERVE,
            floor: DEFAULT_WORKER_FLOOR,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

impl DispatchConfig {
    /// Config for a fixed number of units.
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: Some(workers),
            ..Default::default()
        }
    }

    /// Config that always processes in the caller's task.
    pub fn direct() -> Self {
        Self::with_workers(0)
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_reserve(mut self, reserve: usize) -> Self {
        self.reserve = reserve;
        self
    }

    pub fn with_floor(mut self, floor: usize) -> Self {
        self.floor = floor;
        self
    }

    /// Number of execution units to start.
    pub fn pool_size(&self) -> usize {
        match self.workers {
            Some(workers) => workers,
            None => {
                let cores = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(self.floor);
                size_for_cores(cores, self.reserve, self.floor)
            }
        }
    }
}

/// `max(cores - reserve, floor)`.
pub fn size_for_cores(cores: usize, reserve: usize, floor: usize) -> usize {
    cores.saturating_sub(reserve).max(floor)
}

/// Top-level configuration for the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Operators whose boxes are marked verified.
    pub verified_pubkeys: Vec<String>,
    pub dispatch: DispatchConfig,
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional env vars:
    /// - `LIGHTFOOT_VERIFIED_PUBKEYS` (comma-separated)
    /// - `LIGHTFOOT_WORKERS` (fixed pool size, 0 disables the pool)
    /// - `LIGHTFOOT_WORKER_RESERVE` (default: 5)
    /// - `LIGHTFOOT_WORKER_FLOOR` (default: 4)
    /// - `LIGHTFOOT_REQUEST_TIMEOUT_SECS` (default: 30, 0 disables)
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let verified_pubkeys = lookup(ENV_VERIFIED_PUBKEYS)
            .map(|raw| parse_pubkey_list(&raw))
            .unwrap_or_default();

        let defaults = DispatchConfig::default();
        let workers = parse_number(&lookup, ENV_WORKERS)?;
        let reserve = parse_number(&lookup, ENV_WORKER_RESERVE)?.unwrap_or(defaults.reserve);
        let floor = parse_number(&lookup, ENV_WORKER_FLOOR)?.unwrap_or(defaults.floor);
        let request_timeout = match parse_number(&lookup, ENV_REQUEST_TIMEOUT_SECS)? {
            None => defaults.request_timeout,
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs as u64)),
        };

        Ok(Self {
            verified_pubkeys,
            dispatch: DispatchConfig {
                workers,
                reserve,
                floor,
                request_timeout,
            },
        })
    }

    pub fn with_verified_pubkeys<I, S>(mut self, pubkeys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.verified_pubkeys = pubkeys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn verifier(&self) -> Arc<VerifiedPubkeys> {
        Arc::new(VerifiedPubkeys::new(self.verified_pubkeys.iter().cloned()))
    }
}

fn parse_number<F>(lookup: &F, key: &str) -> Result<Option<usize>, Error>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| {
                Error::Config(format!("{key} must be a non-negative integer, got {raw:?}"))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::PubkeyVerifier;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_size_for_cores() {
        assert_eq!(size_for_cores(16, 5, 4), 11);
        assert_eq!(size_for_cores(8, 5, 4), 4);
        assert_eq!(size_for_cores(2, 5, 4), 4);
        assert_eq!(size_for_cores(0, 0, 0), 0);
    }

    #[test]
    fn test_pool_size() {
        assert_eq!(DispatchConfig::with_workers(3).pool_size(), 3);
        assert_eq!(DispatchConfig::direct().pool_size(), 0);
        assert!(DispatchConfig::default().pool_size() >= DEFAULT_WORKER_FLOOR);
        assert!(DispatchConfig::default().with_floor(7).pool_size() >= 7);
    }

    #[test]
    fn test_defaults_from_empty_env() {
        let config = PipelineConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.dispatch.request_timeout, Some(DEFAULT_REQUEST_TIMEOUT));
    }

    #[test]
    fn test_from_lookup() {
        let config = PipelineConfig::from_lookup(lookup_from(&[
            (ENV_VERIFIED_PUBKEYS, "ABC, def ,,"),
            (ENV_WORKERS, "6"),
            (ENV_WORKER_RESERVE, "2"),
            (ENV_WORKER_FLOOR, " "),
            (ENV_REQUEST_TIMEOUT_SECS, "0"),
        ]))
        .unwrap();

        assert_eq!(config.verified_pubkeys, vec!["abc", "def"]);
        assert_eq!(config.dispatch.workers, Some(6));
        assert_eq!(config.dispatch.reserve, 2);
        assert_eq!(config.dispatch.floor, DEFAULT_WORKER_FLOOR);
        assert_eq!(config.dispatch.request_timeout, None);
        assert!(config.verifier().is_verified("abc"));
    }

    #[test]
    fn test_invalid_number() {
        let result = PipelineConfig::from_lookup(lookup_from(&[(ENV_WORKERS, "-1")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
