use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::blockchain::{DEFAULT_DIFFICULTY, MINE_RATE_MS, PowParams};
use crate::error::ConfigError;

/// Settings for the gossip server.
#[derive(Debug, Clone)]
pub struct P2pConfig {
    pub host: String,
    pub port: u16,
    /// Static outbound peers, e.g. `ws://localhost:5002`.
    pub peers: Vec<String>,
    pub dial_timeout: Duration,
    pub dial_attempts: u32,
    pub dial_backoff: Duration,
    pub send_timeout: Duration,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5001,
            peers: Vec::new(),
            dial_timeout: Duration::from_secs(5),
            dial_attempts: 3,
            dial_backoff: Duration::from_secs(2),
            send_timeout: Duration::from_secs(5),
        }
    }
}

/// Whole-node configuration, built once in `main` and passed down.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub host: String,
    pub http_port: u16,
    pub p2p: P2pConfig,
    pub pow: PowParams,
}

impl NodeConfig {
    /// Read from the process environment (call `dotenvy::dotenv()` first).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let p2p = P2pConfig {
            host: host.clone(),
            port: parse_or(&lookup, "P2P_PORT", 5001)?,
            peers: lookup("PEERS").map(|v| parse_peers(&v)).unwrap_or_default(),
            ..P2pConfig::default()
        };
        let difficulty: i32 = parse_or(&lookup, "DIFFICULTY", DEFAULT_DIFFICULTY)?;
        if difficulty < 0 {
            return Err(ConfigError::Invalid {
                key: "DIFFICULTY",
                value: difficulty.to_string(),
            });
        }
        let mine_rate_ms: i64 = parse_or(&lookup, "MINE_RATE", MINE_RATE_MS)?;
        if mine_rate_ms <= 0 {
            return Err(ConfigError::Invalid {
                key: "MINE_RATE",
                value: mine_rate_ms.to_string(),
            });
        }
        Ok(Self {
            host,
            http_port: parse_or(&lookup, "HTTP_PORT", 3001)?,
            p2p,
            pow: PowParams {
                difficulty,
                mine_rate_ms,
            },
        })
    }
}

/// Split a comma-separated peer list, dropping blanks.
pub fn parse_peers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = NodeConfig::from_lookup(|_| None).expect("config");
        assert_eq!(cfg.http_port, 3001);
        assert_eq!(cfg.p2p.port, 5001);
        assert!(cfg.p2p.peers.is_empty());
        assert_eq!(cfg.pow, PowParams::default());
    }

    #[test]
    fn reads_all_keys() {
        let cfg = NodeConfig::from_lookup(lookup_from(&[
            ("HOST", "0.0.0.0"),
            ("HTTP_PORT", "3002"),
            ("P2P_PORT", "5002"),
            ("PEERS", "ws://localhost:5001, ws://localhost:5003,"),
            ("DIFFICULTY", "4"),
            ("MINE_RATE", "1000"),
        ]))
        .expect("config");
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.p2p.host, "0.0.0.0");
        assert_eq!(cfg.http_port, 3002);
        assert_eq!(cfg.p2p.port, 5002);
        assert_eq!(
            cfg.p2p.peers,
            vec!["ws://localhost:5001".to_string(), "ws://localhost:5003".to_string()]
        );
        assert_eq!(cfg.pow.difficulty, 4);
        assert_eq!(cfg.pow.mine_rate_ms, 1000);
    }

    #[test]
    fn empty_peer_list_means_no_dialing() {
        assert!(parse_peers("").is_empty());
        assert!(parse_peers(" , ").is_empty());
    }

    #[test]
    fn rejects_unparsable_port() {
        let err = NodeConfig::from_lookup(lookup_from(&[("P2P_PORT", "not-a-port")]))
            .expect_err("should fail");
        assert!(matches!(err, ConfigError::Invalid { key: "P2P_PORT", .. }));
    }

    #[test]
    fn rejects_non_positive_mine_rate_and_negative_difficulty() {
        for rate in ["0", "-5"] {
            let err = NodeConfig::from_lookup(lookup_from(&[("MINE_RATE", rate)]))
                .expect_err("mine rate must be positive");
            assert!(matches!(err, ConfigError::Invalid { key: "MINE_RATE", .. }));
        }
        let err = NodeConfig::from_lookup(lookup_from(&[("DIFFICULTY", "-1")]))
            .expect_err("difficulty must not be negative");
        assert!(matches!(err, ConfigError::Invalid { key: "DIFFICULTY", .. }));
    }
}
