use crate::error::ConfigError;
use config::{Config, File};
use serde::{Deserialize, Serialize};

/// Where the signing material comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WalletSource {
    /// One hex-encoded private key per line; blank lines and `#` comments
    /// are ignored.
    File { path: String },
    /// Comma-separated hex keys in an environment variable.
    Env { key: String },
}

/// Top-level service configuration, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencerConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub db_path: String,
    pub wallet_source: WalletSource,

    /// Cap on submitted-but-unconfirmed transactions per wallet.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: u64,

    /// Fixed interval between queue-processing wake-ups.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Interval between pool balance rechecks.
    #[serde(default = "default_balance_refresh_ms")]
    pub balance_refresh_ms: u64,

    /// Wallets below this balance (wei, decimal string) are disabled.
    #[serde(default = "default_min_balance_wei")]
    pub min_balance_wei: String,

    /// Gas limit applied when a submission does not specify one.
    #[serde(default = "default_gas_limit")]
    pub default_gas_limit: u64,
}

fn default_max_in_flight() -> u64 {
    8
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

fn default_balance_refresh_ms() -> u64 {
    60_000
}

fn default_min_balance_wei() -> String {
    // 0.01 ether
    "10000000000000000".to_string()
}

fn default_gas_limit() -> u64 {
    120_000
}

impl SequencerConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path))
            .build()
            .map_err(|e| ConfigError::LoadFailed {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| ConfigError::LoadFailed {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc_url.is_empty() {
            return Err(ConfigError::MissingField {
                field: "rpc_url".to_string(),
            });
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_in_flight".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval_ms".to_string(),
                reason: "must be non-zero".to_string(),
            });
        }
        if self.min_balance_wei.is_empty() || !self.min_balance_wei.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ConfigError::InvalidValue {
                field: "min_balance_wei".to_string(),
                reason: "expected a decimal integer string".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> SequencerConfig {
        SequencerConfig {
            rpc_url: "https://rpc.example.com".to_string(),
            chain_id: 11155111,
            db_path: "sequencer.db".to_string(),
            wallet_source: WalletSource::Env {
                key: "SEQUENCER_KEYS".to_string(),
            },
            max_in_flight: default_max_in_flight(),
            poll_interval_ms: default_poll_interval_ms(),
            balance_refresh_ms: default_balance_refresh_ms(),
            min_balance_wei: default_min_balance_wei(),
            default_gas_limit: default_gas_limit(),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_zero_max_in_flight_rejected() {
        let mut config = base_config();
        config.max_in_flight = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "max_in_flight"
        ));
    }

    #[test]
    fn test_non_decimal_threshold_rejected() {
        let mut config = base_config();
        config.min_balance_wei = "0x10".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_wallet_source_toml_tagging() {
        let toml = r#"{"type":"file","path":"keys.txt"}"#;
        let source: WalletSource = serde_json::from_str(toml).unwrap();
        match source {
            WalletSource::File { path } => assert_eq!(path, "keys.txt"),
            _ => panic!("Expected File variant"),
        }
    }
}
