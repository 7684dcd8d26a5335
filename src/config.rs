use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::amount::{serde_units, tokens, Amount, BurnRate};
use crate::error::ConfigError;

pub const DEFAULT_NAME: &str = "Simple DeFi Token";
pub const DEFAULT_SYMBOL: &str = "SDFT";
pub const DEFAULT_SUPPLY: Amount = tokens(1_000_000);

/// Immutable token parameters fixed at genesis.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TokenConfig {
    pub name: String,
    pub symbol: String,
    /// Supply credited to the deployer at genesis, in base units.
    #[serde(with = "serde_units")]
    pub initial_supply: Amount,
    pub burn_rate: BurnRate,
    /// Reject plain transfers whose recipient is [`Address::ZERO`](crate::Address::ZERO).
    pub reject_zero_recipient: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            symbol: DEFAULT_SYMBOL.to_string(),
            initial_supply: DEFAULT_SUPPLY,
            burn_rate: BurnRate::default(),
            reject_zero_recipient: true,
        }
    }
}

impl TokenConfig {
    /// Reads a JSON config; absent fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path)?;
        let config: TokenConfig = serde_json::from_slice(&bytes)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), symbol = %config.symbol, "loaded token config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyField("name"));
        }
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::EmptyField("symbol"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_the_sdft_parameters() {
        let config = TokenConfig::default();
        assert_eq!(config.name, "Simple DeFi Token");
        assert_eq!(config.symbol, "SDFT");
        assert_eq!(config.initial_supply, tokens(1_000_000));
        assert_eq!(config.burn_rate, BurnRate::percent(10).unwrap());
        assert!(config.reject_zero_recipient);
    }

    #[test]
    fn load_fills_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(
            &path,
            r#"{"symbol":"BURN","burn_rate":"0.25","initial_supply":"5000000000000000000"}"#,
        )
        .unwrap();
        let config = TokenConfig::load(&path).unwrap();
        assert_eq!(config.name, DEFAULT_NAME);
        assert_eq!(config.symbol, "BURN");
        assert_eq!(config.burn_rate, BurnRate::percent(25).unwrap());
        assert_eq!(config.initial_supply, tokens(5));
    }

    #[test]
    fn load_rejects_invalid_burn_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, r#"{"burn_rate":"1.5"}"#).unwrap();
        assert!(matches!(TokenConfig::load(&path), Err(ConfigError::Json(_))));
    }

    #[test]
    fn load_rejects_empty_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, r#"{"symbol":"  "}"#).unwrap();
        assert!(matches!(
            TokenConfig::load(&path),
            Err(ConfigError::EmptyField("symbol"))
        ));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = TokenConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""initial_supply":"1000000000000000000000000""#));
        assert!(json.contains(r#""burn_rate":"0.1""#));
        assert_eq!(serde_json::from_str::<TokenConfig>(&json).unwrap(), config);
    }
}
