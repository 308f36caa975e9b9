use crate::config::fees::FeeEstimateConfig;
use crate::config::ledger::LedgerClientConfig;
use crate::config::reconciliation::ReconciliationConfig;
use crate::config::*;
use crate::error::{Error, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ledger: LedgerClientConfig,
    pub reconciliation: ReconciliationConfig,
    pub fees: FeeEstimateConfig,
    pub store: StoreConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Layered load: `config/default`, then `config/{env}`, then `FEERECON__*` variables.
    pub fn load(env: &str) -> Result<Self> {
        Self::load_from("config", env)
    }

    pub fn load_from(dir: &str, env: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(&format!("{}/default", dir)).required(false))
            .add_source(File::with_name(&format!("{}/{}", dir, env)).required(false))
            .add_source(Environment::with_prefix("FEERECON").separator("__"))
            .build()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        let app: AppConfig = config.try_deserialize()
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        if self.reconciliation.max_concurrency == 0 {
            return Err(Error::ConfigError("reconciliation.max_concurrency must be at least 1".to_string()));
        }
        if self.reconciliation.epsilon.is_negative() {
            return Err(Error::ConfigError("reconciliation.epsilon must not be negative".to_string()));
        }
        if self.ledger.max_attempts == 0 {
            return Err(Error::ConfigError("ledger.max_attempts must be at least 1".to_string()));
        }
        if self.fees.flat_fee.is_negative() {
            return Err(Error::ConfigError("fees.flat_fee must not be negative".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::amount::Amount;

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let config = AppConfig::load_from("does/not/exist", "test").unwrap();
        assert_eq!(config.reconciliation.max_concurrency, 8);
        assert_eq!(config.reconciliation.epsilon, Amount::from_minor(1));
        assert_eq!(config.fees.percentage_bps, 290);
        assert_eq!(config.ledger.max_attempts, 4);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = AppConfig::default();
        config.reconciliation.max_concurrency = 0;
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_partial_fees_table_keeps_other_defaults() {
        let app: AppConfig = Config::builder()
            .add_source(File::from_str("[fees]\npercentage_bps = 250", config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(app.fees.percentage_bps, 250);
        assert_eq!(app.fees.flat_fee, Amount::from_minor(30));
        assert!(app.validate().is_ok());
    }
}
