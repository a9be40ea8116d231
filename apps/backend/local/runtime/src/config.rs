use inception_core::{ConfigError, ServingConfig};
use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub serving: ServingConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            port: env::var("PORT")
                .unwrap_or_else(|_| "9527".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
            serving: ServingConfig::from_env()?,
        })
    }
}
