//! Subcommand implementations.

pub mod deploy;
pub mod errors;
pub mod fetch;
pub mod helpers;
pub mod manifest;
pub mod tag;

use crate::GlobalArgs;
use anyhow::Result;
use ltd_common::config::{ConfigError, ConfigSource};
use ltd_common::deploy::{Pipeline, TokioSleeper};
use ltd_common::errors::ErrorCode;
use ltd_common::util::mask_token;
use ltd_common::{ArtifactStore, Lifetime, LifetimeClient, LifetimeEndpoint, PipelineConfig};
use tracing::{debug, warn};

/// Resolved config plus a LifeTime connection for one command.
pub struct Session {
    pub lifetime: Lifetime,
    pub config: PipelineConfig,
    sleeper: TokioSleeper,
}

impl Session {
    pub fn connect(global: &GlobalArgs) -> Result<Self> {
        let config = load_config(global)?;
        let url = global
            .lt_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| missing("LifeTime host: pass --lt-url or set LTD_LT_URL"))?;
        let token = global
            .lt_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| missing("LifeTime token: pass --lt-token or set LTD_LT_TOKEN"))?;

        let endpoint = LifetimeEndpoint::parse(url, &global.lt_endpoint, global.lt_api_version);
        debug!(
            endpoint = %endpoint.base(),
            token = %mask_token(token),
            ssl_cert_verify = config.ssl_cert_verify,
            "connecting to LifeTime"
        );
        let client = LifetimeClient::new(endpoint, token, config.ssl_cert_verify)?;
        let lifetime = Lifetime::new(client, ArtifactStore::new(&global.artifacts))?;
        Ok(Self {
            lifetime,
            config,
            sleeper: TokioSleeper,
        })
    }

    pub fn pipeline(&self) -> Pipeline<'_> {
        Pipeline::new(&self.lifetime, &self.config, &self.sleeper)
    }
}

/// Layered pipeline config; warnings are logged, invalid values fail.
pub fn load_config(global: &GlobalArgs) -> Result<PipelineConfig> {
    let loaded = PipelineConfig::load(global.config_file.as_deref())?;
    for warning in &loaded.warnings {
        warn!(code = %ErrorCode::ConfigValidationError.code_string(), %warning, "configuration");
    }
    for (key, source) in &loaded.sources {
        if *source != ConfigSource::Default {
            debug!(key, %source, "config override");
        }
    }
    Ok(loaded.config)
}

fn missing(what: &str) -> ConfigError {
    ConfigError::MissingConnection(what.to_string())
}
