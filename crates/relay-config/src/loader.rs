use std::path::Path;

use secrecy::ExposeSecret;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::parse(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_upstream()?;
        self.validate_relay()?;
        self.validate_retry()?;
        self.validate_rate_limit()?;
        Ok(())
    }

    fn validate_upstream(&self) -> anyhow::Result<()> {
        if self.upstream.api_key.expose_secret().trim().is_empty() {
            anyhow::bail!("upstream.api_key must not be empty");
        }

        if self.upstream.model.trim().is_empty() {
            anyhow::bail!("upstream.model must not be empty");
        }

        if self.upstream.idle_timeout.is_zero() {
            anyhow::bail!("upstream.idle_timeout must be greater than 0");
        }

        Ok(())
    }

    fn validate_relay(&self) -> anyhow::Result<()> {
        let relay = &self.relay;

        if relay.max_concurrent_streams == 0 {
            anyhow::bail!("relay.max_concurrent_streams must be greater than 0");
        }

        if relay.max_tokens_limit == 0 {
            anyhow::bail!("relay.max_tokens_limit must be greater than 0");
        }

        if relay.default_max_tokens == 0 || relay.default_max_tokens > relay.max_tokens_limit {
            anyhow::bail!(
                "relay.default_max_tokens must be between 1 and max_tokens_limit ({})",
                relay.max_tokens_limit
            );
        }

        if !(0.0..=1.0).contains(&relay.default_temperature) {
            anyhow::bail!("relay.default_temperature must be within [0, 1]");
        }

        Ok(())
    }

    fn validate_retry(&self) -> anyhow::Result<()> {
        let retry = &self.relay.retry;

        if retry.max_attempts == 0 {
            anyhow::bail!("relay.retry.max_attempts must be at least 1");
        }

        if retry.initial_backoff > retry.max_backoff {
            anyhow::bail!("relay.retry.initial_backoff must not exceed max_backoff");
        }

        if !retry.multiplier.is_finite() || retry.multiplier < 1.0 {
            anyhow::bail!("relay.retry.multiplier must be a finite value >= 1");
        }

        Ok(())
    }

    fn validate_rate_limit(&self) -> anyhow::Result<()> {
        let Some(ref rate_limit) = self.server.rate_limit else {
            return Ok(());
        };

        for (scope, limit) in [("global", &rate_limit.global), ("per_ip", &rate_limit.per_ip)] {
            let Some(limit) = limit else {
                continue;
            };

            if limit.requests == 0 {
                anyhow::bail!("server.rate_limit.{scope}.requests must be greater than 0");
            }

            if limit.window.is_zero() {
                anyhow::bail!("server.rate_limit.{scope}.window must be greater than 0");
            }
        }

        Ok(())
    }
}
