use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use client_core::{HttpTransportConfig, StoreConfig, TransitionPolicy};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "orders.toml";
pub const MAX_FETCH_RETRIES: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub fetch_retries: u32,
    pub retry_delay_ms: u64,
    pub transition_policy: TransitionPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "https://api.example.com/orders".into(),
            request_timeout_secs: 10,
            fetch_retries: 2,
            retry_delay_ms: 250,
            transition_policy: TransitionPolicy::Unrestricted,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    api_url: Option<String>,
    request_timeout_secs: Option<u64>,
    fetch_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    transition_policy: Option<String>,
}

impl Settings {
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = Url::parse(&self.api_url)
            .with_context(|| format!("invalid api_url '{}'", self.api_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("api_url must use http or https, got '{}'", url.scheme());
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        if self.fetch_retries > MAX_FETCH_RETRIES {
            bail!(
                "fetch_retries must be at most {MAX_FETCH_RETRIES}, got {}",
                self.fetch_retries
            );
        }
        Ok(())
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            fetch_retries: self.fetch_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            transition_policy: self.transition_policy,
        }
    }

    pub fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            api_url: self.api_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

/// Defaults, then `orders.toml` (or an explicit file), then environment.
/// A missing default file is fine; a missing explicit file is an error.
pub fn load_settings(explicit_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let path = explicit_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(&path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?,
        Err(err) if err.kind() == io::ErrorKind::NotFound && explicit_path.is_none() => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    settings.validate()?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.api_url {
        settings.api_url = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.fetch_retries {
        settings.fetch_retries = v;
    }
    if let Some(v) = file_cfg.retry_delay_ms {
        settings.retry_delay_ms = v;
    }
    if let Some(v) = file_cfg.transition_policy {
        settings.transition_policy = v.parse()?;
    }
    Ok(())
}

fn apply_env(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = lookup("ORDERS_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = lookup("APP__API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        settings.request_timeout_secs = v
            .parse()
            .with_context(|| format!("invalid APP__REQUEST_TIMEOUT_SECS '{v}'"))?;
    }
    if let Some(v) = lookup("APP__FETCH_RETRIES") {
        settings.fetch_retries = v
            .parse()
            .with_context(|| format!("invalid APP__FETCH_RETRIES '{v}'"))?;
    }
    if let Some(v) = lookup("APP__RETRY_DELAY_MS") {
        settings.retry_delay_ms = v
            .parse()
            .with_context(|| format!("invalid APP__RETRY_DELAY_MS '{v}'"))?;
    }
    if let Some(v) = lookup("APP__TRANSITION_POLICY") {
        settings.transition_policy = v.parse()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().expect("defaults validate");
        assert_eq!(settings.store_config().fetch_retries, 2);
        assert_eq!(
            settings.transport_config().request_timeout,
            Duration::from_secs(10)
        );
    }

    #[test]
    fn file_values_override_defaults() {
        let mut settings = Settings::default();
        apply_file(
            &mut settings,
            r#"
                api_url = "http://localhost:8080/orders"
                fetch_retries = 4
                transition_policy = "lifecycle"
            "#,
        )
        .expect("apply file");

        assert_eq!(settings.api_url, "http://localhost:8080/orders");
        assert_eq!(settings.fetch_retries, 4);
        assert_eq!(settings.retry_delay_ms, 250);
        assert_eq!(settings.transition_policy, TransitionPolicy::Lifecycle);
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let mut settings = Settings::default();
        assert!(apply_file(&mut settings, "api_uri = \"http://x\"").is_err());
    }

    #[test]
    fn prefixed_env_wins_over_plain_env() {
        let mut settings = Settings::default();
        apply_env(
            &mut settings,
            env_from(&[
                ("ORDERS_API_URL", "http://plain/orders"),
                ("APP__API_URL", "http://prefixed/orders"),
                ("APP__RETRY_DELAY_MS", "0"),
            ]),
        )
        .expect("apply env");

        assert_eq!(settings.api_url, "http://prefixed/orders");
        assert_eq!(settings.store_config().retry_delay, Duration::ZERO);
    }

    #[test]
    fn malformed_env_numbers_are_reported() {
        let mut settings = Settings::default();
        let err = apply_env(&mut settings, env_from(&[("APP__FETCH_RETRIES", "many")]))
            .expect_err("not a number");
        assert!(err.to_string().contains("APP__FETCH_RETRIES"));
    }

    #[test]
    fn validation_rejects_bad_urls_and_zero_timeout() {
        let mut settings = Settings {
            api_url: "ftp://example.com/orders".into(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        settings.api_url = "not a url".into();
        assert!(settings.validate().is_err());

        settings = Settings {
            request_timeout_secs: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validation_caps_fetch_retries() {
        let mut settings = Settings::default();
        apply_env(&mut settings, env_from(&[("APP__FETCH_RETRIES", "4294967295")]))
            .expect("fits in u32");
        let err = settings.validate().expect_err("too many retries");
        assert!(err.to_string().contains("fetch_retries"));

        settings.fetch_retries = MAX_FETCH_RETRIES;
        settings.validate().expect("cap itself is allowed");
    }

    #[test]
    fn explicit_config_file_is_loaded_and_must_exist() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let temp_root = env::temp_dir().join(format!("orders_cli_config_test_{suffix}"));
        fs::create_dir_all(&temp_root).expect("temp root");

        let path = temp_root.join("orders.toml");
        fs::write(&path, "api_url = \"http://127.0.0.1:9000/orders\"\n").expect("write");
        let settings = load_settings(Some(&path)).expect("load");
        assert_eq!(settings.api_url, "http://127.0.0.1:9000/orders");

        assert!(load_settings(Some(&temp_root.join("missing.toml"))).is_err());

        fs::remove_dir_all(temp_root).expect("cleanup");
    }
}
