//! Host and run identifiers shared by every probe in the process.

use crate::config::ProbeConfig;
use crate::error::{ProbeError, Result};
use std::sync::{Arc, OnceLock};

/// Host name reported when none can be resolved.
pub const FALLBACK_HOST_ID: &str = "localhost";

/// Identifiers stamped on every probe record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    host_id: String,
    run_id: String,
}

impl ProcessIdentity {
    /// Identity with explicit values.
    pub fn new(host_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            host_id: host_id.into(),
            run_id: run_id.into(),
        }
    }

    /// Resolve identity from config overrides, the host name and a fresh UUID.
    pub fn resolve(config: &ProbeConfig) -> Self {
        let host_id = config.host_id.clone().unwrap_or_else(resolve_host_name);
        let run_id = config
            .run_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Self { host_id, run_id }
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

fn resolve_host_name() -> String {
    host_name_or_fallback(&gethostname::gethostname().to_string_lossy())
}

fn host_name_or_fallback(raw: &str) -> String {
    let name = raw.trim();
    if name.is_empty() {
        log::debug!("system host name is empty, using {}", FALLBACK_HOST_ID);
        return FALLBACK_HOST_ID.to_string();
    }
    name.to_string()
}

/// Config and identity fixed for the lifetime of the process.
#[derive(Debug)]
pub struct Settings {
    pub config: ProbeConfig,
    pub identity: Arc<ProcessIdentity>,
}

impl Settings {
    fn from_config(config: ProbeConfig) -> Self {
        let identity = Arc::new(ProcessIdentity::resolve(&config));
        Self { config, identity }
    }
}

static SETTINGS: OnceLock<Settings> = OnceLock::new();

/// Establish process-wide settings.
///
/// Must run before the first probe is created; once settings exist (set here
/// or read lazily from the environment) they never change.
pub fn init(config: ProbeConfig) -> Result<()> {
    let mut fresh = Some(config);
    SETTINGS.get_or_init(|| Settings::from_config(fresh.take().unwrap_or_default()));
    match fresh {
        None => Ok(()),
        Some(_) => Err(ProbeError::AlreadyInitialized),
    }
}

/// Process-wide settings, read from the environment on first use.
pub fn settings() -> &'static Settings {
    SETTINGS.get_or_init(|| Settings::from_config(ProbeConfig::from_env()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_use_overrides_when_config_sets_them() {
        let id = ProcessIdentity::resolve(&ProbeConfig::new().host_id("h1").run_id("r1"));
        assert_eq!(id.host_id(), "h1");
        assert_eq!(id.run_id(), "r1");
    }

    #[test]
    fn should_generate_distinct_run_ids_when_not_configured() {
        let a = ProcessIdentity::resolve(&ProbeConfig::new().host_id("h"));
        let b = ProcessIdentity::resolve(&ProbeConfig::new().host_id("h"));
        assert_ne!(a.run_id(), b.run_id());
        assert!(uuid::Uuid::parse_str(a.run_id()).is_ok());
    }

    #[test]
    fn should_always_resolve_some_host_name() {
        assert!(!resolve_host_name().is_empty());
    }

    #[test]
    fn should_match_system_host_name_when_not_configured() {
        let system = gethostname::gethostname().to_string_lossy().trim().to_string();
        let id = ProcessIdentity::resolve(&ProbeConfig::new().run_id("r"));
        if system.is_empty() {
            assert_eq!(id.host_id(), FALLBACK_HOST_ID);
        } else {
            assert_eq!(id.host_id(), system);
        }
    }

    #[test]
    fn should_fall_back_to_localhost_when_host_name_blank() {
        assert_eq!(host_name_or_fallback(""), FALLBACK_HOST_ID);
        assert_eq!(host_name_or_fallback(" \n"), FALLBACK_HOST_ID);
        assert_eq!(host_name_or_fallback("build-01\n"), "build-01");
    }

    #[test]
    fn should_keep_settings_stable_across_calls() {
        let first = settings();
        let second = settings();
        assert!(std::ptr::eq(first, second));
        assert!(Arc::ptr_eq(&first.identity, &second.identity));
        assert!(matches!(
            init(ProbeConfig::new()),
            Err(ProbeError::AlreadyInitialized)
        ));
    }
}
