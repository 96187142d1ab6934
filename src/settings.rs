//! Runtime settings from environment variables. Binaries load `.env` first.

use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_OUTPUT_DIR: &str = "generated";
pub const DEFAULT_SCHEMA: &str = "appgen";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
/// Default request body limit for definition payloads (2 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid {var}: '{value}'")]
pub struct SettingsError {
    pub var: &'static str,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Root directory for emitted artifacts (`APPGEN_OUTPUT_DIR`).
    pub output_dir: PathBuf,
    /// Schema holding the `_sys_*` tables (`APPGEN_SCHEMA`).
    pub schema: String,
    /// PostgreSQL persistence when set; file persistence under the output directory otherwise.
    pub database_url: Option<String>,
    pub bind: String,
    pub body_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            schema: DEFAULT_SCHEMA.to_string(),
            database_url: None,
            bind: DEFAULT_BIND.to_string(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut settings = Settings::default();
        if let Some(dir) = get("APPGEN_OUTPUT_DIR") {
            settings.output_dir = PathBuf::from(dir);
        }
        if let Some(schema) = get("APPGEN_SCHEMA") {
            settings.schema = schema;
        }
        settings.database_url = get("DATABASE_URL");
        if let Some(bind) = get("APPGEN_BIND") {
            settings.bind = bind;
        }
        if let Some(limit) = get("APPGEN_BODY_LIMIT") {
            settings.body_limit = limit.trim().parse().map_err(|_| SettingsError {
                var: "APPGEN_BODY_LIMIT",
                value: limit.clone(),
            })?;
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let settings = Settings::from_lookup(lookup(&[("DATABASE_URL", "")])).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn variables_override_defaults() {
        let settings = Settings::from_lookup(lookup(&[
            ("APPGEN_OUTPUT_DIR", "/tmp/out"),
            ("APPGEN_SCHEMA", "gen"),
            ("DATABASE_URL", "postgres://localhost/appgen"),
            ("APPGEN_BODY_LIMIT", "1024"),
        ]))
        .unwrap();
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(settings.schema, "gen");
        assert_eq!(settings.database_url.as_deref(), Some("postgres://localhost/appgen"));
        assert_eq!(settings.body_limit, 1024);
        assert_eq!(settings.bind, DEFAULT_BIND);
    }

    #[test]
    fn bad_body_limit_is_reported() {
        let err = Settings::from_lookup(lookup(&[("APPGEN_BODY_LIMIT", "lots")])).unwrap_err();
        assert_eq!(err.var, "APPGEN_BODY_LIMIT");
    }
}
