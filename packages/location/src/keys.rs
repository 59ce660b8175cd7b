//! API key lookup.
//!
//! The environment wins; otherwise the key is read from a TOML file:
//!
//! ```toml
//! [api_keys]
//! quickstats = "..."
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::LocationError;

/// Environment variable holding the `QuickStats` API key.
pub const QUICKSTATS_API_KEY_ENV: &str = "QUICKSTATS_API_KEY";

#[derive(Debug, Default, Deserialize)]
struct KeysFile {
    #[serde(default)]
    api_keys: ApiKeys,
}

#[derive(Debug, Default, Deserialize)]
struct ApiKeys {
    quickstats: Option<String>,
}

/// Returns the `QuickStats` API key from the environment or `keys_file`.
///
/// # Errors
///
/// Returns [`LocationError::MissingApiKey`] if neither source has a key,
/// or an I/O or parse error if the keys file cannot be read.
pub fn quickstats_api_key(keys_file: Option<&Path>) -> Result<String, LocationError> {
    resolve_quickstats_key(std::env::var(QUICKSTATS_API_KEY_ENV).ok(), keys_file)
}

fn resolve_quickstats_key(
    from_env: Option<String>,
    keys_file: Option<&Path>,
) -> Result<String, LocationError> {
    if let Some(key) = from_env.filter(|k| !k.trim().is_empty()) {
        log::debug!("Using QuickStats API key from {QUICKSTATS_API_KEY_ENV}");
        return Ok(key.trim().to_string());
    }

    if let Some(path) = keys_file {
        let contents = std::fs::read_to_string(path).map_err(|source| LocationError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let keys: KeysFile =
            toml::de::from_str(&contents).map_err(|source| LocationError::Toml {
                name: path.display().to_string(),
                source,
            })?;
        if let Some(key) = keys.api_keys.quickstats.filter(|k| !k.trim().is_empty()) {
            log::debug!("Using QuickStats API key from {}", path.display());
            return Ok(key.trim().to_string());
        }
    }

    Err(LocationError::MissingApiKey {
        service: "QuickStats",
        env_var: QUICKSTATS_API_KEY_ENV,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_keys(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("agrisynth_keys_{name}_{}.toml", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn environment_wins_over_file() {
        let path = write_keys("env_wins", "[api_keys]\nquickstats = \"from-file\"\n");
        let key = resolve_quickstats_key(Some("from-env".to_string()), Some(&path)).unwrap();
        assert_eq!(key, "from-env");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn falls_back_to_file() {
        let path = write_keys("fallback", "[api_keys]\nquickstats = \" from-file \"\n");
        let key = resolve_quickstats_key(Some(String::new()), Some(&path)).unwrap();
        assert_eq!(key, "from-file");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_everywhere_is_an_error() {
        let path = write_keys("missing", "[api_keys]\n");
        assert!(matches!(
            resolve_quickstats_key(None, Some(&path)),
            Err(LocationError::MissingApiKey { .. })
        ));
        assert!(matches!(
            resolve_quickstats_key(None, None),
            Err(LocationError::MissingApiKey { .. })
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let path = write_keys("malformed", "api_keys = [");
        assert!(matches!(
            resolve_quickstats_key(None, Some(&path)),
            Err(LocationError::Toml { .. })
        ));
        std::fs::remove_file(&path).ok();
    }
}
