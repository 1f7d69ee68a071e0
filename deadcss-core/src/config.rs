//! Configuration loading from deadcss.toml.
//!
//! ```toml
//! ignore_prefixes = ["ant", "ng-", "mat-", "cdk-", "swiper-"]
//! exclude = ["vendor"]
//! markup_extensions = ["html"]
//! stylesheet_extensions = ["css", "scss"]
//! backup = true
//!
//! [output]
//! format = "json"
//! ```
//!
//! Every key is optional; absent keys keep the builder defaults.

use serde::Deserialize;
use std::{fs, path::Path};

use crate::error::{DeadcssError, DeadcssResult, IoResultExt};

/// File name looked up at the scan root.
pub const CONFIG_FILE_NAME: &str = "deadcss.toml";

/// Main configuration structure for deadcss.toml.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DeadcssConfig {
    /// Class prefixes that always survive; replaces the default list.
    pub ignore_prefixes: Option<Vec<String>>,
    /// Extra directory names to skip.
    pub exclude: Option<Vec<String>>,
    /// Markup extensions, highest priority first.
    pub markup_extensions: Option<Vec<String>>,
    /// Stylesheet extensions.
    pub stylesheet_extensions: Option<Vec<String>>,
    /// Whether to keep a backup of rewritten stylesheets.
    pub backup: Option<bool>,
    /// Output configuration.
    pub output: Option<OutputConfig>,
}

/// Output format configuration.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Output format: "plain" or "json".
    pub format: Option<String>,
}

impl DeadcssConfig {
    /// Whether `output.format` asks for JSON.
    pub fn wants_json(&self) -> bool {
        self.output
            .as_ref()
            .and_then(|o| o.format.as_deref())
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
    }

    fn validate(mut self, path: &Path) -> DeadcssResult<Self> {
        // An empty prefix would keep every class rule
        if let Some(prefixes) = self.ignore_prefixes.as_mut() {
            prefixes.retain(|p| !p.trim().is_empty());
        }

        for (key, list) in [
            ("markup_extensions", &mut self.markup_extensions),
            ("stylesheet_extensions", &mut self.stylesheet_extensions),
        ] {
            if let Some(exts) = list.as_mut() {
                for ext in exts.iter_mut() {
                    *ext = ext.trim_start_matches('.').to_string();
                }
                if exts.iter().any(String::is_empty) {
                    return Err(DeadcssError::config(
                        path,
                        format!("{} contains an empty extension", key),
                    ));
                }
            }
        }

        if let Some(format) = self.output.as_ref().and_then(|o| o.format.as_deref()) {
            if !matches!(format.to_ascii_lowercase().as_str(), "plain" | "json") {
                return Err(DeadcssError::config(
                    path,
                    format!("unknown output format '{}', expected plain or json", format),
                ));
            }
        }

        Ok(self)
    }
}

/// Loads configuration from deadcss.toml at `root` if it exists.
pub fn load_config(root: &Path) -> DeadcssResult<Option<DeadcssConfig>> {
    let path = root.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(None);
    }
    load_config_file(&path).map(Some)
}

/// Loads an explicitly named configuration file.
pub fn load_config_file(path: &Path) -> DeadcssResult<DeadcssConfig> {
    let content = fs::read_to_string(path).with_path(path)?;
    let cfg: DeadcssConfig = toml::from_str(&content)
        .map_err(|e| DeadcssError::config(path, e.message().to_string()))?;
    cfg.validate(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn create_temp_dir(name: &str) -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir()
            .join("deadcss_config_test")
            .join(format!("{}_{}_{}", name, std::process::id(), id));
        if dir.exists() {
            fs::remove_dir_all(&dir).ok();
        }
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_missing_config_is_none() {
        let dir = create_temp_dir("missing");
        assert_eq!(load_config(&dir).unwrap(), None);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let dir = create_temp_dir("full");
        fs::write(
            dir.join(CONFIG_FILE_NAME),
            r#"
ignore_prefixes = ["ant", "", "swiper-"]
exclude = ["vendor"]
markup_extensions = [".html"]
backup = false

[output]
format = "JSON"
"#,
        )
        .unwrap();

        let cfg = load_config(&dir).unwrap().unwrap();
        assert_eq!(
            cfg.ignore_prefixes,
            Some(vec!["ant".to_string(), "swiper-".to_string()])
        );
        assert_eq!(cfg.exclude, Some(vec!["vendor".to_string()]));
        assert_eq!(cfg.markup_extensions, Some(vec!["html".to_string()]));
        assert_eq!(cfg.stylesheet_extensions, None);
        assert_eq!(cfg.backup, Some(false));
        assert!(cfg.wants_json());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = create_temp_dir("invalid");
        fs::write(dir.join(CONFIG_FILE_NAME), "ignore_prefixes = [").unwrap();

        let err = load_config(&dir).unwrap_err();
        assert!(matches!(err, DeadcssError::Config { .. }));
        assert_eq!(err.path(), Some(&dir.join(CONFIG_FILE_NAME)));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = create_temp_dir("unknown");
        fs::write(dir.join(CONFIG_FILE_NAME), "ignore = [\"x\"]").unwrap();
        assert!(load_config(&dir).is_err());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_bad_output_format_rejected() {
        let dir = create_temp_dir("format");
        let path = dir.join("custom.toml");
        fs::write(&path, "[output]\nformat = \"xml\"").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(err.to_string().contains("xml"));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_empty_extension_rejected() {
        let dir = create_temp_dir("ext");
        let path = dir.join("custom.toml");
        fs::write(&path, "stylesheet_extensions = [\"css\", \".\"]").unwrap();
        assert!(load_config_file(&path).is_err());
        fs::remove_dir_all(&dir).ok();
    }
}
