use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StrataError;

/// Top-level configuration loaded from `.strata.toml`.
///
/// Supports layered resolution: CLI flags > local config > defaults.
///
/// # Examples
///
/// ```
/// use strata_core::StrataConfig;
///
/// let config = StrataConfig::default();
/// assert_eq!(config.mining.change_window_months, 6);
/// assert_eq!(config.hassan.window_days, 14);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrataConfig {
    /// Change path and bug-link settings.
    #[serde(default)]
    pub mining: MiningConfig,
    /// Which release files are tracked.
    #[serde(default)]
    pub files: FilesConfig,
    /// Hassan complexity-of-change parameters.
    #[serde(default)]
    pub hassan: HassanConfig,
    /// D'Ambros churn/entropy of source code metrics parameters.
    #[serde(default)]
    pub dambros: DambrosConfig,
}

impl StrataConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Io`] if the file cannot be read,
    /// [`StrataError::Toml`] if the content is not valid TOML, or
    /// [`StrataError::Config`] if a value is out of range.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use strata_core::StrataConfig;
    /// use std::path::Path;
    ///
    /// let config = StrataConfig::from_file(Path::new(".strata.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, StrataError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Toml`] if parsing fails and
    /// [`StrataError::Config`] if validation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_core::StrataConfig;
    ///
    /// let toml = r#"
    /// [hassan]
    /// window_days = 7
    /// "#;
    /// let config = StrataConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.hassan.window_days, 7);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, StrataError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the metric calculations cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Config`] describing the first bad value.
    pub fn validate(&self) -> Result<(), StrataError> {
        if self.hassan.window_days == 0 {
            return Err(StrataError::Config(
                "hassan.window_days must be at least 1".into(),
            ));
        }
        if self.mining.snapshot_window_days < 0 {
            return Err(StrataError::Config(
                "mining.snapshot_window_days must not be negative".into(),
            ));
        }
        let phis = [
            ("hassan.phi1", self.hassan.phi1),
            ("hassan.phi2", self.hassan.phi2),
            ("hassan.phi3", self.hassan.phi3),
            ("dambros.phi1", self.dambros.phi1),
            ("dambros.phi2", self.dambros.phi2),
            ("dambros.phi3", self.dambros.phi3),
        ];
        for (name, value) in phis {
            if !value.is_finite() || value <= 0.0 {
                return Err(StrataError::Config(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Change path and bug-link settings.
///
/// # Examples
///
/// ```
/// use strata_core::MiningConfig;
///
/// let config = MiningConfig::default();
/// assert_eq!(config.snapshot_window_days, 14);
/// assert_eq!(config.inducing_label, "JLMIV++");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Months before the release that bound the change path (default: 6).
    #[serde(default = "default_change_window_months")]
    pub change_window_months: u32,
    /// Minimum days between two static-metric snapshots (default: 14).
    #[serde(default = "default_snapshot_window_days")]
    pub snapshot_window_days: i64,
    /// SZZ label of the inducing links to follow (default: `"JLMIV++"`).
    #[serde(default = "default_inducing_label")]
    pub inducing_label: String,
}

fn default_change_window_months() -> u32 {
    6
}

fn default_snapshot_window_days() -> i64 {
    14
}

fn default_inducing_label() -> String {
    "JLMIV++".into()
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            change_window_months: default_change_window_months(),
            snapshot_window_days: default_snapshot_window_days(),
            inducing_label: default_inducing_label(),
        }
    }
}

/// Release file selection.
///
/// # Examples
///
/// ```
/// use strata_core::FilesConfig;
///
/// let files = FilesConfig::default();
/// assert!(files.is_tracked("src/main/java/org/Foo.java"));
/// assert!(!files.is_tracked("src/test/java/org/FooTest.java"));
/// assert!(!files.is_tracked("README.md"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// File extensions (without the dot) that belong to the release.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Drop test sources (default: true).
    #[serde(default = "default_production_only")]
    pub production_only: bool,
}

fn default_extensions() -> Vec<String> {
    vec!["java".into()]
}

fn default_production_only() -> bool {
    true
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            production_only: default_production_only(),
        }
    }
}

impl FilesConfig {
    /// Whether a repository-relative path is a tracked release file.
    pub fn is_tracked(&self, path: &str) -> bool {
        let Some((stem_path, extension)) = path.rsplit_once('.') else {
            return false;
        };
        if !self.extensions.iter().any(|e| e == extension) {
            return false;
        }
        if self.production_only && is_test_path(stem_path) {
            return false;
        }
        true
    }
}

fn is_test_path(stem_path: &str) -> bool {
    let mut components = stem_path.split('/').peekable();
    while let Some(component) = components.next() {
        if components.peek().is_some() {
            let lower = component.to_lowercase();
            if matches!(lower.as_str(), "test" | "tests" | "testing" | "androidtest") {
                return true;
            }
        } else if is_test_file_stem(component) {
            return true;
        }
    }
    false
}

/// `Test`/`Tests` as a whole camel-case or snake-case word of a file stem.
fn is_test_file_stem(stem: &str) -> bool {
    let lower = stem.to_lowercase();
    if matches!(lower.as_str(), "test" | "tests") {
        return true;
    }
    if lower.starts_with("test_") || lower.ends_with("_test") || lower.ends_with("_tests") {
        return true;
    }
    if let Some(rest) = stem.strip_prefix("Test") {
        let rest = rest.strip_prefix('s').unwrap_or(rest);
        if rest
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return true;
        }
    }
    stem.ends_with("Test") || stem.ends_with("Tests") || stem.ends_with("TestCase")
}

/// Parameters of the Hassan complexity-of-change metrics.
///
/// # Examples
///
/// ```
/// use strata_core::HassanConfig;
///
/// let config = HassanConfig::default();
/// assert_eq!(config.phi1, 1.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HassanConfig {
    /// Size of one entropy period in days (default: 14).
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    /// Linear decay factor.
    #[serde(default = "default_phi")]
    pub phi1: f64,
    /// Logarithmic decay factor.
    #[serde(default = "default_phi")]
    pub phi2: f64,
    /// Exponential decay factor.
    #[serde(default = "default_phi")]
    pub phi3: f64,
}

fn default_window_days() -> i64 {
    14
}

fn default_phi() -> f64 {
    1.0
}

impl Default for HassanConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            phi1: default_phi(),
            phi2: default_phi(),
            phi3: default_phi(),
        }
    }
}

/// Parameters of the D'Ambros churn and entropy of source code metrics.
///
/// # Examples
///
/// ```
/// use strata_core::DambrosConfig;
///
/// let config = DambrosConfig::default();
/// assert_eq!(config.alpha, 0.01);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DambrosConfig {
    /// Weight of a delta in the scaled churn `1 + alpha * |delta|`.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Exponential decay factor.
    #[serde(default = "default_phi")]
    pub phi1: f64,
    /// Linear decay factor.
    #[serde(default = "default_phi")]
    pub phi2: f64,
    /// Logarithmic decay factor.
    #[serde(default = "default_phi")]
    pub phi3: f64,
}

fn default_alpha() -> f64 {
    0.01
}

impl Default for DambrosConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            phi1: default_phi(),
            phi2: default_phi(),
            phi3: default_phi(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = StrataConfig::default();
        assert_eq!(config.mining.change_window_months, 6);
        assert_eq!(config.mining.snapshot_window_days, 14);
        assert_eq!(config.mining.inducing_label, "JLMIV++");
        assert_eq!(config.files.extensions, vec!["java"]);
        assert!(config.files.production_only);
        assert_eq!(config.hassan.window_days, 14);
        assert_eq!(config.dambros.alpha, 0.01);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[mining]
change_window_months = 3
snapshot_window_days = 7
inducing_label = "SZZ"

[files]
extensions = ["rs", "java"]
production_only = false

[hassan]
window_days = 7
phi1 = 0.5

[dambros]
alpha = 0.1
phi3 = 2.0
"#;
        let config = StrataConfig::from_toml(toml).unwrap();
        assert_eq!(config.mining.change_window_months, 3);
        assert_eq!(config.mining.snapshot_window_days, 7);
        assert_eq!(config.mining.inducing_label, "SZZ");
        assert_eq!(config.files.extensions, vec!["rs", "java"]);
        assert!(!config.files.production_only);
        assert_eq!(config.hassan.window_days, 7);
        assert_eq!(config.hassan.phi1, 0.5);
        assert_eq!(config.hassan.phi2, 1.0);
        assert_eq!(config.dambros.alpha, 0.1);
        assert_eq!(config.dambros.phi3, 2.0);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = StrataConfig::from_toml("").unwrap();
        assert_eq!(config.hassan.window_days, 14);
        assert_eq!(config.mining.change_window_months, 6);
    }

    #[test]
    fn invalid_toml_returns_error() {
        assert!(StrataConfig::from_toml("{{invalid}}").is_err());
    }

    #[test]
    fn zero_window_is_rejected() {
        let err = StrataConfig::from_toml("[hassan]\nwindow_days = 0\n").unwrap_err();
        assert!(matches!(err, StrataError::Config(_)));
    }

    #[test]
    fn non_positive_decay_is_rejected() {
        let err = StrataConfig::from_toml("[dambros]\nphi2 = 0.0\n").unwrap_err();
        assert!(err.to_string().contains("dambros.phi2"));
    }

    #[test]
    fn production_filter_drops_test_sources() {
        let files = FilesConfig::default();
        assert!(files.is_tracked("A/A.java"));
        assert!(!files.is_tracked("src/tests/Helper.java"));
        assert!(!files.is_tracked("src/main/java/TestUtils.java"));
        assert!(!files.is_tracked("src/main/java/ParserTests.java"));
        assert!(!files.is_tracked("Makefile"));
    }

    #[test]
    fn test_word_must_stand_alone_in_file_names() {
        let files = FilesConfig::default();
        assert!(files.is_tracked("src/main/java/Latest.java"));
        assert!(files.is_tracked("src/main/java/Contest.java"));
        assert!(files.is_tracked("src/main/java/Testament.java"));
        assert!(files.is_tracked("src/main/java/Attestation.java"));
        assert!(!files.is_tracked("src/main/java/ContestTest.java"));
        assert!(!files.is_tracked("src/main/java/Test.java"));
        assert!(!files.is_tracked("src/main/java/TestsHelper.java"));
        assert!(!files.is_tracked("src/main/java/ParserTestCase.java"));
        assert!(!files.is_tracked("src/main/java/parser_test.java"));
    }

    #[test]
    fn test_sources_tracked_when_not_production_only() {
        let files = FilesConfig {
            extensions: vec!["java".into()],
            production_only: false,
        };
        assert!(files.is_tracked("src/test/java/FooTest.java"));
    }
}
