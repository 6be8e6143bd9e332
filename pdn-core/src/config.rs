//! Configuration system for the PDN pipeline.
//!
//! Uses `figment` for layered configuration: defaults -> user config ->
//! workspace config -> explicit file -> environment. Command-line flags are
//! applied by the caller on the loaded value.
//! Configuration is loaded from the user config dir (`config.toml`) and/or
//! `.pdn/config.toml` in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::orchestrator::SourceLayout;
use crate::quality::RuleSet;

/// Directory holding workspace-local configuration.
pub const WORKSPACE_DIR: &str = ".pdn";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub declarations: ExtractionConfig,
    pub procurement: ExtractionConfig,
    pub quality: QualityConfig,
    pub profile: ProfileConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            declarations: ExtractionConfig::declarations(),
            procurement: ExtractionConfig::procurement(),
            quality: QualityConfig::default(),
            profile: ProfileConfig::default(),
        }
    }
}

/// Settings for one extraction corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionConfig {
    /// Root holding one source per jurisdiction.
    pub input_dir: PathBuf,
    /// Root receiving one subdirectory per jurisdiction.
    pub output_dir: PathBuf,
    pub layout: SourceLayout,
    /// Jurisdictions reprocessed even when their output already exists.
    #[serde(default)]
    pub force_reprocess: Vec<String>,
    /// Concurrent jurisdictions; 0 means available cores.
    #[serde(default)]
    pub max_workers: usize,
}

impl ExtractionConfig {
    pub fn declarations() -> Self {
        Self {
            input_dir: PathBuf::from("PDN_S1/states"),
            output_dir: PathBuf::from("csv_outputs"),
            layout: SourceLayout::PerDirectory {
                canonical_file: "completo.json".into(),
                extension: "json".into(),
            },
            force_reprocess: Vec::new(),
            max_workers: 0,
        }
    }

    pub fn procurement() -> Self {
        Self {
            input_dir: PathBuf::from("PDN_S6"),
            output_dir: PathBuf::from("csv_outputs_s6"),
            layout: SourceLayout::FlatSuffix {
                suffix: "_releases.json".into(),
            },
            force_reprocess: Vec::new(),
            max_workers: 0,
        }
    }

    /// Worker count with 0 resolved to the available cores.
    pub fn effective_workers(&self) -> usize {
        if self.max_workers > 0 {
            self.max_workers
        } else {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        }
    }

    pub fn validate(&self, section: &str) -> Vec<String> {
        let mut problems = Vec::new();
        if self.input_dir.as_os_str().is_empty() {
            problems.push(format!("{section}.input_dir must not be empty"));
        }
        if self.output_dir.as_os_str().is_empty() {
            problems.push(format!("{section}.output_dir must not be empty"));
        }
        match &self.layout {
            SourceLayout::PerDirectory {
                canonical_file,
                extension,
            } => {
                if canonical_file.trim().is_empty() || extension.trim().is_empty() {
                    problems.push(format!(
                        "{section}.layout needs a canonical_file and an extension"
                    ));
                }
            }
            SourceLayout::FlatSuffix { suffix } => {
                if suffix.trim().is_empty() {
                    problems.push(format!("{section}.layout.suffix must not be empty"));
                }
            }
        }
        problems
    }
}

/// Settings for the income quality classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QualityConfig {
    /// Extraction output root holding `<jurisdiction>/<relation_file>`.
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub relation_file: String,
    pub clean_file: String,
    pub audit_file: String,
    pub rules: RuleSet,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("csv_outputs"),
            output_dir: PathBuf::from("clean_data"),
            relation_file: "s1_ingresos.csv".into(),
            clean_file: "s1_ingresos_clean.csv".into(),
            audit_file: "audit_log_ingresos.csv".into(),
            rules: RuleSet::default(),
        }
    }
}

impl QualityConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut problems = self.rules.validate();
        for (name, value) in [
            ("relation_file", &self.relation_file),
            ("clean_file", &self.clean_file),
            ("audit_file", &self.audit_file),
        ] {
            if value.trim().is_empty() {
                problems.push(format!("quality.{name} must not be empty"));
            }
        }
        if self.clean_file == self.audit_file {
            problems.push("quality.clean_file and quality.audit_file must differ".into());
        }
        problems
    }
}

/// Settings for the exploratory income profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProfileConfig {
    /// `k` in the `Q3 + k * IQR` upper bound.
    pub iqr_multiplier: f64,
    /// Number of highest annual incomes listed.
    pub top_n: usize,
    /// Numeric fields profiled.
    pub fields: Vec<String>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            iqr_multiplier: 3.0,
            top_n: 5,
            fields: vec![
                "remuneracion_mensual_cargo".into(),
                "otros_ingresos_mensuales".into(),
                "ingreso_mensual_neto".into(),
                "ingreso_anual_neto".into(),
            ],
        }
    }
}

impl ProfileConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.iqr_multiplier.is_finite() || self.iqr_multiplier < 0.0 {
            problems.push("profile.iqr_multiplier must be a finite, non-negative number".into());
        }
        if self.fields.is_empty() {
            problems.push("profile.fields must not be empty".into());
        }
        problems
    }
}

impl PipelineConfig {
    /// Collect every configuration problem.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = self.declarations.validate("declarations");
        problems.extend(self.procurement.validate("procurement"));
        problems.extend(self.quality.validate());
        problems.extend(self.profile.validate());
        problems
    }

    /// Fail fast on the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid {
                message: problems.join("; "),
            })
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("mx", "dataton", "pdn")
}

/// Path of the user-level config file, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(WORKSPACE_DIR).join("config.toml")
}

/// Directory for log files.
pub fn log_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("logs"))
}

/// Load configuration from all sources, merged in priority order.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `PDN_`)
/// 3. Explicit config file (`--config`)
/// 4. Workspace-local config (`.pdn/config.toml`)
/// 5. User config (`config.toml` in the user config dir)
/// 6. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<PipelineConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(PipelineConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    // Environment variables (PDN_QUALITY__OUTPUT_DIR, PDN_DECLARATIONS__MAX_WORKERS, etc.)
    figment = figment.merge(Env::prefixed("PDN_").split("__"));

    let config: PipelineConfig = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Check whether any configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}

/// Write the default configuration to `<workspace>/.pdn/config.toml`.
///
/// Refuses to overwrite an existing file unless `force` is set.
pub fn write_default_config(workspace: &Path, force: bool) -> Result<PathBuf, ConfigError> {
    let path = workspace_config_path(workspace);
    if path.exists() && !force {
        return Err(ConfigError::Invalid {
            message: format!("{} already exists", path.display()),
        });
    }
    let rendered = render_toml(&PipelineConfig::default())?;
    let write_err = |err: std::io::Error| ConfigError::Invalid {
        message: format!("cannot write {}: {err}", path.display()),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(&path, rendered).map_err(write_err)?;
    Ok(path)
}

/// Render a configuration as TOML.
pub fn render_toml(config: &PipelineConfig) -> Result<String, ConfigError> {
    toml::to_string_pretty(config).map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::RejectionRule;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.declarations.output_dir, PathBuf::from("csv_outputs"));
        assert_eq!(config.quality.relation_file, "s1_ingresos.csv");
        assert_eq!(config.quality.rules.rules().len(), 6);
        assert_eq!(config.profile.iqr_multiplier, 3.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = PipelineConfig::default();
        let toml_str = render_toml(&config).unwrap();
        let deserialized: PipelineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_effective_workers() {
        let mut config = ExtractionConfig::declarations();
        config.max_workers = 3;
        assert_eq!(config.effective_workers(), 3);
        config.max_workers = 0;
        assert!(config.effective_workers() >= 1);
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut config = PipelineConfig::default();
        config.quality.rules = RuleSet::new(vec![RejectionRule::less_than("x", f64::NAN, "")]);
        config.procurement.layout = SourceLayout::FlatSuffix { suffix: " ".into() };
        let problems = config.problems();
        assert_eq!(problems.len(), 3);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("procurement.layout.suffix"));
    }

    #[test]
    fn test_load_config_from_workspace() {
        figment::Jail::expect_with(|jail| {
            jail.create_dir(".pdn")?;
            jail.create_file(
                ".pdn/config.toml",
                r#"
                [declarations]
                input_dir = "data/states"
                output_dir = "out"
                force_reprocess = ["Guerrero"]
                max_workers = 2

                [declarations.layout]
                kind = "per_directory"
                canonical_file = "completo.json"
                extension = "json"

                [[quality.rules]]
                op = "less_than"
                field = "ingreso_anual_neto"
                threshold = 0
                reason = "negative annual income"
                "#,
            )?;
            jail.set_env("PDN_PROFILE__TOP_N", "10");

            let config = load_config(Some(jail.directory()), None)
                .map_err(|e| figment::Error::from(e.to_string()))?;
            assert_eq!(config.declarations.force_reprocess, vec!["Guerrero".to_string()]);
            assert_eq!(config.declarations.max_workers, 2);
            assert_eq!(config.quality.rules.rules().len(), 1);
            assert_eq!(config.profile.top_n, 10);
            assert_eq!(config.procurement, ExtractionConfig::procurement());
            Ok(())
        });
    }

    #[test]
    fn test_load_config_rejects_reserved_reason() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
                [[quality.rules]]
                op = "greater_than"
                field = "ingreso_anual_neto"
                threshold = 10.0
                reason = "OK"
                "#,
            )?;
            let path = jail.directory().join("custom.toml");
            let err = load_config(None, Some(&path)).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { .. }));
            Ok(())
        });
    }

    #[test]
    fn test_load_config_missing_explicit_file() {
        let err = load_config(None, Some(Path::new("/no/such/pdn.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_write_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_default_config(dir.path(), false).unwrap();
        assert!(path.ends_with(".pdn/config.toml"));
        assert!(config_exists(Some(dir.path())));
        assert!(write_default_config(dir.path(), false).is_err());
        assert!(write_default_config(dir.path(), true).is_ok());
    }
}
