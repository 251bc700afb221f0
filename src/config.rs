//! YAML configuration for a glyphmatch run.
//!
//! One document configures every stage. Each section converts into the
//! typed config of the crate it drives, and validation runs both here and in
//! the stage itself.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//!
//! matching:
//!   mode: "progressive"      # standard | fast | full | progressive
//!   accept: 0.20
//!   fast_accept: 0.25
//!   plausible: 0.45
//!   min_separation: 0.03
//!   placement_weight: 1.0    # 0 compares shapes only
//!   placement_tolerance: 0.05
//!   explain: false
//!
//! catalog:
//!   fonts_dir: "fonts"
//!   character_set: "curated" # curated | full
//!   tiers: [128, 256, 512]
//!   cache_dir: ".glyphmatch-cache"
//!
//! input:
//!   downloads_dir: "downloads"
//!   flip_y: false
//!
//! dispatch:
//!   workers: 8
//!   batch_size: 8
//!
//! output:
//!   mapping_file: "ttf_character_mapping.json"
//!   save_images: true
//!   images_dir: "unresolved_glyphs"
//!
//! logging:
//!   level: "info"
//!   json: false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use catalog::{CatalogConfig, CharacterSet, Style};
use matcher::{DispatchConfig, FilterConfig, MatchMode, MatcherConfig, Thresholds};
use perceptual::{HashConfig, SimilarityConfig};
use raster::{RasterConfig, Tier};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level configuration for a decoding run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GlyphmatchConfig {
    /// Configuration format version
    pub version: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub matching: MatchingYamlConfig,

    #[serde(default)]
    pub catalog: CatalogYamlConfig,

    #[serde(default)]
    pub input: InputYamlConfig,

    #[serde(default)]
    pub dispatch: DispatchYamlConfig,

    #[serde(default)]
    pub output: OutputYamlConfig,

    #[serde(default)]
    pub logging: LoggingYamlConfig,
}

impl GlyphmatchConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: GlyphmatchConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        let catalog = self.catalog.to_catalog_config()?;
        let matching = self.matching.to_matcher_config()?;
        if matching.mode == MatchMode::Full && catalog.character_set != CharacterSet::Full {
            return Err(ConfigLoadError::Validation(
                "matching.mode \"full\" requires catalog.character_set \"full\"".to_string(),
            ));
        }
        if let Some(tier) = matching.fixed_tier {
            if !catalog.tiers.contains(&tier) {
                return Err(ConfigLoadError::Validation(format!(
                    "matching.fixed_tier {} is not one of catalog.tiers",
                    tier.side()
                )));
            }
        }
        self.dispatch.to_dispatch_config()?;
        self.output.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Switch the match mode, keeping the catalog character set consistent
    /// with it.
    pub fn set_mode(&mut self, mode: MatchMode) {
        self.matching.mode = mode.as_str().to_string();
        if mode == MatchMode::Full {
            self.catalog.character_set = CharacterSet::Full.as_str().to_string();
        }
    }
}

impl Default for GlyphmatchConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            matching: MatchingYamlConfig::default(),
            catalog: CatalogYamlConfig::default(),
            input: InputYamlConfig::default(),
            dispatch: DispatchYamlConfig::default(),
            output: OutputYamlConfig::default(),
            logging: LoggingYamlConfig::default(),
        }
    }
}

/// Matching policy section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingYamlConfig {
    #[serde(default = "default_mode")]
    pub mode: String,

    #[serde(default = "default_accept")]
    pub accept: f64,

    #[serde(default = "default_fast_accept")]
    pub fast_accept: f64,

    #[serde(default = "default_plausible")]
    pub plausible: f64,

    #[serde(default = "default_min_separation")]
    pub min_separation: f64,

    /// Initial phase-1 Hamming fraction; fast mode uses `fast_filter_fraction`.
    #[serde(default = "default_filter_fraction")]
    pub filter_fraction: f64,

    #[serde(default = "default_fast_filter_fraction")]
    pub fast_filter_fraction: f64,

    #[serde(default = "default_max_filter_fraction")]
    pub max_filter_fraction: f64,

    /// Distance per em unit of placement difference; see
    /// [`SimilarityConfig::placement_weight`].
    #[serde(default = "default_placement_weight")]
    pub placement_weight: f64,

    #[serde(default = "default_placement_tolerance")]
    pub placement_tolerance: f64,

    /// Tier for non-progressive modes, in pixels.
    #[serde(default)]
    pub fixed_tier: Option<u32>,

    #[serde(default)]
    pub explain: bool,
}

impl MatchingYamlConfig {
    pub fn to_matcher_config(&self) -> Result<MatcherConfig, ConfigLoadError> {
        let mode: MatchMode = self
            .mode
            .parse()
            .map_err(|_| invalid(format!("matching.mode must be one of: {MODES:?}")))?;
        let thresholds = Thresholds {
            accept: self.accept,
            fast_accept: self.fast_accept,
            plausible: self.plausible,
            min_separation: self.min_separation,
            ..Thresholds::default()
        };
        let filter = FilterConfig {
            fraction: self.filter_fraction,
            fast_fraction: self.fast_filter_fraction,
            max_fraction: self.max_filter_fraction,
            ..FilterConfig::default()
        };
        let similarity = SimilarityConfig::default()
            .with_placement(self.placement_weight, self.placement_tolerance);
        let mut cfg = MatcherConfig::new(mode)
            .with_thresholds(thresholds)
            .with_filter(filter)
            .with_similarity(similarity)
            .with_explain(self.explain);
        if let Some(side) = self.fixed_tier {
            let tier = Tier::new(side).map_err(|e| invalid(format!("matching.fixed_tier: {e}")))?;
            cfg = cfg.with_fixed_tier(tier);
        }
        cfg.validate()
            .map_err(|e| invalid(format!("matching: {e}")))?;
        Ok(cfg)
    }
}

impl Default for MatchingYamlConfig {
    fn default() -> Self {
        let thresholds = Thresholds::default();
        let filter = FilterConfig::default();
        Self {
            mode: default_mode(),
            accept: thresholds.accept,
            fast_accept: thresholds.fast_accept,
            plausible: thresholds.plausible,
            min_separation: thresholds.min_separation,
            filter_fraction: filter.fraction,
            fast_filter_fraction: filter.fast_fraction,
            max_filter_fraction: filter.max_fraction,
            placement_weight: default_placement_weight(),
            placement_tolerance: default_placement_tolerance(),
            fixed_tier: None,
            explain: false,
        }
    }
}

/// Reference catalog section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogYamlConfig {
    #[serde(default = "default_fonts_dir")]
    pub fonts_dir: PathBuf,

    /// Family to use; otherwise the batch's font family hint decides.
    #[serde(default)]
    pub family: Option<String>,

    #[serde(default = "default_character_set")]
    pub character_set: String,

    #[serde(default = "default_styles")]
    pub styles: Vec<Style>,

    #[serde(default = "default_tiers")]
    pub tiers: Vec<u32>,

    /// Fraction of the tier side left empty on each edge.
    #[serde(default = "default_padding")]
    pub padding: f32,

    #[serde(default = "default_hash_grid")]
    pub hash_grid: usize,

    /// Directory for cached catalog tiers; no caching when unset.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "true_value")]
    pub use_parallel: bool,
}

impl CatalogYamlConfig {
    pub fn to_catalog_config(&self) -> Result<CatalogConfig, ConfigLoadError> {
        let character_set = match self.character_set.as_str() {
            "curated" => CharacterSet::Curated,
            "full" => CharacterSet::Full,
            _ => {
                return Err(invalid(
                    "catalog.character_set must be one of: [\"curated\", \"full\"]".to_string(),
                ))
            }
        };
        let tiers = self
            .tiers
            .iter()
            .map(|&side| Tier::new(side))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| invalid(format!("catalog.tiers: {e}")))?;
        let cfg = CatalogConfig::default()
            .with_character_set(character_set)
            .with_styles(self.styles.clone())
            .with_tiers(tiers)
            .with_raster(RasterConfig::default().with_padding(self.padding))
            .with_hash(HashConfig::default().with_grid(self.hash_grid))
            .with_parallel(self.use_parallel);
        cfg.validate().map_err(|e| invalid(format!("catalog: {e}")))?;
        Ok(cfg)
    }
}

impl Default for CatalogYamlConfig {
    fn default() -> Self {
        Self {
            fonts_dir: default_fonts_dir(),
            family: None,
            character_set: default_character_set(),
            styles: default_styles(),
            tiers: default_tiers(),
            padding: default_padding(),
            hash_grid: default_hash_grid(),
            cache_dir: None,
            use_parallel: true,
        }
    }
}

/// Glyph batch input section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputYamlConfig {
    /// Root holding one directory per book.
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,

    /// Source paths use an upward y axis.
    #[serde(default)]
    pub flip_y: bool,
}

impl Default for InputYamlConfig {
    fn default() -> Self {
        Self {
            downloads_dir: default_downloads_dir(),
            flip_y: false,
        }
    }
}

/// Worker pool section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchYamlConfig {
    /// Pool size; every available core when unset.
    #[serde(default)]
    pub workers: Option<usize>,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl DispatchYamlConfig {
    pub fn to_dispatch_config(&self) -> Result<DispatchConfig, ConfigLoadError> {
        let cfg = DispatchConfig {
            workers: self.workers,
            batch_size: self.batch_size,
        };
        cfg.validate().map_err(|e| invalid(format!("dispatch: {e}")))?;
        Ok(cfg)
    }
}

impl Default for DispatchYamlConfig {
    fn default() -> Self {
        Self {
            workers: None,
            batch_size: default_batch_size(),
        }
    }
}

/// Output section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputYamlConfig {
    /// Mapping file name, written inside the book directory when relative.
    #[serde(default = "default_mapping_file")]
    pub mapping_file: PathBuf,

    /// Dump unresolved glyph rasters as PNG.
    #[serde(default = "true_value")]
    pub save_images: bool,

    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,
}

impl OutputYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.mapping_file.as_os_str().is_empty() {
            return Err(invalid("output.mapping_file must not be empty".to_string()));
        }
        if self.save_images && self.images_dir.as_os_str().is_empty() {
            return Err(invalid(
                "output.images_dir must not be empty when save_images is on".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for OutputYamlConfig {
    fn default() -> Self {
        Self {
            mapping_file: default_mapping_file(),
            save_images: true,
            images_dir: default_images_dir(),
        }
    }
}

/// Logging section, applied by the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingYamlConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl LoggingYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.to_ascii_lowercase().as_str()) {
            return Err(invalid(format!(
                "logging.level must be one of: {valid_levels:?}"
            )));
        }
        Ok(())
    }
}

impl Default for LoggingYamlConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

const MODES: [&str; 4] = ["standard", "fast", "full", "progressive"];

fn invalid(message: String) -> ConfigLoadError {
    ConfigLoadError::Validation(message)
}

fn default_mode() -> String {
    MatchMode::default().as_str().to_string()
}
fn default_accept() -> f64 {
    Thresholds::default().accept
}
fn default_fast_accept() -> f64 {
    Thresholds::default().fast_accept
}
fn default_plausible() -> f64 {
    Thresholds::default().plausible
}
fn default_min_separation() -> f64 {
    Thresholds::default().min_separation
}
fn default_filter_fraction() -> f64 {
    FilterConfig::default().fraction
}
fn default_fast_filter_fraction() -> f64 {
    FilterConfig::default().fast_fraction
}
fn default_max_filter_fraction() -> f64 {
    FilterConfig::default().max_fraction
}
fn default_placement_weight() -> f64 {
    SimilarityConfig::default().placement_weight
}
fn default_placement_tolerance() -> f64 {
    SimilarityConfig::default().placement_tolerance
}
fn default_fonts_dir() -> PathBuf {
    PathBuf::from("fonts")
}
fn default_character_set() -> String {
    CharacterSet::default().as_str().to_string()
}
fn default_styles() -> Vec<Style> {
    Style::ALL.to_vec()
}
fn default_tiers() -> Vec<u32> {
    Tier::default_ladder().into_iter().map(Tier::side).collect()
}
fn default_padding() -> f32 {
    RasterConfig::default().padding
}
fn default_hash_grid() -> usize {
    HashConfig::default().grid
}
fn default_downloads_dir() -> PathBuf {
    PathBuf::from("downloads")
}
fn default_batch_size() -> usize {
    DispatchConfig::default().batch_size
}
fn default_mapping_file() -> PathBuf {
    PathBuf::from("ttf_character_mapping.json")
}
fn default_images_dir() -> PathBuf {
    PathBuf::from("unresolved_glyphs")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn true_value() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = GlyphmatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.matching.mode, "progressive");
        assert_eq!(config.catalog.fonts_dir, PathBuf::from("fonts"));
        assert_eq!(config.output.mapping_file, PathBuf::from("ttf_character_mapping.json"));
        assert!(config.output.save_images);
    }

    #[test]
    fn test_load_minimal_yaml() {
        let config = GlyphmatchConfig::from_yaml("version: \"1\"\n").unwrap();
        assert_eq!(config, GlyphmatchConfig {
            version: "1".to_string(),
            ..GlyphmatchConfig::default()
        });
    }

    #[test]
    fn test_load_from_file() {
        let yaml = r#"
version: "1.0"
matching:
  mode: "fast"
dispatch:
  workers: 2
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();

        let config = GlyphmatchConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.matching.to_matcher_config().unwrap().mode, MatchMode::Fast);
        assert_eq!(config.dispatch.to_dispatch_config().unwrap().workers, Some(2));
    }

    #[test]
    fn test_unsupported_version() {
        let err = GlyphmatchConfig::from_yaml("version: \"2\"\n").unwrap_err();
        assert!(matches!(err, ConfigLoadError::UnsupportedVersion(v) if v == "2"));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let yaml = "version: \"1.0\"\nmatching:\n  mode: \"turbo\"\n";
        let err = GlyphmatchConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("matching.mode"));
    }

    #[test]
    fn test_tier_below_minimum_rejected() {
        let yaml = "version: \"1.0\"\ncatalog:\n  tiers: [16, 128]\n";
        let err = GlyphmatchConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("catalog.tiers"));
    }

    #[test]
    fn test_full_mode_needs_full_character_set() {
        let yaml = "version: \"1.0\"\nmatching:\n  mode: \"full\"\n";
        assert!(GlyphmatchConfig::from_yaml(yaml).is_err());

        let mut config = GlyphmatchConfig::default();
        config.set_mode(MatchMode::Full);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_placement_settings_reach_the_scorer() {
        let yaml = "version: \"1.0\"\nmatching:\n  placement_weight: 0.5\n  placement_tolerance: 0.1\n";
        let config = GlyphmatchConfig::from_yaml(yaml).unwrap();
        let similarity = config.matching.to_matcher_config().unwrap().similarity;
        assert_eq!(similarity.placement_weight, 0.5);
        assert_eq!(similarity.placement_tolerance, 0.1);

        let yaml = "version: \"1.0\"\nmatching:\n  placement_weight: -1.0\n";
        let err = GlyphmatchConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("placement"));
    }

    #[test]
    fn test_fixed_tier_must_be_built() {
        let yaml = "version: \"1.0\"\nmatching:\n  mode: \"standard\"\n  fixed_tier: 1024\n";
        let err = GlyphmatchConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("fixed_tier"));
    }

    #[test]
    fn test_thresholds_are_checked_by_the_matcher() {
        let yaml = "version: \"1.0\"\nmatching:\n  accept: 0.9\n";
        let err = GlyphmatchConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("plausible"));
    }

    #[test]
    fn test_full_yaml_roundtrip() {
        let yaml = r#"
version: "1.0"
name: "book run"
matching:
  mode: "standard"
  accept: 0.15
  fast_accept: 0.2
  plausible: 0.4
  min_separation: 0.05
  fixed_tier: 256
  explain: true
catalog:
  fonts_dir: "/srv/fonts"
  family: "Bookerly"
  character_set: "curated"
  styles: ["regular", "bold"]
  tiers: [128, 256]
  padding: 0.1
  hash_grid: 12
  cache_dir: "/tmp/glyph-cache"
input:
  downloads_dir: "/srv/books"
  flip_y: true
dispatch:
  workers: 4
  batch_size: 16
output:
  mapping_file: "mapping.json"
  save_images: false
logging:
  level: "debug"
  json: true
"#;
        let config = GlyphmatchConfig::from_yaml(yaml).unwrap();

        let matching = config.matching.to_matcher_config().unwrap();
        assert_eq!(matching.mode, MatchMode::Standard);
        assert_eq!(matching.fixed_tier, Some(Tier::T256));
        assert!(matching.explain);

        let catalog = config.catalog.to_catalog_config().unwrap();
        assert_eq!(catalog.styles, vec![Style::Regular, Style::Bold]);
        assert_eq!(catalog.tiers, vec![Tier::T128, Tier::T256]);
        assert_eq!(catalog.hash.grid, 12);
        assert_eq!(config.catalog.family.as_deref(), Some("Bookerly"));

        assert!(config.input.flip_y);
        assert_eq!(config.dispatch.to_dispatch_config().unwrap().batch_size, 16);
        assert!(!config.output.save_images);
        assert!(config.logging.json);

        let again = GlyphmatchConfig::from_yaml(&serde_yaml::to_string(&config).unwrap()).unwrap();
        assert_eq!(again, config);
    }
}
