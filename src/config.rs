use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    pub classification: ClassificationConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Path or http(s) URL of the demographic polygon GeoJSON.
    pub demographics: String,
    /// Paths or URLs of facility point layers.
    #[serde(default)]
    pub facilities: Vec<String>,
    /// Property holding the feature id; the feature index is used when absent.
    pub id_field: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassificationConfig {
    /// Property holding the total population count.
    pub total_field: String,
    /// Exactly three category fields whose shares are compared.
    pub compare: Vec<String>,
    /// How many categories a popup ranking carries.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_neutral_color")]
    pub no_data_color: String,
    #[serde(default = "default_neutral_color")]
    pub no_majority_color: String,
    pub categories: Vec<CategoryConfig>,
}

fn default_top_n() -> usize {
    3
}

fn default_neutral_color() -> String {
    "#808080".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CategoryConfig {
    /// Property holding this category's count.
    pub field: String,
    /// Display label used in the legend and popup rankings.
    pub label: String,
    pub color: String, // Hex code
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let cls = &self.classification;
        if cls.compare.len() != 3 {
            bail!(
                "classification.compare must name exactly three category fields, got {}",
                cls.compare.len()
            );
        }
        for field in &cls.compare {
            if cls.category(field).is_none() {
                bail!(
                    "compare field '{}' has no matching [[classification.categories]] entry",
                    field
                );
            }
        }
        Ok(())
    }
}

impl ClassificationConfig {
    /// The three compared fields as a fixed-size array. Valid after
    /// [`AppConfig::load_from_file`] has validated the config.
    pub fn compare_keys(&self) -> [&str; 3] {
        [
            self.compare[0].as_str(),
            self.compare[1].as_str(),
            self.compare[2].as_str(),
        ]
    }

    pub fn category(&self, field: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.field == field)
    }

    /// All configured category fields, in config order, for ranking.
    pub fn rank_keys(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.field.as_str()).collect()
    }
}
