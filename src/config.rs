use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub zipcodes: ZipcodesConfig,
    #[serde(default = "default_property_types")]
    pub property_types: Vec<String>,
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ZipcodesConfig {
    #[serde(default)]
    pub priority: Vec<String>,
    #[serde(default)]
    pub additional: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersConfig {
    #[serde(default = "default_min_price")]
    pub min_price: i64,
    #[serde(default = "default_max_price")]
    pub max_price: i64,
    #[serde(default = "default_min_lot_size")]
    pub min_lot_size_sqft: u32,
    /// Longitude bound for ocean proximity; properties east of it are
    /// excluded. Disabled when absent.
    #[serde(default)]
    pub max_longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_rentcast")]
    pub rentcast: ProviderConfig,
    #[serde(default = "default_rapidapi")]
    pub rapidapi: ProviderConfig,
    #[serde(default = "default_homesage")]
    pub homesage: ProviderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub monthly_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_check_times")]
    pub check_times: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_backup_keep_days")]
    pub backup_keep_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_removed_recency_days")]
    pub removed_recency_days: i64,
    #[serde(default = "default_price_change_percent")]
    pub price_change_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub resend_api_key: String,
    #[serde(default = "default_from_email")]
    pub from_email: String,
    #[serde(default)]
    pub to_email: String,
    #[serde(default = "default_enable_stdout")]
    pub enable_stdout: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<String>,
    pub zipcodes: Option<Vec<String>>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/listing-radar/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(data_dir) = overrides.data_dir {
            self.storage.data_dir = data_dir;
        }
        if let Some(zipcodes) = overrides.zipcodes {
            self.zipcodes.priority = zipcodes;
            self.zipcodes.additional.clear();
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_data_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.data_dir)
    }

    /// Priority zipcodes first, then the additional ones.
    pub fn all_zipcodes(&self) -> Vec<String> {
        let mut zipcodes = self.zipcodes.priority.clone();
        zipcodes.extend(self.zipcodes.additional.iter().cloned());
        zipcodes
    }

    pub fn default_template() -> String {
        let template = r#"[zipcodes]
priority = ["92037", "92109"]
additional = ["92107", "92118"]

property_types = ["single_family", "multi_family"]

[filters]
min_price = 400000
max_price = 5000000
min_lot_size_sqft = 8000
# max_longitude = -117.20

[providers.rentcast]
api_key = ""
monthly_limit = 50

[providers.rapidapi]
api_key = ""
monthly_limit = 100

[providers.homesage]
api_key = ""
monthly_limit = 500

[schedule]
check_times = ["08:00", "18:00"]

[storage]
data_dir = "~/.local/share/listing-radar"
backup_keep_days = 7

[analysis]
removed_recency_days = 3
price_change_percent = 5.0

[notify]
resend_api_key = ""
from_email = "notifications@listing-radar.dev"
to_email = ""
enable_stdout = true
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            zipcodes: ZipcodesConfig::default(),
            property_types: default_property_types(),
            filters: FiltersConfig::default(),
            providers: ProvidersConfig::default(),
            schedule: ScheduleConfig::default(),
            storage: StorageConfig::default(),
            analysis: AnalysisConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            rentcast: default_rentcast(),
            rapidapi: default_rapidapi(),
            homesage: default_homesage(),
        }
    }
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            min_price: default_min_price(),
            max_price: default_max_price(),
            min_lot_size_sqft: default_min_lot_size(),
            max_longitude: None,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            check_times: default_check_times(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backup_keep_days: default_backup_keep_days(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            removed_recency_days: default_removed_recency_days(),
            price_change_percent: default_price_change_percent(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            resend_api_key: String::new(),
            from_email: default_from_email(),
            to_email: String::new(),
            enable_stdout: default_enable_stdout(),
        }
    }
}

fn default_property_types() -> Vec<String> {
    vec!["single_family".to_string(), "multi_family".to_string()]
}

fn default_min_price() -> i64 {
    400_000
}

fn default_max_price() -> i64 {
    5_000_000
}

fn default_min_lot_size() -> u32 {
    8_000
}

fn default_rentcast() -> ProviderConfig {
    ProviderConfig {
        api_key: String::new(),
        monthly_limit: 50,
    }
}

fn default_rapidapi() -> ProviderConfig {
    ProviderConfig {
        api_key: String::new(),
        monthly_limit: 100,
    }
}

fn default_homesage() -> ProviderConfig {
    ProviderConfig {
        api_key: String::new(),
        monthly_limit: 500,
    }
}

fn default_check_times() -> Vec<String> {
    vec!["08:00".to_string(), "18:00".to_string()]
}

fn default_data_dir() -> String {
    "~/.local/share/listing-radar".to_string()
}

fn default_backup_keep_days() -> i64 {
    7
}

fn default_removed_recency_days() -> i64 {
    3
}

fn default_price_change_percent() -> f64 {
    5.0
}

fn default_from_email() -> String {
    "notifications@listing-radar.dev".to_string()
}

fn default_enable_stdout() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_back_into_a_config() {
        let config: Config =
            toml::from_str(&Config::default_template()).expect("template failed to parse");
        assert_eq!(config.filters.min_lot_size_sqft, 8_000);
        assert_eq!(config.providers.homesage.monthly_limit, 500);
        assert_eq!(config.schedule.check_times, vec!["08:00", "18:00"]);
        assert!(config.filters.max_longitude.is_none());
    }

    #[test]
    fn zipcodes_combine_priority_then_additional() {
        let config: Config = toml::from_str(&Config::default_template()).unwrap();
        assert_eq!(config.all_zipcodes(), vec!["92037", "92109", "92107", "92118"]);
    }

    #[test]
    fn overrides_replace_zipcodes_entirely() {
        let mut config: Config = toml::from_str(&Config::default_template()).unwrap();
        config.apply_overrides(ConfigOverrides {
            data_dir: Some("/tmp/radar".to_string()),
            zipcodes: Some(vec!["92014".to_string()]),
        });
        assert_eq!(config.storage.data_dir, "/tmp/radar");
        assert_eq!(config.all_zipcodes(), vec!["92014"]);
    }
}
