//! Pipeline configuration loaded from TOML.
//!
//! ```toml
//! measures = ["EBIT", "EBITDA"]
//! cumulative_cashflow = true
//! sample_start_year = 2005
//!
//! [data]
//! dir = "/srv/leadlag"
//!
//! [cache]
//! test = false
//!
//! [filter]
//! market_segments = [1, 4]
//! max_disclosure_delay_days = 120
//! drop_unlisted = true
//!
//! [lead_lag]
//! shift_period = 4
//! rolling_window = 20
//! ```

use crate::error::{PipelineError, Result};
use leadlag_data::{CachePolicy, CashflowOptions, FeedFiles};
use leadlag_factors::{FilterConfig, LeadLagConfig};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Input feed location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Data directory (default: the platform data directory joined with `leadlag`)
    pub dir: Option<PathBuf>,
    /// Feed file names relative to the data directory
    pub files: FeedFiles,
}

/// Cache location and artifact names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory (default: `<data dir>/cache`)
    pub dir: Option<PathBuf>,
    /// Recompute everything and never touch disk
    pub test: bool,
    /// Merged cash-flow table
    pub cashflow: String,
    /// Quarterly industry classification table
    pub industry: String,
    /// Lead-lag factor table
    pub lead_lag: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            test: false,
            cashflow: "cashflow.csv".to_string(),
            industry: "industry.csv".to_string(),
            lead_lag: "lead_lag.csv".to_string(),
        }
    }
}

impl CacheConfig {
    /// Policy for every cached artifact.
    pub const fn policy(&self) -> CachePolicy {
        CachePolicy::from_test_flag(self.test)
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Cash-flow measures
    pub measures: Vec<String>,
    /// Cash-flow values are fiscal-year cumulative
    pub cumulative_cashflow: bool,
    /// First sample year for cash flows and GDP
    pub sample_start_year: Option<i64>,
    /// Input feeds
    pub data: DataConfig,
    /// Cache
    pub cache: CacheConfig,
    /// Eligibility filters
    pub filter: FilterConfig,
    /// Shift range and rolling window
    pub lead_lag: LeadLagConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            measures: vec!["EBIT".to_string(), "EBITDA".to_string()],
            cumulative_cashflow: false,
            sample_start_year: None,
            data: DataConfig::default(),
            cache: CacheConfig::default(),
            filter: FilterConfig::default(),
            lead_lag: LeadLagConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document.
    pub fn from_toml(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject configurations the pipeline cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.measures.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one cash-flow measure is required".to_string(),
            ));
        }
        if self.measures.iter().any(|m| m.trim().is_empty()) {
            return Err(PipelineError::InvalidConfig(
                "measure names must not be empty".to_string(),
            ));
        }
        // Artifacts share one cache directory and one slot lock per path.
        let artifacts = [&self.cache.cashflow, &self.cache.industry, &self.cache.lead_lag];
        let paths: Vec<PathBuf> = artifacts
            .iter()
            .map(|name| {
                Path::new(name.as_str())
                    .components()
                    .filter(|c| *c != Component::CurDir)
                    .collect()
            })
            .collect();
        for (i, path) in paths.iter().enumerate() {
            if paths[..i].contains(path) {
                return Err(PipelineError::InvalidConfig(format!(
                    "cache artifact `{}` is configured more than once",
                    artifacts[i]
                )));
            }
        }
        self.lead_lag.validate()?;
        self.filter.validate()?;
        Ok(())
    }

    /// Data directory, falling back to the platform data directory.
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data.dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_dir()
                .map(|d| d.join("leadlag"))
                .ok_or(PipelineError::NoDataDir),
        }
    }

    /// Cache directory, falling back to `<data dir>/cache`.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache.dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(self.data_dir()?.join("cache")),
        }
    }

    /// How the cash-flow feed is read.
    pub fn cashflow_options(&self) -> CashflowOptions {
        CashflowOptions {
            measures: self.measures.clone(),
            cumulative: self.cumulative_cashflow,
            start_year: self.sample_start_year,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.measures, vec!["EBIT", "EBITDA"]);
        assert_eq!(config.lead_lag.window_length(), 29);
        assert_eq!(config.cache.policy(), CachePolicy::WriteThrough);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = PipelineConfig::from_toml(
            r#"
            measures = ["EBITDA"]
            sample_start_year = 2005

            [data]
            dir = "/tmp/leadlag"

            [cache]
            test = true

            [filter]
            market_segments = [1, 4]
            balanced = true

            [lead_lag]
            rolling_window = 12
            "#,
        )
        .unwrap();

        assert_eq!(config.measures, vec!["EBITDA"]);
        assert_eq!(config.sample_start_year, Some(2005));
        assert_eq!(config.data.files.gdp, "gdp.csv");
        assert_eq!(config.cache.policy(), CachePolicy::Bypass);
        assert_eq!(config.cache.lead_lag, "lead_lag.csv");
        assert_eq!(config.filter.market_segments, Some(vec![1, 4]));
        assert!(config.filter.balanced);
        assert_eq!(config.lead_lag.shift_period, 4);
        assert_eq!(config.lead_lag.window_length(), 21);
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/leadlag"));
        assert_eq!(config.cache_dir().unwrap(), PathBuf::from("/tmp/leadlag/cache"));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = PipelineConfig::default();
        config.data.dir = Some(PathBuf::from("/data"));
        config.filter.max_disclosure_delay_days = Some(90);
        let parsed = PipelineConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = PipelineConfig {
            measures: vec![],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig(_))));

        let mut config = PipelineConfig::default();
        config.lead_lag.rolling_window = 1;
        assert!(matches!(config.validate(), Err(PipelineError::Factor(_))));
    }

    #[rstest]
    #[case::blank_measure("measures = [\"EBIT\", \" \"]")]
    #[case::short_window("[lead_lag]\nrolling_window = 1")]
    #[case::negative_delay("[filter]\nmax_disclosure_delay_days = -1")]
    #[case::shared_cache_artifact("[cache]\nindustry = \"cashflow.csv\"")]
    #[case::shared_cache_artifact_path("[cache]\nlead_lag = \"./industry.csv\"\nindustry = \"industry.csv\"")]
    fn test_invalid_documents(#[case] document: &str) {
        let config = PipelineConfig::from_toml(document).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_field_type_fails() {
        assert!(PipelineConfig::from_toml("measures = 3").is_err());
    }
}
