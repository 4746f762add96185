use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::desk_review::{
    HealthcarePolicy, ReviewThresholds, DEFAULT_HEALTHCARE_THRESHOLD, DEFAULT_SALARY_THRESHOLD,
};
use crate::error::{DeskReviewError, Result};
use crate::validator::DEFAULT_PCT_TOLERANCE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_dir_string")]
    pub data_dir: String,
    #[serde(default = "default_salary_threshold")]
    pub salary_threshold: f64,
    #[serde(default = "default_healthcare_threshold")]
    pub healthcare_threshold: f64,
    #[serde(default = "default_pct_tolerance")]
    pub pct_tolerance: f64,
    #[serde(default)]
    pub healthcare_policy: HealthcarePolicy,
}

fn default_salary_threshold() -> f64 {
    DEFAULT_SALARY_THRESHOLD
}

fn default_healthcare_threshold() -> f64 {
    DEFAULT_HEALTHCARE_THRESHOLD
}

fn default_pct_tolerance() -> f64 {
    DEFAULT_PCT_TOLERANCE
}

fn default_data_dir_string() -> String {
    default_data_dir().to_string_lossy().to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir_string(),
            salary_threshold: DEFAULT_SALARY_THRESHOLD,
            healthcare_threshold: DEFAULT_HEALTHCARE_THRESHOLD,
            pct_tolerance: DEFAULT_PCT_TOLERANCE,
            healthcare_policy: HealthcarePolicy::default(),
        }
    }
}

impl Settings {
    pub fn thresholds(&self) -> ReviewThresholds {
        ReviewThresholds {
            salary: self.salary_threshold,
            healthcare_ratio: self.healthcare_threshold,
            policy: self.healthcare_policy,
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand_path(&self.data_dir))
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join("cost_reports.db")
    }

    pub fn export_dir(&self) -> PathBuf {
        self.data_dir().join("exports")
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.salary_threshold.is_finite() && self.salary_threshold >= 0.0) {
            return Err(DeskReviewError::Settings(format!(
                "salary_threshold must be a non-negative number, got {}",
                self.salary_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.healthcare_threshold) {
            return Err(DeskReviewError::Settings(format!(
                "healthcare_threshold must be within [0, 1], got {}",
                self.healthcare_threshold
            )));
        }
        if !(self.pct_tolerance.is_finite() && self.pct_tolerance > 0.0) {
            return Err(DeskReviewError::Settings(format!(
                "pct_tolerance must be positive, got {}",
                self.pct_tolerance
            )));
        }
        Ok(())
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("deskreview")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("deskreview")
}

/// A missing file yields defaults. A file that exists must parse and validate.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(settings_path);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(&path)?;
    let settings: Settings = serde_json::from_str(&content)?;
    settings.validate()?;
    Ok(settings)
}

pub fn save_settings(settings: &Settings, path: Option<&Path>) -> Result<PathBuf> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(settings_path);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(&path, format!("{json}\n"))?;
    Ok(path)
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            salary_threshold: 55000.0,
            healthcare_threshold: 0.08,
            pct_tolerance: 1e-4,
            healthcare_policy: HealthcarePolicy::PerEmployee,
        };
        save_settings(&settings, Some(&path)).unwrap();
        let loaded = load_settings(Some(&path)).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_load_returns_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_settings(Some(&dir.path().join("nope.json"))).unwrap();
        assert_eq!(s.salary_threshold, 60000.0);
        assert_eq!(s.healthcare_threshold, 0.07);
        assert_eq!(s.pct_tolerance, 1e-6);
        assert_eq!(s.healthcare_policy, HealthcarePolicy::Aggregate);
        assert!(!s.data_dir.is_empty());
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test", "salary_threshold": 75000}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.salary_threshold, 75000.0);
        assert_eq!(s.healthcare_threshold, 0.07);
        assert_eq!(s.healthcare_policy, HealthcarePolicy::Aggregate);
    }

    #[test]
    fn test_policy_uses_snake_case() {
        let s: Settings = serde_json::from_str(r#"{"healthcare_policy": "per_employee"}"#).unwrap();
        assert_eq!(s.healthcare_policy, HealthcarePolicy::PerEmployee);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_settings(Some(&path)).is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_ratio() {
        let s = Settings {
            healthcare_threshold: 7.0,
            ..Settings::default()
        };
        let msg = s.validate().err().unwrap().to_string();
        assert!(msg.contains("healthcare_threshold"), "got: {msg}");
    }

    #[test]
    fn test_paths_under_data_dir() {
        let s = Settings {
            data_dir: "/srv/review".to_string(),
            ..Settings::default()
        };
        assert_eq!(s.db_path(), PathBuf::from("/srv/review/cost_reports.db"));
        assert_eq!(s.export_dir(), PathBuf::from("/srv/review/exports"));
        assert_eq!(s.thresholds().salary, 60000.0);
    }
}
