use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::ReportError;

const REPORT_BUCKET: &str = "REPORT_BUCKET";
const METRICS_LOOKBACK_HOURS: &str = "METRICS_LOOKBACK_HOURS";
const DYNAMODB_ENDPOINT: &str = "DYNAMODB_ENDPOINT";
const CLOUDWATCH_ENDPOINT: &str = "CLOUDWATCH_ENDPOINT";
const S3_ENDPOINT: &str = "S3_ENDPOINT";
const REPORT_WORK_DIR: &str = "REPORT_WORK_DIR";

pub const DEFAULT_LOOKBACK_HOURS: u64 = 24;
/// CloudWatch keeps hourly and daily statistics for 455 days.
pub const MAX_LOOKBACK_HOURS: u64 = 455 * 24;

/// Settings for one report run, read from the function's environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub bucket: String,
    pub lookback: Duration,
    pub dynamodb_endpoint: Option<String>,
    pub cloudwatch_endpoint: Option<String>,
    pub s3_endpoint: Option<String>,
    /// Where the workbook is written before upload.
    pub work_dir: PathBuf,
}

impl ReportConfig {
    pub fn from_env() -> Result<Self, ReportError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any name -> value lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ReportError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bucket = get(REPORT_BUCKET).ok_or(ReportError::MissingConfig(REPORT_BUCKET))?;
        let lookback_secs = match get(METRICS_LOOKBACK_HOURS) {
            Some(raw) => raw.trim()
                .parse::<u64>()
                .ok()
                .filter(|hours| (1..=MAX_LOOKBACK_HOURS).contains(hours))
                .and_then(|hours| hours.checked_mul(60 * 60))
                .ok_or(ReportError::InvalidConfig { name: METRICS_LOOKBACK_HOURS, value: raw })?,
            None => DEFAULT_LOOKBACK_HOURS * 60 * 60,
        };

        Ok(Self {
            bucket,
            lookback: Duration::from_secs(lookback_secs),
            dynamodb_endpoint: get(DYNAMODB_ENDPOINT),
            cloudwatch_endpoint: get(CLOUDWATCH_ENDPOINT),
            s3_endpoint: get(S3_ENDPOINT),
            work_dir: get(REPORT_WORK_DIR).map(PathBuf::from).unwrap_or_else(env::temp_dir),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<&str, &str> = vars.iter().copied().collect();
        move |name| vars.get(name).map(|v| v.to_string())
    }

    #[test]
    fn test_defaults() {
        let config = ReportConfig::from_lookup(lookup(&[(REPORT_BUCKET, "reports")])).unwrap();
        assert_eq!(config.bucket, "reports");
        assert_eq!(config.lookback, Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.dynamodb_endpoint, None);
        assert_eq!(config.cloudwatch_endpoint, None);
        assert_eq!(config.s3_endpoint, None);
        assert_eq!(config.work_dir, env::temp_dir());
    }

    #[test]
    fn test_missing_bucket() {
        let err = ReportConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ReportError::MissingConfig(REPORT_BUCKET)));

        let err = ReportConfig::from_lookup(lookup(&[(REPORT_BUCKET, "  ")])).unwrap_err();
        assert!(matches!(err, ReportError::MissingConfig(REPORT_BUCKET)));
    }

    #[test]
    fn test_lookback_and_endpoints() {
        let config = ReportConfig::from_lookup(lookup(&[
            (REPORT_BUCKET, "reports"),
            (METRICS_LOOKBACK_HOURS, "6"),
            (DYNAMODB_ENDPOINT, "http://localhost:8000"),
            (S3_ENDPOINT, "http://localhost:4566"),
            (REPORT_WORK_DIR, "/var/reports"),
        ]))
        .unwrap();
        assert_eq!(config.lookback, Duration::from_secs(6 * 60 * 60));
        assert_eq!(config.dynamodb_endpoint.as_deref(), Some("http://localhost:8000"));
        assert_eq!(config.cloudwatch_endpoint, None);
        assert_eq!(config.s3_endpoint.as_deref(), Some("http://localhost:4566"));
        assert_eq!(config.work_dir, PathBuf::from("/var/reports"));
    }

    #[test]
    fn test_lookback_upper_bound() {
        let config = ReportConfig::from_lookup(lookup(&[(REPORT_BUCKET, "reports"), (METRICS_LOOKBACK_HOURS, "10920")]))
            .unwrap();
        assert_eq!(config.lookback, Duration::from_secs(455 * 24 * 60 * 60));

        for too_long in ["10921", "3000000000", "100000000000", "6000000000000000", "18446744073709551615"] {
            let err = ReportConfig::from_lookup(lookup(&[(REPORT_BUCKET, "reports"), (METRICS_LOOKBACK_HOURS, too_long)]))
                .unwrap_err();
            assert!(matches!(err, ReportError::InvalidConfig { name: METRICS_LOOKBACK_HOURS, .. }));
        }
    }

    #[test]
    fn test_invalid_lookback() {
        for bad in ["0", "-3", "a day"] {
            let err = ReportConfig::from_lookup(lookup(&[(REPORT_BUCKET, "reports"), (METRICS_LOOKBACK_HOURS, bad)]))
                .unwrap_err();
            match err {
                ReportError::InvalidConfig { name, value } => {
                    assert_eq!(name, METRICS_LOOKBACK_HOURS);
                    assert_eq!(value, bad);
                }
                other => panic!("unexpected error {:?}", other),
            }
        }
    }
}
