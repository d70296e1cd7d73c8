pub mod collector;
pub mod config;
pub mod report;

use std::fs;
use std::path::Path;
use std::time::Duration;

use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_cloudwatch as cw;
use aws_sdk_dynamodb as ddb;
use aws_sdk_s3 as s3;
use aws_sdk_s3::primitives::ByteStream;
use chrono::Utc;
use lambda_runtime::{Error, LambdaEvent};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::collector::{collect_table_records, MetricWindow};
use crate::config::ReportConfig;
use crate::report::{report_file_name, report_key, Report};

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("missing required environment variable {0}")]
    MissingConfig(&'static str),
    #[error("invalid value {value:?} for {name}")]
    InvalidConfig { name: &'static str, value: String },
    #[error("metric window of {0:?} is out of range")]
    InvalidWindow(Duration),
    #[error("failed to write report: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub status_code: u16,
    pub body: String,
}

impl ReportResponse {
    pub fn uploaded(bucket: &str, key: &str) -> Self {
        Self {
            status_code: 200,
            body: format!("Report uploaded to s3://{}/{}", bucket, key),
        }
    }
}

/// The AWS clients one invocation talks to.
pub struct Clients {
    pub ddb: ddb::Client,
    pub cw: cw::Client,
    pub s3: s3::Client,
}

impl Clients {
    pub async fn load(report_config: &ReportConfig) -> Self {
        let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;
        Self::from_sdk_config(&config, report_config)
    }

    pub fn from_sdk_config(config: &SdkConfig, report_config: &ReportConfig) -> Self {
        let ddb_config = match &report_config.dynamodb_endpoint {
            Some(endpoint) => ddb::config::Builder::from(config).endpoint_url(endpoint).build(),
            None => ddb::config::Builder::from(config).build()
        };
        let cw_config = match &report_config.cloudwatch_endpoint {
            Some(endpoint) => cw::config::Builder::from(config).endpoint_url(endpoint).build(),
            None => cw::config::Builder::from(config).build()
        };
        // Local S3 stand-ins don't resolve virtual-hosted bucket names.
        let s3_config = match &report_config.s3_endpoint {
            Some(endpoint) => s3::config::Builder::from(config)
                .endpoint_url(endpoint)
                .force_path_style(true)
                .build(),
            None => s3::config::Builder::from(config).build()
        };
        Self {
            ddb: ddb::Client::from_conf(ddb_config),
            cw: cw::Client::from_conf(cw_config),
            s3: s3::Client::from_conf(s3_config),
        }
    }
}

pub async fn upload_report(s3_client: &s3::Client, path: &Path, bucket: &str, key: &str) -> Result<(), Error> {
    let body = ByteStream::from_path(path).await?;
    s3_client.put_object()
        .bucket(bucket)
        .key(key)
        .content_type(XLSX_CONTENT_TYPE)
        .body(body)
        .send()
        .await?;
    Ok(())
}

/// Builds the day's capacity report for every table and uploads it.
/// The local copy is removed once the upload has been attempted.
pub async fn generate_report(clients: &Clients, report_config: &ReportConfig) -> Result<ReportResponse, Error> {
    let now = Utc::now();
    let window = MetricWindow::ending_at(now, report_config.lookback)?;
    let records = collect_table_records(&clients.ddb, &clients.cw, &window).await?;
    let report = Report::new(records);

    let today = now.date_naive();
    let local_path = report_config.work_dir.join(report_file_name(today));
    report.save(&local_path).map_err(ReportError::from)?;
    debug!("wrote {} rows to {}", report.records().len() + 1, local_path.display());

    let key = report_key(today);
    let uploaded = upload_report(&clients.s3, &local_path, &report_config.bucket, &key).await;
    if let Err(e) = fs::remove_file(&local_path) {
        warn!("couldn't remove {}: {}", local_path.display(), e);
    }
    uploaded?;
    info!("uploaded report for {} tables to s3://{}/{}", report.records().len(), report_config.bucket, key);

    Ok(ReportResponse::uploaded(&report_config.bucket, &key))
}

pub async fn function_handler(event: LambdaEvent<Value>) -> Result<ReportResponse, Error> {
    debug!("event: {:?}, context: {:?}", event.payload, event.context);
    let report_config = ReportConfig::from_env()?;
    let clients = Clients::load(&report_config).await;
    generate_report(&clients, &report_config).await
}
