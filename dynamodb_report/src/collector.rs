use std::time::Duration;

use aws_sdk_cloudwatch as cw;
use aws_sdk_cloudwatch::primitives::DateTime;
use aws_sdk_cloudwatch::types::{Datapoint, Dimension, Statistic};
use aws_sdk_dynamodb as ddb;
use chrono::{DateTime as ChronoDateTime, Utc};
use lambda_runtime::Error;
use tracing::{debug, info};

use crate::report::TableRecord;
use crate::ReportError;

const NAMESPACE: &str = "AWS/DynamoDB";
const TABLE_NAME_DIMENSION: &str = "TableName";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityMetric {
    ConsumedRead,
    ConsumedWrite,
}

impl CapacityMetric {
    pub fn metric_name(&self) -> &'static str {
        match self {
            CapacityMetric::ConsumedRead => "ConsumedReadCapacityUnits",
            CapacityMetric::ConsumedWrite => "ConsumedWriteCapacityUnits",
        }
    }
}

/// Time range a metric query covers; the period spans the whole range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricWindow {
    pub start: ChronoDateTime<Utc>,
    pub end: ChronoDateTime<Utc>,
}

impl MetricWindow {
    pub fn ending_at(end: ChronoDateTime<Utc>, lookback: Duration) -> Result<Self, ReportError> {
        let start = chrono::Duration::from_std(lookback)
            .ok()
            .and_then(|lookback| end.checked_sub_signed(lookback))
            .ok_or(ReportError::InvalidWindow(lookback))?;
        Ok(Self { start, end })
    }

    /// CloudWatch periods are whole seconds, multiples of 60.
    pub fn period_seconds(&self) -> Result<i32, ReportError> {
        let secs = (self.end - self.start).num_seconds().max(60);
        let rounded = secs - secs % 60;
        i32::try_from(rounded).map_err(|_| ReportError::InvalidWindow(Duration::from_secs(secs.unsigned_abs())))
    }
}

/// Value of the first datapoint in returned order, or 0 when there is none.
pub fn first_datapoint_value(datapoints: &[Datapoint]) -> f64 {
    datapoints
        .first()
        .and_then(|dp| dp.sum())
        .unwrap_or(0.0)
}

/// Only the first page of table names is read.
pub async fn list_table_names(ddb_client: &ddb::Client) -> Result<Vec<String>, Error> {
    let output = ddb_client.list_tables().send().await?;
    if output.last_evaluated_table_name().is_some() {
        info!("more tables than fit in one page, reporting the first {}", output.table_names().len());
    }
    Ok(output.table_names().to_vec())
}

pub async fn table_size_bytes(ddb_client: &ddb::Client, table_name: &str) -> Result<i64, Error> {
    let output = ddb_client.describe_table()
        .table_name(table_name)
        .send()
        .await?;
    Ok(output.table()
        .and_then(|t| t.table_size_bytes())
        .unwrap_or(0))
}

pub async fn consumed_capacity(
    cw_client: &cw::Client,
    table_name: &str,
    metric: CapacityMetric,
    window: &MetricWindow,
) -> Result<f64, Error> {
    let dimension = Dimension::builder()
        .name(TABLE_NAME_DIMENSION)
        .value(table_name)
        .build();
    let output = cw_client.get_metric_statistics()
        .namespace(NAMESPACE)
        .metric_name(metric.metric_name())
        .dimensions(dimension)
        .start_time(DateTime::from_secs(window.start.timestamp()))
        .end_time(DateTime::from_secs(window.end.timestamp()))
        .period(window.period_seconds()?)
        .statistics(Statistic::Sum)
        .send()
        .await?;
    let value = first_datapoint_value(output.datapoints());
    debug!("{} {} = {} ({} datapoints)", table_name, metric.metric_name(), value, output.datapoints().len());
    Ok(value)
}

/// Lists the tables and gathers size and capacity for each, one table at a time.
pub async fn collect_table_records(
    ddb_client: &ddb::Client,
    cw_client: &cw::Client,
    window: &MetricWindow,
) -> Result<Vec<TableRecord>, Error> {
    let table_names = list_table_names(ddb_client).await?;
    info!("found {} tables", table_names.len());

    let mut records = Vec::with_capacity(table_names.len());
    for name in table_names {
        let size_bytes = table_size_bytes(ddb_client, &name).await?;
        let consumed_read_capacity = consumed_capacity(cw_client, &name, CapacityMetric::ConsumedRead, window).await?;
        let consumed_write_capacity = consumed_capacity(cw_client, &name, CapacityMetric::ConsumedWrite, window).await?;
        info!("table {}: read {}, write {}, size {}", name, consumed_read_capacity, consumed_write_capacity, size_bytes);
        records.push(TableRecord {
            name,
            consumed_read_capacity,
            consumed_write_capacity,
            size_bytes,
        });
    }
    Ok(records)
}
