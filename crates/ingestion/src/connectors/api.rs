//! HTTP polling connector
//!
//! GETs `target` each activation and turns the JSON body into records.
//! Params: `timeout` (seconds, default 10), `records_field` (take the array
//! under this key of an object body), `key_field`.

use std::time::Duration;

use contracts::{Record, SourceConfig};
use serde_json::Value;
use tracing::trace;

use super::RecordShape;
use crate::error::{IngestionError, Result};

#[derive(Debug)]
pub struct ApiConnector {
    shape: RecordShape,
    client: reqwest::Client,
    url: String,
    records_field: Option<String>,
}

impl ApiConnector {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let timeout = contracts::saturating_secs(config.param_or("timeout", 10.0_f64)).max(Duration::from_millis(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestionError::connect(&config.name, e))?;

        Ok(Self {
            shape: RecordShape::new(config),
            client,
            url: config.target.clone(),
            records_field: config.params.get("records_field").cloned(),
        })
    }

    pub async fn fetch(&mut self) -> Result<Vec<Record>> {
        let name = self.shape.name();
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| IngestionError::fetch(name, e))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| IngestionError::parse(name, e))?;

        let payload = match (&self.records_field, body) {
            (Some(field), Value::Object(mut map)) => map
                .remove(field)
                .ok_or_else(|| IngestionError::parse(name, format!("missing field '{field}'")))?,
            (_, body) => body,
        };

        let records = self.shape.records(payload);
        trace!(source = %name, count = records.len(), "api poll");
        Ok(records)
    }
}
