//! HTTP client for remote scanning services
//!
//! Speaks the minimal protocol of an AMSI-style scanning endpoint: raw file
//! bytes are POSTed to `<url>/scan` and the service answers with a JSON
//! object carrying a `detected` boolean. Transport failures surface as
//! [`ScanError::OracleUnavailable`]; the core treats them as fatal for the
//! current run.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::Scanner;
use crate::error::ScanError;

const SCAN_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct ScanReply {
    detected: bool,
}

/// Remote scanner reached over HTTP
pub struct RestScanner {
    name: String,
    url: String,
    client: reqwest::blocking::Client,
}

impl RestScanner {
    /// Create a client for the service at `url` (no trailing slash)
    pub fn new(url: &str, name: &str) -> Result<Self, ScanError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(SCAN_TIMEOUT)
            .build()
            .map_err(|e| ScanError::OracleUnavailable(e.to_string()))?;
        Ok(RestScanner {
            name: name.to_string(),
            url: url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl Scanner for RestScanner {
    fn name(&self) -> &str {
        &self.name
    }

    fn detects(&self, bytes: &[u8], filename: &str) -> Result<bool, ScanError> {
        let reply: ScanReply = self
            .client
            .post(format!("{}/scan", self.url))
            .body(bytes.to_vec())
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json())
            .map_err(|e| ScanError::OracleUnavailable(e.to_string()))?;
        debug!(filename, detected = reply.detected, "Remote scan");
        Ok(reply.detected)
    }

    fn health(&self) -> Result<(), ScanError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| ScanError::OracleUnavailable(e.to_string()))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ScanError::OracleUnavailable(format!(
                "Health check returned {}",
                resp.status()
            )))
        }
    }
}
