//! Client for the remote presentation assembly endpoint.

use crate::{Error, ExportBatch, ExportResult, Result};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
struct AssemblyResponse {
    #[serde(rename = "presentationUrl")]
    presentation_url: String,
}

pub struct AssemblyClient {
    client: reqwest::Client,
    endpoint: String,
    headers: HashMap<String, String>,
}

impl AssemblyClient {
    pub fn new(client: reqwest::Client, endpoint: &str, headers: HashMap<String, String>) -> Self {
        Self { client, endpoint: endpoint.to_string(), headers }
    }

    /// POST the batch once. Transport failures, non-2xx statuses and bodies
    /// without a `presentationUrl` are all submission errors; nothing is
    /// retried.
    pub async fn submit(&self, batch: &ExportBatch) -> Result<ExportResult> {
        log::info!(
            "submitting {} slides for {:?} to {}",
            batch.len(),
            batch.presentation_title(),
            self.endpoint
        );

        let mut req = self.client.post(&self.endpoint).json(batch);
        for (k, v) in &self.headers {
            req = req.header(k.as_str(), v.as_str());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::SubmissionError(format!("POST {} failed: {}", self.endpoint, e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(Error::SubmissionError(format!("{} returned {}: {}", self.endpoint, status, snippet)));
        }

        let parsed: AssemblyResponse = resp
            .json()
            .await
            .map_err(|e| Error::SubmissionError(format!("malformed response from {}: {}", self.endpoint, e)))?;
        if parsed.presentation_url.trim().is_empty() {
            return Err(Error::SubmissionError("response carried an empty presentationUrl".into()));
        }
        Ok(ExportResult { presentation_url: parsed.presentation_url })
    }
}
