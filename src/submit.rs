use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::Result;
use crate::scraper::{SNAPSHOT_LIMIT, truncate_chars};

/// Body posted to the submission target.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerPayload {
    pub email: String,
    pub secret: String,
    pub url: String,
    pub answer: Value,
}

/// Posts `payload` to `submit_url` and returns the response body.
///
/// Non-JSON responses are captured as `{"status_code", "text"}` with the
/// text cut to [`SNAPSHOT_LIMIT`] characters.
pub async fn post_answer(
    client: &Client,
    submit_url: &str,
    payload: &AnswerPayload,
    timeout: Duration,
) -> Result<Value> {
    let res = client
        .post(submit_url)
        .json(payload)
        .timeout(timeout)
        .send()
        .await?;

    let status = res.status();
    let text = res.text().await?;
    debug!(%status, bytes = text.len(), "submission endpoint replied");

    let body = match serde_json::from_str::<Value>(&text) {
        Ok(json) => json,
        Err(_) => json!({
            "status_code": status.as_u16(),
            "text": truncate_chars(&text, SNAPSHOT_LIMIT),
        }),
    };

    Ok(body)
}
