use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuizRequest {
    pub email: String,
    pub secret: String,
    pub url: String,
}

impl QuizRequest {
    /// Parses a raw request body. Bad JSON and a wrong shape are reported
    /// separately so both can be told apart by the caller.
    pub fn from_body(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body).map_err(|_| AppError::InvalidJson)?;
        serde_json::from_value(value).map_err(|e| AppError::InvalidPayload(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitParams {
    /// Run the solver inline and reply with its outcome. `false` queues a
    /// background job instead.
    #[serde(default = "default_wait")]
    pub wait: bool,
}

fn default_wait() -> bool {
    true
}

impl Default for SubmitParams {
    fn default() -> Self {
        SubmitParams {
            wait: default_wait(),
        }
    }
}

#[derive(Serialize)]
pub struct AcceptedResponse {
    pub status: &'static str,
    pub job_id: Uuid,
    pub poll_url: String,
}

#[derive(Serialize)]
pub struct SolvedResponse<T> {
    pub status: &'static str,
    pub result: T,
}
