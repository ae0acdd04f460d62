use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;
use uuid::Uuid;

use crate::api::models::{AcceptedResponse, SolvedResponse};
use crate::solver::SolveOutcome;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

pub fn solved(outcome: SolveOutcome) -> (StatusCode, Json<SolvedResponse<SolveOutcome>>) {
    (
        StatusCode::OK,
        Json(SolvedResponse {
            status: "ok",
            result: outcome,
        }),
    )
}

pub fn accepted(job_id: Uuid) -> (StatusCode, Json<AcceptedResponse>) {
    (
        StatusCode::OK,
        Json(AcceptedResponse {
            status: "accepted",
            job_id,
            poll_url: format!("/project2/jobs/{}", job_id),
        }),
    )
}

pub fn error(status: StatusCode, detail: String) -> (StatusCode, Json<ErrorResponse>) {
    (status, Json(ErrorResponse { detail }))
}
