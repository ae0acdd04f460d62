use axum::{
    Router,
    body::Bytes,
    extract::{Path, Query, State, rejection::QueryRejection},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::AppState;
use crate::api::models::{QuizRequest, SubmitParams};
use crate::api::response;
use crate::error::{AppError, Result};
use crate::solver::{FailureReason, SolveOutcome};

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/project2", post(quiz_handler))
        .route("/project2/jobs/:job_id", get(job_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

async fn quiz_handler(
    State(state): State<AppState>,
    params: std::result::Result<Query<SubmitParams>, QueryRejection>,
    body: Bytes,
) -> Result<Response> {
    let req = QuizRequest::from_body(&body)?;

    if req.secret != state.config.secret {
        warn!(email = %req.email, "rejected request with invalid secret");
        return Err(AppError::InvalidSecret);
    }

    let Query(params) = params.map_err(|e| AppError::InvalidQuery(e.body_text()))?;

    let permit = state
        .sessions
        .clone()
        .try_acquire_owned()
        .map_err(|_| AppError::SessionsExhausted(state.config.max_browser_sessions))?;

    let deadline = Instant::now() + state.config.job_deadline;

    if params.wait {
        info!(url = %req.url, "solving quiz inline");
        // The solve runs in its own task so a dropped connection cannot
        // abandon a live browser session.
        let outcome = match tokio::spawn(run_solve(state.clone(), req, deadline, permit)).await {
            Ok(outcome) => outcome,
            Err(e) => SolveOutcome::failed(FailureReason::Exception, e.to_string()),
        };
        return Ok(response::solved(outcome).into_response());
    }

    let job = state.jobs.create(&req.url).await;
    info!(job_id = %job.job_id, url = %req.url, "quiz accepted");
    tokio::spawn(run_job(state.clone(), job.job_id, req, deadline, permit));

    Ok(response::accepted(job.job_id).into_response())
}

async fn job_handler(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Response> {
    let job = state
        .jobs
        .get(job_id)
        .await
        .ok_or_else(|| AppError::JobNotFound(job_id.to_string()))?;

    Ok(axum::Json(job).into_response())
}

/// Holds the session permit for as long as the browser may be alive.
async fn run_solve(
    state: AppState,
    req: QuizRequest,
    deadline: Instant,
    _permit: OwnedSemaphorePermit,
) -> SolveOutcome {
    state.solver.solve(&req, deadline).await
}

async fn run_job(
    state: AppState,
    job_id: Uuid,
    req: QuizRequest,
    deadline: Instant,
    permit: OwnedSemaphorePermit,
) {
    state.jobs.mark_running(job_id).await;
    let outcome = run_solve(state.clone(), req, deadline, permit).await;
    info!(%job_id, ok = outcome.ok, reason = ?outcome.reason, "job finished");
    state.jobs.complete(job_id, outcome).await;
}
