use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use market::{ParsedTask, SubmissionOutcome, Task, TaskId, Worker};

use crate::state::SharedState;

/// Request body for `POST /tasks` and `POST /tasks/parse`.
///
/// The client passes free-form natural language; the evaluator turns it
/// into a structured draft.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    /// Natural-language description, e.g. "design a logo for 2.5 KAS".
    pub text: String,
}

/// DTO version of [`ParsedTask`] used in the API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTaskDto {
    pub title: String,
    pub description: String,
    pub reward: f64,
    pub estimated_time: Option<String>,
    pub requirements: Vec<String>,
}

impl From<ParsedTask> for ParsedTaskDto {
    fn from(draft: ParsedTask) -> Self {
        Self {
            title: draft.title,
            description: draft.description,
            reward: draft.reward,
            estimated_time: draft.estimated_time,
            requirements: draft.requirements,
        }
    }
}

/// `GET /tasks`
///
/// Returns all tasks, newest first.
pub async fn list(State(state): State<SharedState>) -> Json<Vec<Task>> {
    Json(state.market.tasks())
}

/// `POST /tasks/parse`
///
/// Previews the structured draft for a natural-language description
/// without creating anything.
pub async fn parse(
    State(state): State<SharedState>,
    Json(body): Json<CreateTaskRequest>,
) -> Json<ParsedTaskDto> {
    Json(state.market.parse_task(&body.text).await.into())
}

/// `POST /tasks`
///
/// Parses the description into a draft and creates a pending task with a
/// dedicated payment address. The task becomes workable once a payment to
/// that address is detected on chain.
pub async fn create(
    State(state): State<SharedState>,
    Json(body): Json<CreateTaskRequest>,
) -> (StatusCode, Json<Task>) {
    let draft = state.market.parse_task(&body.text).await;
    let task = state.market.create_task(draft);
    (StatusCode::CREATED, Json(task))
}

/// Request body for `POST /tasks/{id}/submit`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    /// The worker's completion notes.
    pub submission: String,
    /// Optional data-URI image proof forwarded to the evaluator.
    pub image: Option<String>,
}

/// Response body for `POST /tasks/{id}/submit`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<Worker>,
}

/// `POST /tasks/{id}/submit`
///
/// Runs the full submit → verify → settle sequence and reports the
/// outcome. A task that is not currently `active` yields 409.
pub async fn submit(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, (StatusCode, String)> {
    let id = TaskId(id);
    let outcome = state
        .market
        .submit(&id, &body.submission, body.image.as_deref())
        .await;

    match outcome {
        SubmissionOutcome::Ignored => Err((
            StatusCode::CONFLICT,
            "task is not open for submission".to_string(),
        )),
        SubmissionOutcome::Rejected { score, feedback } => Ok(Json(SubmitResponse {
            status: "rejected",
            score: Some(score),
            feedback: Some(feedback),
            payout: None,
            worker: None,
        })),
        SubmissionOutcome::Completed(settlement) => Ok(Json(SubmitResponse {
            status: "completed",
            score: settlement.task.verification_score,
            feedback: settlement.task.verification_feedback,
            payout: Some(settlement.payout),
            worker: Some(settlement.worker),
        })),
    }
}
