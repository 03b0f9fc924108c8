use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::authz::Caller;
use crate::errors::AppResult;
use crate::services::answers::{AnswerRequest, AnswerResponse};

#[utoipa::path(
    post,
    path = "/answers",
    tag = "Answers",
    security(("bearerAuth" = [])),
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Answer composed from accessible candidates only", body = AnswerResponse),
        (status = 403, description = "chat_with_documents required")
    )
)]
pub async fn compose_answer(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<AnswerRequest>,
) -> AppResult<Json<AnswerResponse>> {
    let response = state
        .answers
        .answer(&caller, &payload.question, payload.candidates)
        .await?;
    Ok(Json(response))
}
