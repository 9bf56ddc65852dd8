//! REST endpoint handlers.
//!
//! Handlers translate HTTP into engine calls and engine results into JSON.
//! They carry no business rules.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness probe |
//! | `POST` | `/api/users` | Register an account |
//! | `POST` | `/api/tasks/{id}/complete` | Complete a task |
//! | `POST` | `/api/rewards/{id}/purchase` | Redeem a reward |
//! | `GET` | `/api/me/progress` | Gold, exp, level, and level progress |
//! | `GET` | `/api/me/audit` | Reconcile the caller's ledger |

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use liferpg_core::{Clock, GameService};
use liferpg_db::Store;
use liferpg_ledger::ReconciliationResult;
use liferpg_types::{RewardId, TaskId, UserId};

use crate::error::ApiError;
use crate::extract::{CurrentUser, parse_id};
use crate::state::AppState;

/// Body of `POST /api/users`.
#[derive(Debug, serde::Deserialize)]
pub struct RegisterRequest {
    /// Requested username.
    pub username: String,
}

const fn service<S, C>(state: &AppState<S, C>) -> &GameService<S, C> {
    &state.service
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Liveness probe.
pub async fn health<S, C>(State(state): State<Arc<AppState<S, C>>>) -> impl IntoResponse
where
    S: Store + 'static,
    C: Clock + 'static,
{
    Json(serde_json::json!({
        "status": "ok",
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

// ---------------------------------------------------------------------------
// POST /api/users
// ---------------------------------------------------------------------------

/// Register a new account at gold 0, exp 0, level 1.
pub async fn register_user<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    C: Clock + 'static,
{
    let Json(request) = body.map_err(|e| ApiError::InvalidBody(e.body_text()))?;
    let account = service(&state).register_user(&request.username).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

// ---------------------------------------------------------------------------
// POST /api/tasks/{id}/complete
// ---------------------------------------------------------------------------

/// Complete a task as the current user.
pub async fn complete_task<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    C: Clock + 'static,
{
    let task_id: TaskId = parse_id(&id_str)?;
    let outcome = service(&state).complete_task(user_id, task_id).await?;
    Ok(Json(outcome))
}

// ---------------------------------------------------------------------------
// POST /api/rewards/{id}/purchase
// ---------------------------------------------------------------------------

/// Redeem a reward as the current user.
pub async fn purchase_reward<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    C: Clock + 'static,
{
    let reward_id: RewardId = parse_id(&id_str)?;
    let outcome = service(&state).purchase_reward(user_id, reward_id).await?;
    Ok(Json(outcome))
}

// ---------------------------------------------------------------------------
// GET /api/me/progress
// ---------------------------------------------------------------------------

/// Current balances and level progress of the caller.
pub async fn get_progress<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    C: Clock + 'static,
{
    let progress = service(&state).user_progress(user_id).await?;
    Ok(Json(progress))
}

// ---------------------------------------------------------------------------
// GET /api/me/audit
// ---------------------------------------------------------------------------

/// Reconcile the caller's ledger against their balances.
pub async fn get_audit<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    C: Clock + 'static,
{
    let result = service(&state).audit_user(user_id).await?;
    Ok(Json(audit_body(user_id, &result)))
}

fn audit_body(user_id: UserId, result: &ReconciliationResult) -> serde_json::Value {
    match result {
        ReconciliationResult::Balanced => serde_json::json!({
            "user_id": user_id,
            "balanced": true,
        }),
        ReconciliationResult::Mismatch(mismatch) => {
            let drifts: Vec<serde_json::Value> = mismatch
                .drifts
                .iter()
                .map(|(currency, drift)| {
                    serde_json::json!({
                        "currency": currency,
                        "ledger_total": drift.ledger_total,
                        "account_balance": drift.account_balance,
                    })
                })
                .collect();
            serde_json::json!({
                "user_id": user_id,
                "balanced": false,
                "drifts": drifts,
                "broken_entries": mismatch.broken_entries,
                "message": mismatch.message,
            })
        }
    }
}
