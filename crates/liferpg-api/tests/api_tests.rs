//! Integration tests for the HTTP endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server, backed by the in-memory store and a fixed clock.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, TimeDelta, Utc};
use liferpg_api::router::build_router;
use liferpg_api::state::AppState;
use liferpg_core::{FixedClock, GameService};
use liferpg_db::MemoryStore;
use liferpg_types::{Reward, RewardId, Stock, Task, TaskId, TaskKind, UserAccount, UserId};
use serde_json::Value;
use tower::ServiceExt;

struct Fixture {
    state: Arc<AppState<MemoryStore, FixedClock>>,
    user: UserAccount,
    daily: Task,
    reward: Reward,
}

impl Fixture {
    fn router(&self) -> Router {
        build_router(Arc::clone(&self.state))
    }

    fn clock(&self) -> &FixedClock {
        self.state.service.clock()
    }
}

async fn make_fixture() -> Fixture {
    let now = DateTime::parse_from_rfc3339("2026-10-16T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    let store = MemoryStore::new();

    let daily = Task {
        id: TaskId::new(),
        title: "Drink water".to_owned(),
        description: "Eight glasses".to_owned(),
        gold_reward: 60,
        exp_reward: 150,
        kind: TaskKind::Daily,
        is_active: true,
    };
    store.put_task(daily.clone()).await;

    let reward = Reward {
        id: RewardId::new(),
        title: "Coffee".to_owned(),
        description: String::new(),
        cost: 50,
        stock: Stock::Finite(1),
        is_active: true,
    };
    store.put_reward(reward.clone()).await;

    let service = GameService::new(store, FixedClock::at(now));
    let user = service.register_user("alice").await.unwrap();

    Fixture {
        state: Arc::new(AppState::new(service)),
        user,
        daily,
        reward,
    }
}

fn post_as(user: UserId, uri: &str) -> Request<Body> {
    Request::post(uri)
        .header("x-user-id", user.to_string())
        .body(Body::empty())
        .unwrap()
}

fn get_as(user: UserId, uri: &str) -> Request<Body> {
    Request::get(uri)
        .header("x-user-id", user.to_string())
        .body(Body::empty())
        .unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_health() {
    let fx = make_fixture().await;
    let response = fx
        .router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_complete_task_returns_summary() {
    let fx = make_fixture().await;
    let uri = format!("/api/tasks/{}/complete", fx.daily.id);

    let response = fx.router().oneshot(post_as(fx.user.id, &uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["gold_reward"], 60);
    assert_eq!(json["exp_reward"], 150);
    assert_eq!(json["new_gold"], 60);
    assert_eq!(json["new_level"], 2);
    assert_eq!(json["leveled_up"], true);
}

#[tokio::test]
async fn test_complete_task_twice_same_day_conflicts() {
    let fx = make_fixture().await;
    let uri = format!("/api/tasks/{}/complete", fx.daily.id);

    let first = fx.router().oneshot(post_as(fx.user.id, &uri)).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = fx.router().oneshot(post_as(fx.user.id, &uri)).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let json = body_to_json(second.into_body()).await;
    assert_eq!(json["kind"], "already_completed");
    assert_eq!(json["status"], 409);

    fx.clock().advance(TimeDelta::days(1));
    let next_day = fx.router().oneshot(post_as(fx.user.id, &uri)).await.unwrap();
    assert_eq!(next_day.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_complete_unknown_task_is_404() {
    let fx = make_fixture().await;
    let uri = format!("/api/tasks/{}/complete", TaskId::new());

    let response = fx.router().oneshot(post_as(fx.user.id, &uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["kind"], "not_found");
}

#[tokio::test]
async fn test_malformed_task_id_is_400() {
    let fx = make_fixture().await;
    let response = fx
        .router()
        .oneshot(post_as(fx.user.id, "/api/tasks/not-a-uuid/complete"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["kind"], "invalid_id");
}

#[tokio::test]
async fn test_missing_user_header_is_401() {
    let fx = make_fixture().await;
    let uri = format!("/api/tasks/{}/complete", fx.daily.id);

    let response = fx
        .router()
        .oneshot(Request::post(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["kind"], "unauthenticated");
}

#[tokio::test]
async fn test_malformed_user_header_is_400() {
    let fx = make_fixture().await;
    let response = fx
        .router()
        .oneshot(
            Request::get("/api/me/progress")
                .header("x-user-id", "42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["kind"], "invalid_user_header");
}

#[tokio::test]
async fn test_purchase_flow() {
    let fx = make_fixture().await;
    let purchase = format!("/api/rewards/{}/purchase", fx.reward.id);

    // Broke: 0 gold against a cost of 50.
    let response = fx
        .router()
        .oneshot(post_as(fx.user.id, &purchase))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["kind"], "insufficient_funds");

    // Earn 60 gold, then buy the only unit.
    let complete = format!("/api/tasks/{}/complete", fx.daily.id);
    fx.router()
        .oneshot(post_as(fx.user.id, &complete))
        .await
        .unwrap();

    let response = fx
        .router()
        .oneshot(post_as(fx.user.id, &purchase))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["cost"], 50);
    assert_eq!(json["new_gold"], 10);
    assert_eq!(json["reward_title"], "Coffee");

    // Stock is now exhausted.
    let response = fx
        .router()
        .oneshot(post_as(fx.user.id, &purchase))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["kind"], "out_of_stock");
}

#[tokio::test]
async fn test_progress_and_audit() {
    let fx = make_fixture().await;
    let complete = format!("/api/tasks/{}/complete", fx.daily.id);
    fx.router()
        .oneshot(post_as(fx.user.id, &complete))
        .await
        .unwrap();

    let response = fx
        .router()
        .oneshot(get_as(fx.user.id, "/api/me/progress"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["gold"], 60);
    assert_eq!(json["exp"], 150);
    assert_eq!(json["level"], 2);
    assert_eq!(json["progress"]["level_floor_exp"], 100);
    assert_eq!(json["progress"]["exp_into_level"], 50);
    assert_eq!(json["progress"]["percent"], 25);

    let response = fx
        .router()
        .oneshot(get_as(fx.user.id, "/api/me/audit"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["balanced"], true);
}

#[tokio::test]
async fn test_progress_of_unknown_user_is_404() {
    let fx = make_fixture().await;
    let response = fx
        .router()
        .oneshot(get_as(UserId::new(), "/api/me/progress"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_user() {
    let fx = make_fixture().await;

    let request = |name: &str| {
        Request::post("/api/users")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::json!({ "username": name }).to_string()))
            .unwrap()
    };

    let response = fx.router().oneshot(request("bob")).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["username"], "bob");
    assert_eq!(json["gold"], 0);
    assert_eq!(json["level"], 1);

    let response = fx.router().oneshot(request("bob")).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["kind"], "username_taken");
}

#[tokio::test]
async fn test_register_rejects_bad_body() {
    let fx = make_fixture().await;
    let response = fx
        .router()
        .oneshot(
            Request::post("/api/users")
                .header("content-type", "application/json")
                .body(Body::from("{\"name\": 1}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["kind"], "invalid_body");
}
