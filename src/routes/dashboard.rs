//! Dashboard views: status panel, charts, window selection and raw history.
//!
//! Every route here answers 401 until someone signs in.

use axum::{
    extract::{Query, State},
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};

use super::AppState;
use crate::dashboard::{ChartsView, DashboardStatus};
use crate::timeseries::{prepare_series, ChartSeries};
use crate::{AppError, AppResult, AuthUser, TimeWindow};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/dashboard/status", get(status))
        .route("/dashboard/charts", get(charts))
        .route("/dashboard/window", put(select_window))
        .route("/dashboard/history", get(history))
}

fn require_user(state: &AppState) -> AppResult<AuthUser> {
    state
        .auth
        .session()
        .current_user()
        .ok_or(AppError::Unauthorized)
}

fn parse_window(raw: &str) -> AppResult<TimeWindow> {
    raw.parse::<TimeWindow>()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

async fn status(State(state): State<AppState>) -> AppResult<Json<DashboardStatus>> {
    // ---
    require_user(&state)?;
    debug!("GET /dashboard/status");
    Ok(Json(state.dashboard.read().await.status()))
}

async fn charts(State(state): State<AppState>) -> AppResult<Json<ChartsView>> {
    // ---
    require_user(&state)?;
    debug!("GET /dashboard/charts");
    Ok(Json(state.dashboard.read().await.charts()))
}

#[derive(Debug, Deserialize)]
struct WindowRequest {
    window: String,
}

async fn select_window(
    State(state): State<AppState>,
    Json(req): Json<WindowRequest>,
) -> AppResult<Json<ChartsView>> {
    // ---
    let user = require_user(&state)?;
    let window = parse_window(&req.window)?;
    info!(uid = %user.uid, %window, "PUT /dashboard/window");

    let mut dashboard = state.dashboard.write().await;
    dashboard.select_window(window, Utc::now())?;
    Ok(Json(dashboard.charts()))
}

/// Query parameters for `GET /dashboard/history`.
#[derive(Debug, Deserialize)]
struct HistoryQuery {
    /// Defaults to the currently selected window.
    window: Option<String>,
}

/// Prepared series for a window, without changing the selected one.
async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> AppResult<Json<ChartSeries>> {
    // ---
    require_user(&state)?;
    let dashboard = state.dashboard.read().await;
    let window = match params.window.as_deref() {
        Some(raw) => parse_window(raw)?,
        None => dashboard.window(),
    };
    debug!(%window, "GET /dashboard/history");

    Ok(Json(prepare_series(
        dashboard.records(),
        window,
        Utc::now(),
        dashboard.display_offset(),
    )))
}

#[cfg(test)]
mod tests {
    // ---
    use axum::http::{Method, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::json;

    use crate::models::{SensorRecord, SleepPosition, SleepStatus};
    use crate::routes::test_support::{body_json, send, sign_in_directly, test_state};
    use crate::routes::AppState;

    fn record(hours_ago: i64) -> SensorRecord {
        SensorRecord {
            timestamp: (Utc::now() - Duration::hours(hours_ago)).to_rfc3339(),
            status: SleepStatus::Sleeping,
            is_crying: false,
            baby_temperature: Some(37.8),
            environment_temperature: Some(0.0),
            environment_humidity: Some(70.0),
            sleep_position: SleepPosition::Prone,
        }
    }

    async fn signed_in_state_with_data() -> AppState {
        let state = test_state("http://127.0.0.1:9");
        sign_in_directly(&state);
        state
            .dashboard
            .write()
            .await
            .apply_snapshot(vec![record(30), record(10), record(2)], Utc::now())
            .unwrap();
        state
    }

    #[tokio::test]
    async fn test_dashboard_requires_sign_in() {
        let state = test_state("http://127.0.0.1:9");
        for uri in ["/dashboard/status", "/dashboard/charts", "/dashboard/history"] {
            let response = send(&state, Method::GET, uri, None).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
        }
    }

    #[tokio::test]
    async fn test_status_reports_top_alert_and_badges() {
        let state = signed_in_state_with_data().await;
        let response = send(&state, Method::GET, "/dashboard/status", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["alert"]["severity"], "danger");
        assert_eq!(json["alert"]["message"], "Baby temperature is high: 37.8 °C");
        assert_eq!(json["badges"]["environmentTemperature"]["label"], "0.0 °C");
        assert_eq!(json["badges"]["sleepPosition"]["severity"], "danger");
        assert_eq!(json["recordCount"], 3);
        assert_eq!(json["window"], "24h");
    }

    #[tokio::test]
    async fn test_history_filters_by_window() {
        let state = signed_in_state_with_data().await;

        let json = body_json(send(&state, Method::GET, "/dashboard/history", None).await).await;
        assert_eq!(json["kind"], "data");
        assert_eq!(json["labels"].as_array().unwrap().len(), 2);

        let json =
            body_json(send(&state, Method::GET, "/dashboard/history?window=1h", None).await).await;
        assert_eq!(json, json!({ "kind": "noData" }));

        let response = send(&state, Method::GET, "/dashboard/history?window=3h", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_window_change_rerenders_charts() {
        let state = signed_in_state_with_data().await;

        let json = body_json(send(&state, Method::GET, "/dashboard/charts", None).await).await;
        assert_eq!(json["targets"]["temperature"]["kind"], "chart");
        let first_id = json["targets"]["temperature"]["chart"]["id"].clone();

        let response = send(
            &state,
            Method::PUT,
            "/dashboard/window",
            Some(json!({ "window": "all" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["window"], "all");
        assert_eq!(
            json["targets"]["humidity"]["chart"]["labels"]
                .as_array()
                .unwrap()
                .len(),
            3
        );
        assert_ne!(json["targets"]["temperature"]["chart"]["id"], first_id);

        let json = body_json(
            send(
                &state,
                Method::PUT,
                "/dashboard/window",
                Some(json!({ "window": "1h" })),
            )
            .await,
        )
        .await;
        assert_eq!(json["targets"]["temperature"]["kind"], "placeholder");
    }
}
