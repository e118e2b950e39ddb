//! Live updates: follow the auth state and keep the dashboard fed.
//!
//! Signing in loads the collection once and then subscribes to it with the
//! user's token. Every auth change drops the previous subscription and clears
//! the dashboard first, so one user's telemetry never reaches the next.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

use crate::auth::AuthUser;
use crate::dashboard::DashboardController;
use crate::models::SensorRecord;
use crate::source::{RealtimeSource, SourceEvent, Subscription};

// ---

pub type SharedDashboard = Arc<RwLock<DashboardController>>;

/// Spawn the task that wires auth changes to telemetry delivery.
pub fn spawn(
    mut auth_changes: watch::Receiver<Option<AuthUser>>,
    source: RealtimeSource,
    path: String,
    interval: Duration,
    dashboard: SharedDashboard,
) -> JoinHandle<()> {
    // ---
    tokio::spawn(async move {
        let mut subscription: Option<Subscription> = None;

        while auth_changes.changed().await.is_ok() {
            let user = auth_changes.borrow_and_update().clone();

            // Any previous user's feed stops, and their data is gone, before
            // the next user sees anything
            if let Some(old) = subscription.take() {
                old.unsubscribe().await;
            }
            if let Err(e) = dashboard.write().await.clear() {
                tracing::error!(error = %e, "Failed to clear dashboard");
            }

            if let Some(user) = user {
                tracing::info!(uid = %user.uid, "Loading telemetry for signed-in user");
                let loaded = load_once(&source, &path, &user, &dashboard).await;
                subscription = Some(subscribe(&source, &path, &user, interval, loaded, &dashboard));
            }
        }

        tracing::debug!("Auth state channel closed, stopping live updates");
    })
}

async fn load_once(
    source: &RealtimeSource,
    path: &str,
    user: &AuthUser,
    dashboard: &SharedDashboard,
) -> Option<Vec<SensorRecord>> {
    // ---
    let result = source.fetch(path, Some(&user.id_token)).await;
    let mut dashboard = dashboard.write().await;
    match result {
        Ok(records) => {
            if let Err(e) = dashboard.apply_snapshot(records.clone(), Utc::now()) {
                tracing::error!(error = %e, "Failed to render initial snapshot");
            }
            Some(records)
        }
        Err(e) => {
            dashboard.record_fetch_failure(e.to_string());
            None
        }
    }
}

fn subscribe(
    source: &RealtimeSource,
    path: &str,
    user: &AuthUser,
    interval: Duration,
    loaded: Option<Vec<SensorRecord>>,
    dashboard: &SharedDashboard,
) -> Subscription {
    // ---
    let dashboard = dashboard.clone();
    source.subscribe(
        path,
        Some(user.id_token.clone()),
        interval,
        loaded,
        move |event| {
            let dashboard = dashboard.clone();
            async move {
                let mut dashboard = dashboard.write().await;
                match event {
                    SourceEvent::Snapshot(records) => {
                        tracing::debug!(count = records.len(), "Telemetry snapshot received");
                        if let Err(e) = dashboard.apply_snapshot(records, Utc::now()) {
                            tracing::error!(error = %e, "Failed to render snapshot");
                        }
                    }
                    SourceEvent::Failed(message) => dashboard.record_fetch_failure(message),
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::auth::AuthSession;
    use crate::evaluator::{ThresholdConfig, CRYING_MESSAGE};
    use crate::timeseries::TimeWindow;

    use std::collections::HashMap;

    use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
    use chrono::FixedOffset;
    use serde_json::json;

    /// Database mock that serves a crying record to `tok-a` and refuses
    /// every other token.
    async fn spawn_database() -> String {
        let router = Router::new().route(
            "/sensorData.json",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                if q.get("auth").map(String::as_str) != Some("tok-a") {
                    return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Permission denied" })));
                }
                (
                    StatusCode::OK,
                    Json(json!({
                        "-Na1": {
                            "timestamp": Utc::now().to_rfc3339(),
                            "isCrying": true
                        }
                    })),
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn wait_for<F>(dashboard: &SharedDashboard, predicate: F)
    where
        F: Fn(&DashboardController) -> bool,
    {
        for _ in 0..200 {
            if predicate(&*dashboard.read().await) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("dashboard never reached the expected state");
    }

    fn user(uid: &str, token: &str) -> AuthUser {
        AuthUser {
            uid: uid.to_string(),
            email: format!("{uid}@example.com"),
            id_token: token.to_string(),
        }
    }

    fn start(session: &AuthSession, base: &str) -> (SharedDashboard, JoinHandle<()>) {
        let dashboard: SharedDashboard = Arc::new(RwLock::new(DashboardController::new(
            ThresholdConfig::DEFAULT,
            TimeWindow::Hours(1),
            FixedOffset::east_opt(0).unwrap(),
        )));
        let task = spawn(
            session.on_auth_change(),
            RealtimeSource::new(reqwest::Client::new(), base),
            "sensorData".to_string(),
            Duration::from_millis(20),
            dashboard.clone(),
        );
        (dashboard, task)
    }

    #[tokio::test]
    async fn test_sign_in_feeds_and_sign_out_clears() {
        // ---
        let base = spawn_database().await;
        let session = AuthSession::default();
        let (dashboard, task) = start(&session, &base);

        session.set(Some(user("uid-a", "tok-a")));
        wait_for(&dashboard, |d| d.status().record_count == 1).await;
        assert_eq!(
            dashboard.read().await.status().alert.unwrap().message,
            CRYING_MESSAGE
        );

        session.set(None);
        wait_for(&dashboard, |d| d.status().record_count == 0).await;
        assert!(dashboard.read().await.status().alert.is_none());

        task.abort();
    }

    #[tokio::test]
    async fn test_switching_user_drops_previous_telemetry() {
        // ---
        let base = spawn_database().await;
        let session = AuthSession::default();
        let (dashboard, task) = start(&session, &base);

        session.set(Some(user("uid-a", "tok-a")));
        wait_for(&dashboard, |d| d.status().record_count == 1).await;

        // No sign-out in between: user b replaces user a directly
        session.set(Some(user("uid-b", "tok-b")));
        wait_for(&dashboard, |d| d.status().warning.is_some()).await;

        let ctl = dashboard.read().await;
        let status = ctl.status();
        assert_eq!(status.record_count, 0);
        assert!(status.alert.is_none());
        assert!(status.latest.is_none());
        assert!(status.warning.unwrap().contains("401"));
        assert!(ctl.charts().targets.values().all(|view| matches!(
            view,
            crate::dashboard::ChartView::Placeholder { .. }
        )));
        drop(ctl);

        task.abort();
    }
}
