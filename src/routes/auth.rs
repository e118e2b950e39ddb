//! Sign-up, sign-in and sign-out.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use super::AppState;
use crate::{AppResult, AuthUser};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .route("/auth/signout", post(sign_out))
        .route("/auth/user", get(current_user))
}

#[derive(Debug, Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

async fn sign_up(
    State(state): State<AppState>,
    Json(creds): Json<Credentials>,
) -> AppResult<(StatusCode, Json<AuthUser>)> {
    // ---
    info!("POST /auth/signup");
    let user = state
        .auth
        .create_account(&creds.email, &creds.password)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn sign_in(
    State(state): State<AppState>,
    Json(creds): Json<Credentials>,
) -> AppResult<Json<AuthUser>> {
    // ---
    info!("POST /auth/signin");
    let user = state.auth.sign_in(&creds.email, &creds.password).await?;
    Ok(Json(user))
}

async fn sign_out(State(state): State<AppState>) -> impl IntoResponse {
    info!("POST /auth/signout");
    state.auth.sign_out();
    StatusCode::NO_CONTENT
}

async fn current_user(State(state): State<AppState>) -> Json<Option<AuthUser>> {
    Json(state.auth.session().current_user())
}

#[cfg(test)]
mod tests {
    // ---
    use axum::http::{Method, StatusCode};
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    use crate::routes::test_support::{body_json, send, sign_in_directly, test_state};

    async fn spawn_identity_mock() -> String {
        let router = Router::new()
            .route(
                "/v1/accounts:signUp",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({
                        "localId": "uid-new",
                        "email": body["email"],
                        "idToken": "tok-new"
                    }))
                }),
            )
            .route(
                "/v1/accounts:signInWithPassword",
                post(|| async {
                    (
                        axum::http::StatusCode::BAD_REQUEST,
                        Json(json!({ "error": { "message": "EMAIL_NOT_FOUND" } })),
                    )
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    #[tokio::test]
    async fn test_signup_signs_the_user_in() {
        let state = test_state(&spawn_identity_mock().await);
        let response = send(
            &state,
            Method::POST,
            "/auth/signup",
            Some(json!({ "email": "dad@example.com", "password": "hunter22" })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["uid"], "uid-new");
        assert!(json.get("id_token").is_none());

        let response = send(&state, Method::GET, "/auth/user", None).await;
        assert_eq!(body_json(response).await["email"], "dad@example.com");
    }

    #[tokio::test]
    async fn test_failed_signin_returns_user_message() {
        let state = test_state(&spawn_identity_mock().await);
        let response = send(
            &state,
            Method::POST,
            "/auth/signin",
            Some(json!({ "email": "who@example.com", "password": "x" })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["code"], "EMAIL_NOT_FOUND");
        assert_eq!(json["error"], "Incorrect email or password.");
    }

    #[tokio::test]
    async fn test_signout_clears_current_user() {
        let state = test_state("http://127.0.0.1:9");
        sign_in_directly(&state);

        let response = send(&state, Method::POST, "/auth/signout", None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&state, Method::GET, "/auth/user", None).await;
        assert_eq!(body_json(response).await, Value::Null);
    }
}
