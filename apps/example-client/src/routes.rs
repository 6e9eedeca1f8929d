//! HTTP surface: landing page, sign-in start and the OAuth2 callback.

use crate::render::Renderer;
use axum::{
    Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use rp_identity_oidc::{CallbackError, CallbackOutcome, CallbackParams, RelyingParty};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub relying_party: RelyingParty,
    pub renderer: Arc<Renderer>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/signin", get(signin_handler))
        .route("/oauth_callback", get(oauth_callback_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index_handler(State(state): State<AppState>) -> Response {
    page(
        StatusCode::OK,
        state.renderer.index(state.relying_party.auth_host()),
    )
}

/// Redirects the user agent to the authorization endpoint with a fresh state.
async fn signin_handler(State(state): State<AppState>) -> Response {
    let url = state.relying_party.start_sign_in().await;
    (StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response()
}

async fn oauth_callback_handler(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    info!("Handling OAuth2 callback");

    match state.relying_party.complete_sign_in(params).await {
        CallbackOutcome::Success(sign_in) => page(
            StatusCode::OK,
            state
                .renderer
                .success(&sign_in, state.relying_party.signout_url().as_str()),
        ),
        CallbackOutcome::Error(err) => {
            page(status_for(&err), state.renderer.error(&err.to_string()))
        }
    }
}

fn status_for(err: &CallbackError) -> StatusCode {
    match err {
        CallbackError::InvalidState
        | CallbackError::AuthorizationDenied { .. }
        | CallbackError::MissingAuthorizationCode => StatusCode::BAD_REQUEST,
        CallbackError::Exchange(_) => StatusCode::BAD_GATEWAY,
        CallbackError::Verification(_) => StatusCode::UNAUTHORIZED,
    }
}

fn page(status: StatusCode, rendered: anyhow::Result<String>) -> Response {
    match rendered {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!("{:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}
