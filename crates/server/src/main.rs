use std::{collections::HashMap, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use chrono::Utc;
use server_api::{confirm, search, RsvpError, ValidationError};
use shared::{error::ApiError, protocol::RsvpForm};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod render;

use app_state::AppState;
use config::load_settings;

const MAX_FORM_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings()?;
    settings.validate().context("invalid settings")?;
    let state = AppState::from_settings(&settings).await?;
    let app = build_router(Arc::new(state));

    let addr = settings.socket_addr()?;
    info!(%addr, mode = ?settings.mode, "rsvp server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/rsvp", post(rsvp))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_FORM_BYTES))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn index() -> Html<String> {
    Html(render::search_page(None))
}

async fn rsvp(
    State(state): State<Arc<AppState>>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let now = Utc::now();
    match RsvpForm::from_fields(&fields) {
        RsvpForm::Search { name } => match search(&state.rsvp, &name, now).await {
            Ok(outcome) => Html(render::family_page(&outcome)).into_response(),
            Err(error) => failure(&error),
        },
        RsvpForm::Confirm(submission) => match confirm(&state.rsvp, &submission, now).await {
            Ok(outcome) => Html(render::success_page(&outcome)).into_response(),
            Err(error) => failure(&error),
        },
        RsvpForm::Empty => failure(&ValidationError::MissingForm.into()),
    }
}

/// Validation errors go back to the guest on the search form; anything else is logged and hidden.
fn failure(error: &RsvpError) -> Response {
    let api_error = ApiError::from(error);
    if api_error.code.is_user_facing() {
        return (
            StatusCode::OK,
            Html(render::search_page(Some(&api_error.message))),
        )
            .into_response();
    }

    error!(code = ?api_error.code, %error, "rsvp request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, Html(render::error_page())).into_response()
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
