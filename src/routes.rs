use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    error::AppError,
    markers::{self, Bounds, NewProblem, Problem, TalliedMarker},
    state::AppState,
    users::{self, AuthenticatedUser},
    utils::{Coordinate, parse_coordinate},
    verifications::{self, Verification},
};

#[derive(Deserialize)]
pub struct Viewport {
    lat: Coordinate,
    lng: Coordinate,
}

#[derive(Deserialize)]
pub struct Vote {
    #[serde(rename = "userId")]
    user_id: i64,
    #[serde(rename = "probId")]
    prob_id: i64,
    verification: bool,
}

#[derive(Deserialize)]
pub struct Registration {
    username: String,
    email: String,
    password: String,
    address: Option<String>,
}

#[derive(Deserialize)]
pub struct Credentials {
    email: String,
    password: String,
}

pub async fn root_handler() -> impl IntoResponse {
    "Hi from API!"
}

pub async fn markers_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Viewport>,
) -> Result<Json<Vec<TalliedMarker>>, AppError> {
    let lat = parse_coordinate(&payload.lat, "lat")?;
    let lng = parse_coordinate(&payload.lng, "lng")?;

    let bounds = Bounds::around(lat, lng, state.config.marker_span_deg);

    let feed = markers::discover(&state.store, &state.count_limiter, &bounds).await?;

    Ok(Json(feed))
}

pub async fn create_problem_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewProblem>,
) -> Result<Json<Problem>, AppError> {
    let problem = state.store.insert_problem(&payload).await?;

    Ok(Json(problem))
}

pub async fn lookup_verification_handler(
    State(state): State<Arc<AppState>>,
    Path((user_id, prob_id)): Path<(i64, i64)>,
) -> Result<Response, AppError> {
    let row = verifications::lookup(&state.store, user_id, prob_id).await?;

    Ok(lookup_response(row))
}

// A missing row answers with the literal `false`, not a 404.
fn lookup_response(row: Option<Verification>) -> Response {
    match row {
        Some(row) => Json(row).into_response(),
        None => Json(false).into_response(),
    }
}

pub async fn cast_verification_handler(
    State(state): State<Arc<AppState>>,
    Json(vote): Json<Vote>,
) -> Result<Json<Verification>, AppError> {
    let row =
        verifications::cast(&state.store, vote.user_id, vote.prob_id, vote.verification).await?;

    Ok(Json(row))
}

pub async fn change_verification_handler(
    State(state): State<Arc<AppState>>,
    Json(vote): Json<Vote>,
) -> Result<Json<Option<Verification>>, AppError> {
    let row =
        verifications::change(&state.store, vote.user_id, vote.prob_id, vote.verification).await?;

    Ok(Json(row))
}

pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(registration): Json<Registration>,
) -> Result<Json<AuthenticatedUser>, AppError> {
    let h_pw = users::hash_password(&registration.password)?;

    let user = state
        .store
        .insert_user(
            &registration.username,
            &registration.email,
            &h_pw,
            registration.address.as_deref(),
        )
        .await?;

    let token = state.tokens.issue(user.id)?;

    Ok(Json(AuthenticatedUser { user, token }))
}

pub async fn token_handler(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<AuthenticatedUser>, AppError> {
    let user = state
        .store
        .find_user_by_email(&credentials.email)
        .await?
        .ok_or(AppError::BadCredentials)?;

    if !users::verify_password(&credentials.password, &user.h_pw)? {
        return Err(AppError::BadCredentials);
    }

    let token = state.tokens.issue(user.id)?;

    Ok(Json(AuthenticatedUser { user, token }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_accepts_numbers_and_strings() {
        let payload: Viewport = serde_json::from_str(r#"{"lat": 47.6, "lng": "-122.33"}"#).unwrap();

        assert_eq!(parse_coordinate(&payload.lat, "lat").unwrap(), 47.6);
        assert_eq!(parse_coordinate(&payload.lng, "lng").unwrap(), -122.33);
    }

    #[test]
    fn vote_payload_uses_camel_case_keys() {
        let vote: Vote =
            serde_json::from_str(r#"{"userId": 7, "probId": 9, "verification": false}"#).unwrap();

        assert_eq!(vote.user_id, 7);
        assert_eq!(vote.prob_id, 9);
        assert!(!vote.verification);
    }

    #[tokio::test]
    async fn missing_lookup_answers_literal_false() {
        let response = lookup_response(None);

        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();

        assert_eq!(&body[..], b"false");
    }

    #[tokio::test]
    async fn found_lookup_answers_the_row() {
        let response = lookup_response(Some(Verification {
            id: 3,
            prob_id: 9,
            user_id: 7,
            verified: true,
        }));

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["id"], 3);
        assert_eq!(json["verified"], true);
    }

    #[test]
    fn problem_payload_uses_column_keys() {
        let payload: NewProblem = serde_json::from_str(
            r#"{
                "user_id": 1,
                "title": "Broken streetlight",
                "description": "Dark corner at night",
                "lat": 47.61,
                "lng": -122.32,
                "category_id": 2
            }"#,
        )
        .unwrap();

        assert_eq!(payload.user_id, 1);
        assert_eq!(payload.category_id, 2);
    }
}
