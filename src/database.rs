//! # Postgres
//!
//! Relational store behind every surface: users, categories, problems, and
//! the verification ledger.
//!
//! ## Requirements
//!
//! - Range scans over problem coordinates for the viewport feed
//! - A three-way join (problems, categories, users) projected into one row
//! - Cheap `COUNT(*)` pairs per problem for the tally fan-out
//! - One verification row per (user, problem) pair
//!
//! ## Implementation
//!
//! - Inclusive `BETWEEN` filters on both axes, backed by a composite
//!   `(lat, lng)` index
//! - `ORDER BY problems.id` so the feed order is stable across requests
//!   instead of whatever the planner felt like
//! - `UNIQUE (user_id, prob_id)` on verifications backs the ledger's
//!   duplicate-cast refusal at the storage layer
//! - Schema bootstrap is idempotent `CREATE TABLE IF NOT EXISTS`, run once
//!   at startup

use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions, raw_sql};
use tracing::info;

use crate::{
    error::AppError,
    markers::{Bounds, Marker, MarkerStore, NewProblem, Problem},
    users::User,
    verifications::{Verification, VerificationStore},
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id BIGSERIAL PRIMARY KEY,
    username TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    h_pw TEXT NOT NULL,
    address TEXT
);

CREATE TABLE IF NOT EXISTS categories (
    id BIGSERIAL PRIMARY KEY,
    category TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS problems (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL REFERENCES users (id),
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    lat DOUBLE PRECISION NOT NULL,
    lng DOUBLE PRECISION NOT NULL,
    category_id BIGINT NOT NULL REFERENCES categories (id)
);

CREATE TABLE IF NOT EXISTS verifications (
    id BIGSERIAL PRIMARY KEY,
    prob_id BIGINT NOT NULL REFERENCES problems (id),
    user_id BIGINT NOT NULL REFERENCES users (id),
    verified BOOLEAN NOT NULL,
    UNIQUE (user_id, prob_id)
);

CREATE INDEX IF NOT EXISTS problems_lat_lng_idx ON problems (lat, lng);
CREATE INDEX IF NOT EXISTS verifications_prob_idx ON verifications (prob_id, verified);
"#;

pub async fn init_postgres(database_url: &str) -> PgPool {
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .connect(database_url)
        .await
        .expect("Failed to connect to Postgres");

    raw_sql(SCHEMA)
        .execute(&pool)
        .await
        .expect("Failed to bootstrap schema");

    info!("Postgres ready");

    pool
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_problem(&self, new: &NewProblem) -> Result<Problem, AppError> {
        let problem = sqlx::query_as::<_, Problem>(
            "INSERT INTO problems (user_id, title, description, lat, lng, category_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, user_id, title, description, lat, lng, category_id",
        )
        .bind(new.user_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.lat)
        .bind(new.lng)
        .bind(new.category_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(problem)
    }

    pub async fn insert_user(
        &self,
        username: &str,
        email: &str,
        h_pw: &str,
        address: Option<&str>,
    ) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, email, h_pw, address) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, username, email, address, h_pw",
        )
        .bind(username)
        .bind(email)
        .bind(h_pw)
        .bind(address)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, address, h_pw FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

#[async_trait]
impl MarkerStore for PgStore {
    async fn markers_within(&self, bounds: &Bounds) -> Result<Vec<Marker>, AppError> {
        let markers = sqlx::query_as::<_, Marker>(
            "SELECT problems.id, problems.user_id, problems.title, problems.description, \
                    problems.lat, problems.lng, users.username, categories.category \
             FROM problems \
             JOIN categories ON categories.id = problems.category_id \
             JOIN users ON users.id = problems.user_id \
             WHERE problems.lat BETWEEN $1 AND $2 \
               AND problems.lng BETWEEN $3 AND $4 \
             ORDER BY problems.id",
        )
        .bind(bounds.lat_min)
        .bind(bounds.lat_max)
        .bind(bounds.lng_min)
        .bind(bounds.lng_max)
        .fetch_all(&self.pool)
        .await?;

        Ok(markers)
    }

    async fn count_verifications(&self, prob_id: i64, verified: bool) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM verifications WHERE prob_id = $1 AND verified = $2",
        )
        .bind(prob_id)
        .bind(verified)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

#[async_trait]
impl VerificationStore for PgStore {
    async fn find(&self, user_id: i64, prob_id: i64) -> Result<Option<Verification>, AppError> {
        let row = sqlx::query_as::<_, Verification>(
            "SELECT id, prob_id, user_id, verified FROM verifications \
             WHERE user_id = $1 AND prob_id = $2",
        )
        .bind(user_id)
        .bind(prob_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn insert(
        &self,
        user_id: i64,
        prob_id: i64,
        verified: bool,
    ) -> Result<Verification, AppError> {
        let row = sqlx::query_as::<_, Verification>(
            "INSERT INTO verifications (prob_id, user_id, verified) \
             VALUES ($1, $2, $3) \
             RETURNING id, prob_id, user_id, verified",
        )
        .bind(prob_id)
        .bind(user_id)
        .bind(verified)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn update(
        &self,
        user_id: i64,
        prob_id: i64,
        verified: bool,
    ) -> Result<Option<Verification>, AppError> {
        let row = sqlx::query_as::<_, Verification>(
            "UPDATE verifications SET verified = $3 \
             WHERE user_id = $1 AND prob_id = $2 \
             RETURNING id, prob_id, user_id, verified",
        )
        .bind(user_id)
        .bind(prob_id)
        .bind(verified)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
