//! # Markers
//!
//! Problem discovery around a map viewport, plus the verification consensus
//! tally that rides along with every returned problem.
//!
//! ## Viewport
//!
//! Clients send a center point, not a rectangle. We widen the center by a
//! configured half-width in decimal degrees (0.2 by default, roughly a city
//! district) on both axes and min/max-normalize the corners so the range
//! filter stays valid for any sign of the inputs.
//!
//! ## Tally fan-out
//!
//! Each problem's tally is two count queries over `verifications`: rows with
//! `verified = true` and rows with `verified = false`. The pair runs
//! concurrently, and the per-problem tallies run concurrently with each
//! other, so a feed of n problems issues 2n counts without waiting on any
//! one of them serially.
//!
//! Every count holds one permit from a process-wide semaphore while its
//! query is in flight. A dense viewport can match hundreds of problems;
//! without the cap the fan-out would race the whole batch against the
//! connection pool at once.
//!
//! ## Ordering and failure
//!
//! The response order is the store's order (`ORDER BY problems.id`), not
//! completion order. The join is all-or-nothing: one failed count fails the
//! whole feed rather than returning a shorter or partially-tallied array.
//!
//! No transaction spans the fan-out. Two counts for the same problem can
//! observe different instants when a vote lands mid-request, which is
//! acceptable for an approximate agreement signal.

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::AppError;

/// Axis-aligned viewport rectangle, inclusive on all edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
}

impl Bounds {
    pub fn around(lat: f64, lng: f64, half_width: f64) -> Self {
        let lat_lo = lat - half_width;
        let lat_hi = lat + half_width;
        let lng_lo = lng - half_width;
        let lng_hi = lng + half_width;

        Self {
            lat_min: lat_lo.min(lat_hi),
            lat_max: lat_lo.max(lat_hi),
            lng_min: lng_lo.min(lng_hi),
            lng_max: lng_lo.max(lng_hi),
        }
    }

    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.lat_min && lat <= self.lat_max && lng >= self.lng_min && lng <= self.lng_max
    }
}

/// A stored problem report, as creation returns it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Problem {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub lat: f64,
    pub lng: f64,
    pub category_id: i64,
}

/// Creation payload for a new problem report.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProblem {
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub lat: f64,
    pub lng: f64,
    pub category_id: i64,
}

/// One row of the problems ⋈ categories ⋈ users feed query.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Marker {
    pub id: i64,
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub lat: f64,
    pub lng: f64,
    pub username: String,
    pub category: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub yes: i64,
    pub no: i64,
    pub total: i64,
}

/// A marker with its tally, flattened to one JSON object on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct TalliedMarker {
    #[serde(flatten)]
    pub marker: Marker,
    #[serde(flatten)]
    pub tally: Tally,
}

#[async_trait]
pub trait MarkerStore: Send + Sync {
    /// Markers inside the rectangle, in a stable order the feed preserves.
    async fn markers_within(&self, bounds: &Bounds) -> Result<Vec<Marker>, AppError>;

    /// Count of verification rows for one problem with the given flag.
    async fn count_verifications(&self, prob_id: i64, verified: bool) -> Result<i64, AppError>;
}

/// The feed: base query, then the bounded all-or-nothing tally fan-out.
pub async fn discover<S>(
    store: &S,
    limiter: &Semaphore,
    bounds: &Bounds,
) -> Result<Vec<TalliedMarker>, AppError>
where
    S: MarkerStore + ?Sized,
{
    let markers = store.markers_within(bounds).await?;

    // try_join_all keeps the input order and fails fast on the first error.
    try_join_all(
        markers
            .into_iter()
            .map(|marker| tally_marker(store, limiter, marker)),
    )
    .await
}

async fn tally_marker<S>(
    store: &S,
    limiter: &Semaphore,
    marker: Marker,
) -> Result<TalliedMarker, AppError>
where
    S: MarkerStore + ?Sized,
{
    let (yes, no) = tokio::try_join!(
        count_with_permit(store, limiter, marker.id, true),
        count_with_permit(store, limiter, marker.id, false),
    )?;

    Ok(TalliedMarker {
        marker,
        tally: Tally {
            yes,
            no,
            total: yes + no,
        },
    })
}

async fn count_with_permit<S>(
    store: &S,
    limiter: &Semaphore,
    prob_id: i64,
    verified: bool,
) -> Result<i64, AppError>
where
    S: MarkerStore + ?Sized,
{
    let _permit = limiter
        .acquire()
        .await
        .map_err(|e| AppError::Internal(Box::new(e)))?;

    store.count_verifications(prob_id, verified).await
}
