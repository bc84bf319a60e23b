//! # Verifications
//!
//! The ledger of yes/no judgments users cast on problems. One row per
//! (user, problem) pair; the only mutation the domain allows is flipping the
//! `verified` flag when a user changes their mind.
//!
//! Absence of a row is ordinary state, not an error: `lookup` hands back
//! `None` and clients use it to decide between casting a new vote and
//! changing an existing one. Casting over an existing row is refused so a
//! user can never count twice in a tally.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Verification {
    pub id: i64,
    pub prob_id: i64,
    pub user_id: i64,
    pub verified: bool,
}

#[async_trait]
pub trait VerificationStore: Send + Sync {
    async fn find(&self, user_id: i64, prob_id: i64) -> Result<Option<Verification>, AppError>;

    async fn insert(
        &self,
        user_id: i64,
        prob_id: i64,
        verified: bool,
    ) -> Result<Verification, AppError>;

    /// Flips the flag of the matching row; `None` when no row matched.
    async fn update(
        &self,
        user_id: i64,
        prob_id: i64,
        verified: bool,
    ) -> Result<Option<Verification>, AppError>;
}

pub async fn lookup<S>(
    store: &S,
    user_id: i64,
    prob_id: i64,
) -> Result<Option<Verification>, AppError>
where
    S: VerificationStore + ?Sized,
{
    store.find(user_id, prob_id).await
}

/// Records a first judgment. A second cast for the same pair is refused.
pub async fn cast<S>(
    store: &S,
    user_id: i64,
    prob_id: i64,
    verified: bool,
) -> Result<Verification, AppError>
where
    S: VerificationStore + ?Sized,
{
    if store.find(user_id, prob_id).await?.is_some() {
        return Err(AppError::DuplicateVerification);
    }

    store.insert(user_id, prob_id, verified).await
}

/// Changes an existing judgment; a missing row is a no-op, not an error.
pub async fn change<S>(
    store: &S,
    user_id: i64,
    prob_id: i64,
    verified: bool,
) -> Result<Option<Verification>, AppError>
where
    S: VerificationStore + ?Sized,
{
    store.update(user_id, prob_id, verified).await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};

    use tokio::sync::RwLock;

    use super::*;

    #[derive(Default)]
    struct MemLedger {
        rows: RwLock<Vec<Verification>>,
        next_id: AtomicI64,
    }

    #[async_trait]
    impl VerificationStore for MemLedger {
        async fn find(&self, user_id: i64, prob_id: i64) -> Result<Option<Verification>, AppError> {
            Ok(self
                .rows
                .read()
                .await
                .iter()
                .find(|v| v.user_id == user_id && v.prob_id == prob_id)
                .cloned())
        }

        async fn insert(
            &self,
            user_id: i64,
            prob_id: i64,
            verified: bool,
        ) -> Result<Verification, AppError> {
            let row = Verification {
                id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                prob_id,
                user_id,
                verified,
            };

            self.rows.write().await.push(row.clone());

            Ok(row)
        }

        async fn update(
            &self,
            user_id: i64,
            prob_id: i64,
            verified: bool,
        ) -> Result<Option<Verification>, AppError> {
            let mut rows = self.rows.write().await;

            Ok(rows
                .iter_mut()
                .find(|v| v.user_id == user_id && v.prob_id == prob_id)
                .map(|row| {
                    row.verified = verified;
                    row.clone()
                }))
        }
    }

    #[tokio::test]
    async fn lookup_without_a_row_is_none() {
        let ledger = MemLedger::default();

        assert_eq!(lookup(&ledger, 7, 9).await.unwrap(), None);
    }

    #[tokio::test]
    async fn cast_stores_and_returns_the_row() {
        let ledger = MemLedger::default();

        let row = cast(&ledger, 7, 9, true).await.unwrap();

        assert_eq!(row.user_id, 7);
        assert_eq!(row.prob_id, 9);
        assert!(row.verified);
        assert_eq!(lookup(&ledger, 7, 9).await.unwrap(), Some(row));
    }

    #[tokio::test]
    async fn second_cast_for_the_same_pair_is_refused() {
        let ledger = MemLedger::default();

        cast(&ledger, 7, 9, true).await.unwrap();
        let err = cast(&ledger, 7, 9, false).await.unwrap_err();

        assert!(matches!(err, AppError::DuplicateVerification));
    }

    #[tokio::test]
    async fn change_flips_the_flag() {
        let ledger = MemLedger::default();

        let cast_row = cast(&ledger, 7, 9, true).await.unwrap();
        let changed = change(&ledger, 7, 9, false).await.unwrap().unwrap();

        assert_eq!(changed.id, cast_row.id);
        assert!(!changed.verified);
    }

    #[tokio::test]
    async fn change_is_idempotent() {
        let ledger = MemLedger::default();

        cast(&ledger, 7, 9, true).await.unwrap();
        let first = change(&ledger, 7, 9, false).await.unwrap();
        let second = change(&ledger, 7, 9, false).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(lookup(&ledger, 7, 9).await.unwrap(), second);
    }

    #[tokio::test]
    async fn change_without_a_row_is_a_noop() {
        let ledger = MemLedger::default();

        assert_eq!(change(&ledger, 7, 9, true).await.unwrap(), None);
        assert_eq!(lookup(&ledger, 7, 9).await.unwrap(), None);
    }

    #[test]
    fn row_serializes_with_column_names() {
        let row = Verification {
            id: 3,
            prob_id: 9,
            user_id: 7,
            verified: true,
        };

        let json = serde_json::to_value(&row).unwrap();

        assert_eq!(json["id"], 3);
        assert_eq!(json["prob_id"], 9);
        assert_eq!(json["user_id"], 7);
        assert_eq!(json["verified"], true);
    }
}
