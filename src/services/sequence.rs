//! Date-scoped, human-readable document numbers (`INV-20250115-0007`).
//!
//! Each scope owns one row in `counters`; the increment is an upsert followed
//! by a read inside a short transaction of its own, so it never joins the
//! caller's sale or receipt transaction. Numbers burned by an aborted caller
//! are not reused.

use crate::{entities::counter, errors::ServiceError};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    sea_query::{Expr, OnConflict},
    DatabaseConnection, EntityTrait, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Document families that draw numbers from the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceKind {
    Invoice,
    PurchaseOrder,
}

impl SequenceKind {
    pub fn prefix(self) -> &'static str {
        match self {
            SequenceKind::Invoice => "INV",
            SequenceKind::PurchaseOrder => "PO",
        }
    }

    fn scope_prefix(self) -> &'static str {
        match self {
            SequenceKind::Invoice => "invoice",
            SequenceKind::PurchaseOrder => "po",
        }
    }

    /// Counter key for the given day, e.g. `invoice:20250115`.
    pub fn scope(self, date: NaiveDate) -> String {
        format!("{}:{}", self.scope_prefix(), date.format("%Y%m%d"))
    }
}

/// Formats `PREFIX-YYYYMMDD-NNNN`. Values above 9999 are printed in full.
pub fn format_sequence(prefix: &str, date: NaiveDate, seq: i64) -> String {
    format!("{}-{}-{:04}", prefix, date.format("%Y%m%d"), seq)
}

/// Parses the numeric tail of a formatted number.
pub fn sequence_component(number: &str) -> Option<i64> {
    number.rsplit('-').next()?.parse().ok()
}

#[derive(Clone)]
pub struct SequenceService {
    db: Arc<DatabaseConnection>,
}

impl SequenceService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Atomically increments the counter for `scope` and returns the new
    /// value. A missing counter starts at zero, so the first value is 1.
    #[instrument(skip(self))]
    pub async fn next_sequence(&self, scope: &str) -> Result<i64, ServiceError> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        counter::Entity::insert(counter::ActiveModel {
            key: Set(scope.to_string()),
            seq: Set(1),
            updated_at: Set(now),
        })
        .on_conflict(
            OnConflict::column(counter::Column::Key)
                .value(
                    counter::Column::Seq,
                    Expr::col((counter::Entity, counter::Column::Seq)).add(1),
                )
                .value(counter::Column::UpdatedAt, now)
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;

        let row = counter::Entity::find_by_id(scope.to_string())
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!("counter {} vanished after increment", scope))
            })?;

        txn.commit().await?;

        metrics::counter!("phonestore.sequence.allocated", 1);
        debug!(scope, seq = row.seq, "sequence allocated");
        Ok(row.seq)
    }

    /// Allocates the next document number of `kind` for the day of `at`.
    pub async fn next_number(
        &self,
        kind: SequenceKind,
        at: DateTime<Utc>,
    ) -> Result<String, ServiceError> {
        let date = at.date_naive();
        let seq = self.next_sequence(&kind.scope(date)).await?;
        Ok(format_sequence(kind.prefix(), date, seq))
    }
}
