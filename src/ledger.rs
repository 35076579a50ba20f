//! Points ledger
//!
//! One entry per user in the `leaderboard` collection. Awards are applied
//! with the store's atomic increment so concurrent uploads by the same
//! user never lose points.
//!
//! Point values:
//! - Open Source: 40
//! - Competitive Programming (CP): 30
//! - Achievements: 20
//! - Projects: 10
//! - any other label: 0 (accepted, awards nothing)

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{Category, LedgerEntry, LEADERBOARD};
use crate::store::{Document, DocumentStore, StoreError};

#[derive(Debug, Error)]
#[error("failed to update points for {user_id}: {source}")]
pub struct LedgerError {
    pub user_id: String,
    #[source]
    pub source: StoreError,
}

/// Points awarded per verified contribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointTable {
    pub open_source: i64,
    pub competitive_programming: i64,
    pub achievements: i64,
    pub projects: i64,
}

impl Default for PointTable {
    fn default() -> Self {
        Self {
            open_source: 40,
            competitive_programming: 30,
            achievements: 20,
            projects: 10,
        }
    }
}

impl PointTable {
    pub fn points_for(&self, category: Category) -> i64 {
        match category {
            Category::OpenSource => self.open_source,
            Category::CompetitiveProgramming => self.competitive_programming,
            Category::Achievements => self.achievements,
            Category::Projects => self.projects,
        }
    }

    /// Award for a raw category label; unknown labels are worth 0
    pub fn points_for_label(&self, label: &str) -> i64 {
        Category::from_label(label)
            .map(|c| self.points_for(c))
            .unwrap_or(0)
    }
}

pub struct PointsLedger {
    store: Arc<dyn DocumentStore>,
    table: PointTable,
}

impl PointsLedger {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_table(store, PointTable::default())
    }

    pub fn with_table(store: Arc<dyn DocumentStore>, table: PointTable) -> Self {
        Self { store, table }
    }

    pub fn table(&self) -> &PointTable {
        &self.table
    }

    /// Credit a user for one contribution in `category` and return the new
    /// total. The entry is created on the first award.
    pub async fn award(&self, user_id: &str, category: &str) -> Result<i64, LedgerError> {
        let points = self.table.points_for_label(category);
        if points == 0 {
            debug!("Category {:?} awards no points", category);
        }

        let mut fields = Document::new();
        fields.insert("userId".into(), json!(user_id));
        fields.insert("lastUpdated".into(), json!(Utc::now().to_rfc3339()));

        let total = self
            .store
            .increment(LEADERBOARD, user_id, "points", points, fields)
            .await
            .map_err(|source| LedgerError {
                user_id: user_id.to_string(),
                source,
            })?;

        info!(
            "Awarded {} points to {} for {} (total: {})",
            points, user_id, category, total
        );
        Ok(total)
    }

    /// Current total for a user, 0 when they have no entry yet
    pub async fn points_for(&self, user_id: &str) -> Result<i64, StoreError> {
        Ok(self
            .store
            .get(LEADERBOARD, user_id)
            .await?
            .map(|doc| LedgerEntry::from_document(&doc).points)
            .unwrap_or(0))
    }
}
