//! Global leaderboard
//!
//! Ranking is recomputed on every read: all ledger entries are fetched,
//! stably sorted by points (ties keep fetch order), then each entry's
//! display name is looked up in `users`. A failed name lookup only affects
//! its own row.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::{LedgerEntry, User, ANONYMOUS, LEADERBOARD, USERS};
use crate::store::{DocumentStore, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    /// 1-based position after sorting
    pub rank: u32,
    pub user_id: Option<String>,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub points: i64,
}

pub struct Leaderboard {
    store: Arc<dyn DocumentStore>,
}

impl Leaderboard {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Build the full ranking, optionally truncated to `limit` rows
    pub async fn build_ranking(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<RankedEntry>, StoreError> {
        let docs = self.store.list(LEADERBOARD).await?;

        let mut entries: Vec<LedgerEntry> = docs
            .iter()
            .map(|d| LedgerEntry::from_document(&d.fields))
            .collect();
        sort_by_points(&mut entries);

        if let Some(limit) = limit {
            entries.truncate(limit);
        }

        let profiles = join_all(
            entries
                .iter()
                .map(|entry| self.resolve_profile(entry.user_id.as_deref())),
        )
        .await;

        let ranking: Vec<RankedEntry> = entries
            .into_iter()
            .zip(profiles)
            .enumerate()
            .map(|(i, (entry, (display_name, avatar_url)))| RankedEntry {
                rank: (i + 1) as u32,
                user_id: entry.user_id,
                display_name,
                avatar_url,
                points: entry.points,
            })
            .collect();

        info!("Built leaderboard with {} entries", ranking.len());
        Ok(ranking)
    }

    /// Display name and avatar for one entry; never fails
    async fn resolve_profile(&self, user_id: Option<&str>) -> (String, Option<String>) {
        let Some(user_id) = user_id else {
            return (ANONYMOUS.to_string(), None);
        };

        match self.store.get(USERS, user_id).await {
            Ok(Some(doc)) => {
                let user = User::from_document(user_id, &doc);
                let name = if user.name.is_empty() {
                    ANONYMOUS.to_string()
                } else {
                    user.name
                };
                (name, user.avatar_url)
            }
            Ok(None) => (ANONYMOUS.to_string(), None),
            Err(e) => {
                warn!("Failed to fetch user name for {}: {}", user_id, e);
                (ANONYMOUS.to_string(), None)
            }
        }
    }
}

/// Descending by points. `sort_by` is stable, so equal totals keep their
/// fetch order.
pub fn sort_by_points(entries: &mut [LedgerEntry]) {
    entries.sort_by(|a, b| b.points.cmp(&a.points));
}
