//! Per-user views: profile card, home dashboard and category progress

use std::sync::Arc;

use chrono::{Local, Timelike};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ledger::PointsLedger;
use crate::models::{ContributionRecord, User, CONTRIBUTIONS, USERS};
use crate::store::{DocumentStore, Filter, StoreError};

/// Rank badge earned from total points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Badge {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
    Legend,
}

impl Badge {
    pub fn for_points(points: i64) -> Self {
        match points {
            p if p >= 500 => Badge::Legend,
            p if p >= 300 => Badge::Diamond,
            p if p >= 200 => Badge::Platinum,
            p if p >= 100 => Badge::Gold,
            p if p >= 50 => Badge::Silver,
            _ => Badge::Bronze,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Badge::Bronze => "BRONZE",
            Badge::Silver => "SILVER",
            Badge::Gold => "GOLD",
            Badge::Platinum => "PLATINUM",
            Badge::Diamond => "DIAMOND",
            Badge::Legend => "LEGEND",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub avatar_url: Option<String>,
    pub bio: String,
    pub college: String,
    pub points: i64,
    pub badge: Badge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub greeting: String,
    pub title: String,
    pub points: i64,
    pub avatar_url: Option<String>,
}

/// Greeting for a local hour of day (0-23)
pub fn greeting(hour: u32) -> &'static str {
    if hour < 12 {
        "Good morning"
    } else if hour < 18 {
        "Good afternoon"
    } else {
        "Good evening"
    }
}

/// "Ada's Dashboard", or "James' Dashboard" for names ending in s
pub fn dashboard_title(name: &str) -> String {
    let name = if name.trim().is_empty() { "User" } else { name.trim() };
    let suffix = if name.ends_with('s') { "'" } else { "'s" };
    format!("{}{} Dashboard", name, suffix)
}

pub struct ProfileService {
    store: Arc<dyn DocumentStore>,
    ledger: Arc<PointsLedger>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn DocumentStore>, ledger: Arc<PointsLedger>) -> Self {
        Self { store, ledger }
    }

    async fn user(&self, user_id: &str) -> Result<User, StoreError> {
        Ok(self
            .store
            .get(USERS, user_id)
            .await?
            .map(|doc| User::from_document(user_id, &doc))
            .unwrap_or_else(|| User {
                id: user_id.to_string(),
                ..User::default()
            }))
    }

    pub async fn profile(&self, user_id: &str) -> Result<Profile, StoreError> {
        let user = self.user(user_id).await?;
        let points = self.ledger.points_for(user_id).await?;

        Ok(Profile {
            name: user.name,
            avatar_url: user.avatar_url,
            bio: user.bio,
            college: user.college,
            points,
            badge: Badge::for_points(points),
        })
    }

    pub async fn dashboard(&self, user_id: &str) -> Result<Dashboard, StoreError> {
        self.dashboard_at(user_id, Local::now().hour()).await
    }

    async fn dashboard_at(&self, user_id: &str, hour: u32) -> Result<Dashboard, StoreError> {
        let user = self.user(user_id).await?;
        let points = self.ledger.points_for(user_id).await?;

        Ok(Dashboard {
            greeting: greeting(hour).to_string(),
            title: dashboard_title(&user.name),
            points,
            avatar_url: user.avatar_url,
        })
    }

    /// The user's contributions in one category, in upload order
    pub async fn contributions(
        &self,
        user_id: &str,
        category: &str,
    ) -> Result<Vec<ContributionRecord>, StoreError> {
        let docs = self
            .store
            .query(
                CONTRIBUTIONS,
                &[Filter::eq("userId", user_id), Filter::eq("category", category)],
            )
            .await?;

        debug!(
            "Found {} {} contributions for {}",
            docs.len(),
            category,
            user_id
        );

        Ok(docs
            .iter()
            .map(|d| ContributionRecord::from_document(&d.id, &d.fields))
            .collect())
    }
}
