//! Domain records and their document-store representation
//!
//! Documents are flat JSON maps; field names follow the stored layout
//! (`userId`, `lastUpdated`, `imageUrl`, ...) so records written by older
//! clients stay readable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::store::Document;

/// Collection holding user profiles, keyed by user id
pub const USERS: &str = "users";
/// Collection holding one points entry per user, keyed by user id
pub const LEADERBOARD: &str = "leaderboard";
/// Collection holding contribution records
pub const CONTRIBUTIONS: &str = "data";

/// Display name used when a ranking entry cannot be tied to a user
pub const ANONYMOUS: &str = "Anonymous";

/// Contribution category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    OpenSource,
    #[serde(rename = "CP")]
    CompetitiveProgramming,
    Projects,
    Achievements,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::OpenSource,
        Category::CompetitiveProgramming,
        Category::Projects,
        Category::Achievements,
    ];

    /// Parse a category label. Unknown labels yield `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "Open Source" | "OpenSource" => Some(Category::OpenSource),
            "CP" => Some(Category::CompetitiveProgramming),
            "Projects" => Some(Category::Projects),
            "Achievements" => Some(Category::Achievements),
            _ => None,
        }
    }

    /// Label as stored in contribution records
    pub fn label(&self) -> &'static str {
        match self {
            Category::OpenSource => "Open Source",
            Category::CompetitiveProgramming => "CP",
            Category::Projects => "Projects",
            Category::Achievements => "Achievements",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub bio: String,
    pub college: String,
    pub avatar_url: Option<String>,
}

impl User {
    pub fn from_document(id: &str, doc: &Document) -> Self {
        Self {
            id: id.to_string(),
            name: str_field(doc, "name").unwrap_or_default(),
            email: str_field(doc, "email").unwrap_or_default(),
            bio: str_field(doc, "bio").unwrap_or_default(),
            college: str_field(doc, "college").unwrap_or_default(),
            avatar_url: str_field(doc, "avatar"),
        }
    }

    /// Fields written at sign-up (the id is the document key)
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("name".into(), json!(self.name));
        doc.insert("email".into(), json!(self.email));
        doc.insert("college".into(), json!(self.college));
        doc.insert("bio".into(), json!(self.bio));
        if let Some(avatar) = &self.avatar_url {
            doc.insert("avatar".into(), json!(avatar));
        }
        doc
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// Document key; `None` when the stored entry lacks a `userId` field
    pub user_id: Option<String>,
    pub points: i64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            user_id: str_field(doc, "userId").filter(|id| !id.is_empty()),
            points: int_field(doc, "points").unwrap_or(0).max(0),
            last_updated: time_field(doc, "lastUpdated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionRecord {
    pub id: String,
    pub user_id: String,
    /// Category label as submitted
    pub category: String,
    pub language: String,
    pub description: String,
    pub image_url: String,
    pub verified: bool,
    pub timestamp: DateTime<Utc>,
}

impl ContributionRecord {
    pub fn from_document(id: &str, doc: &Document) -> Self {
        Self {
            id: id.to_string(),
            user_id: str_field(doc, "userId").unwrap_or_default(),
            category: str_field(doc, "category").unwrap_or_default(),
            language: str_field(doc, "language").unwrap_or_default(),
            description: str_field(doc, "description").unwrap_or_default(),
            image_url: str_field(doc, "imageUrl")
                .or_else(|| str_field(doc, "image"))
                .unwrap_or_default(),
            verified: doc.get("verified").and_then(Value::as_bool).unwrap_or(false),
            timestamp: time_field(doc, "timestamp").unwrap_or_default(),
        }
    }

    /// Fields persisted for a new record (the id is assigned by the store)
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("userId".into(), json!(self.user_id));
        doc.insert("category".into(), json!(self.category));
        doc.insert("language".into(), json!(self.language));
        doc.insert("description".into(), json!(self.description));
        doc.insert("imageUrl".into(), json!(self.image_url));
        doc.insert("verified".into(), json!(self.verified));
        doc.insert("aiAnalysis".into(), json!(if self.verified { 1 } else { 0 }));
        doc.insert("timestamp".into(), json!(self.timestamp.to_rfc3339()));
        doc
    }
}

/// Article shown on the home feed; never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub url: Option<String>,
}

pub(crate) fn str_field(doc: &Document, key: &str) -> Option<String> {
    doc.get(key).and_then(Value::as_str).map(str::to_string)
}

pub(crate) fn int_field(doc: &Document, key: &str) -> Option<i64> {
    match doc.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    }
}

fn time_field(doc: &Document, key: &str) -> Option<DateTime<Utc>> {
    doc.get(key)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_labels() {
        assert_eq!(
            Category::from_label("Open Source"),
            Some(Category::OpenSource)
        );
        assert_eq!(Category::from_label("OpenSource"), Some(Category::OpenSource));
        assert_eq!(
            Category::from_label("CP"),
            Some(Category::CompetitiveProgramming)
        );
        assert_eq!(Category::from_label("cp"), None);
        assert_eq!(Category::from_label(""), None);

        for category in Category::ALL {
            assert_eq!(Category::from_label(category.label()), Some(category));
        }
    }

    #[test]
    fn test_ledger_entry_tolerates_missing_fields() {
        let doc = json!({ "points": 70 }).as_object().cloned().unwrap();
        let entry = LedgerEntry::from_document(&doc);
        assert_eq!(entry.user_id, None);
        assert_eq!(entry.points, 70);

        let doc = json!({ "userId": "u1", "points": "lots" })
            .as_object()
            .cloned()
            .unwrap();
        let entry = LedgerEntry::from_document(&doc);
        assert_eq!(entry.user_id.as_deref(), Some("u1"));
        assert_eq!(entry.points, 0);
    }

    #[test]
    fn test_contribution_record_document() {
        let record = ContributionRecord {
            id: String::new(),
            user_id: "u1".to_string(),
            category: "CP".to_string(),
            language: "Rust".to_string(),
            description: "Solved 500 problems".to_string(),
            image_url: "file:///tmp/proof.jpg".to_string(),
            verified: false,
            timestamp: Utc::now(),
        };

        let doc = record.to_document();
        assert_eq!(doc["aiAnalysis"], json!(0));
        assert_eq!(doc["verified"], json!(false));

        let parsed = ContributionRecord::from_document("r1", &doc);
        assert_eq!(parsed.id, "r1");
        assert_eq!(parsed.user_id, "u1");
        assert_eq!(parsed.image_url, record.image_url);
        assert!(!parsed.verified);
    }

    #[test]
    fn test_legacy_image_field() {
        let doc = json!({ "userId": "u1", "image": "file:///old.jpg" })
            .as_object()
            .cloned()
            .unwrap();
        let record = ContributionRecord::from_document("r1", &doc);
        assert_eq!(record.image_url, "file:///old.jpg");
    }
}
