//! nograd - points and rankings for student achievements
//!
//! Students upload evidence of a contribution (an open-source patch, a
//! contest result, a project, an award). The image is checked against its
//! description by a generative-AI classifier; verified contributions earn
//! category points that feed a shared leaderboard.
//!
//! # How it works
//!
//! 1. Users sign up with email and password through the identity provider
//! 2. An upload is validated, classified, recorded, then rewarded
//! 3. Points accumulate per user with an atomic increment
//! 4. The leaderboard ranks every user by points, highest first
//!
//! # Point values
//!
//! - Open Source: 40
//! - CP (competitive programming): 30
//! - Achievements: 20
//! - Projects: 10

pub mod accounts;
pub mod classifier;
pub mod config;
pub mod identity;
pub mod leaderboard;
pub mod ledger;
pub mod models;
pub mod news;
pub mod profile;
pub mod server;
pub mod store;
pub mod upload;

pub use accounts::{AccountError, Accounts, SignInRequest, SignUpRequest};
pub use classifier::{Classifier, GeminiClassifier, Verdict};
pub use config::Config;
pub use identity::{IdentityProvider, IdentityToolkit, MemoryIdentity, Session};
pub use leaderboard::{Leaderboard, RankedEntry};
pub use ledger::{PointTable, PointsLedger};
pub use models::{Category, ContributionRecord, LedgerEntry, NewsArticle, User};
pub use news::{NewsApiClient, NewsFeed};
pub use profile::{Badge, Dashboard, Profile, ProfileService};
pub use store::{DocumentStore, MemoryStore, PgDocumentStore};
pub use upload::{UploadOutcome, UploadSubmission, UploadWorkflow};
