//! Contribution upload and verification
//!
//! An upload moves through four stages and never goes back:
//!
//! 1. Collecting - image, category, language and description must all be
//!    present. Missing fields end the upload before any network call.
//! 2. Verifying - the image is base64-encoded and judged by the classifier.
//!    Transport failures and unusable answers end the upload; nothing is
//!    written.
//! 3. Persisting - a "1" or "0" answer is recorded as a contribution with
//!    `verified` set accordingly.
//! 4. Awarding - only verified contributions earn points.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use crate::classifier::{encode_image, Classifier, ClassifierError, VerificationRequest, Verdict};
use crate::ledger::{LedgerError, PointsLedger};
use crate::models::{ContributionRecord, CONTRIBUTIONS};
use crate::store::{DocumentStore, StoreError};

pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// Where the client keeps the image, if it has a shareable reference
    pub uri: Option<String>,
}

impl ImageUpload {
    /// Reference stored on the contribution record
    fn reference(&self) -> String {
        match self.uri.as_deref().map(str::trim) {
            Some(uri) if !uri.is_empty() => uri.to_string(),
            _ => format!("sha256:{}", hex::encode(Sha256::digest(&self.bytes))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadSubmission {
    pub image: Option<ImageUpload>,
    pub category: String,
    pub language: String,
    pub description: String,
}

impl UploadSubmission {
    /// Names of the required fields that are missing or blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.image.as_ref().map_or(true, |i| i.bytes.is_empty()) {
            missing.push("image");
        }
        if self.category.trim().is_empty() {
            missing.push("category");
        }
        if self.language.trim().is_empty() {
            missing.push("language");
        }
        if self.description.trim().is_empty() {
            missing.push("description");
        }
        missing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStage {
    Collecting,
    Verifying,
    Persisting,
    Awarding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceFailure {
    /// The classifier could not be reached or returned an error status
    Unavailable,
    /// The classifier answered with something other than "1" or "0"
    UnexpectedResponse,
}

/// Terminal state of an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    Completed {
        record_id: String,
        points_awarded: i64,
        total_points: i64,
    },
    CompletedUnverified {
        record_id: String,
    },
    RejectedValidation {
        missing: Vec<&'static str>,
    },
    RejectedService {
        reason: ServiceFailure,
    },
}

impl UploadOutcome {
    /// Message shown to the uploader
    pub fn message(&self) -> String {
        match self {
            UploadOutcome::Completed { points_awarded, .. } => {
                format!("Upload successful! You earned {} points.", points_awarded)
            }
            UploadOutcome::CompletedUnverified { .. } => {
                "Your submission has been recorded but didn't earn points as verification failed."
                    .to_string()
            }
            UploadOutcome::RejectedValidation { .. } => {
                "Please fill all fields and select an image".to_string()
            }
            UploadOutcome::RejectedService {
                reason: ServiceFailure::Unavailable,
            } => "Verification service unavailable. Please try again later.".to_string(),
            UploadOutcome::RejectedService {
                reason: ServiceFailure::UnexpectedResponse,
            } => "Could not verify your submission. Please try again.".to_string(),
        }
    }

    pub fn stage(&self) -> UploadStage {
        match self {
            UploadOutcome::Completed { .. } => UploadStage::Awarding,
            UploadOutcome::CompletedUnverified { .. } => UploadStage::Persisting,
            UploadOutcome::RejectedValidation { .. } => UploadStage::Collecting,
            UploadOutcome::RejectedService { .. } => UploadStage::Verifying,
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to record contribution: {0}")]
    Persist(#[source] StoreError),
    /// The record exists but the points were not credited
    #[error("contribution {record_id} was recorded but points were not awarded: {source}")]
    LedgerUpdate {
        record_id: String,
        #[source]
        source: LedgerError,
    },
}

pub struct UploadWorkflow {
    store: Arc<dyn DocumentStore>,
    classifier: Arc<dyn Classifier>,
    ledger: Arc<PointsLedger>,
}

impl UploadWorkflow {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        classifier: Arc<dyn Classifier>,
        ledger: Arc<PointsLedger>,
    ) -> Self {
        Self {
            store,
            classifier,
            ledger,
        }
    }

    pub async fn run(
        &self,
        user_id: &str,
        submission: UploadSubmission,
    ) -> Result<UploadOutcome, UploadError> {
        // Collecting
        let missing = submission.missing_fields();
        let image = match submission.image {
            Some(image) if missing.is_empty() => image,
            _ => {
                info!("Upload from {} rejected, missing {:?}", user_id, missing);
                return Ok(UploadOutcome::RejectedValidation { missing });
            }
        };

        // Verifying
        let image_base64 = encode_image(&image.bytes);
        let request = VerificationRequest {
            description: &submission.description,
            category: &submission.category,
            language: &submission.language,
            image_base64: &image_base64,
            mime_type: &image.mime_type,
        };

        let verified = match self.classifier.classify(&request).await {
            Ok(Verdict::Supported) => true,
            Ok(Verdict::NotSupported) => false,
            Err(e) => {
                warn!("Verification for {} failed: {}", user_id, e);
                let reason = match e {
                    ClassifierError::Unavailable(_) => ServiceFailure::Unavailable,
                    ClassifierError::UnexpectedResponse(_) => ServiceFailure::UnexpectedResponse,
                };
                return Ok(UploadOutcome::RejectedService { reason });
            }
        };

        // Persisting
        let record = ContributionRecord {
            id: String::new(),
            user_id: user_id.to_string(),
            category: submission.category.trim().to_string(),
            language: submission.language.trim().to_string(),
            description: submission.description.trim().to_string(),
            image_url: image.reference(),
            verified,
            timestamp: Utc::now(),
        };

        let record_id = self
            .store
            .add(CONTRIBUTIONS, record.to_document())
            .await
            .map_err(UploadError::Persist)?;

        info!(
            "Recorded {} contribution {} for {} (verified: {})",
            record.category, record_id, user_id, verified
        );

        if !verified {
            return Ok(UploadOutcome::CompletedUnverified { record_id });
        }

        // Awarding
        let points_awarded = self.ledger.table().points_for_label(&record.category);
        let total_points = match self.ledger.award(user_id, &record.category).await {
            Ok(total) => total,
            Err(source) => return Err(UploadError::LedgerUpdate { record_id, source }),
        };

        Ok(UploadOutcome::Completed {
            record_id,
            points_awarded,
            total_points,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LEADERBOARD;
    use crate::store::{Document, Filter, MemoryStore, StoredDocument};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Classifier with a canned answer that remembers what it was asked
    struct FakeClassifier {
        answer: fn() -> Result<Verdict, ClassifierError>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl FakeClassifier {
        fn new(answer: fn() -> Result<Verdict, ClassifierError>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl Classifier for FakeClassifier {
        async fn classify(
            &self,
            request: &VerificationRequest<'_>,
        ) -> Result<Verdict, ClassifierError> {
            self.calls.lock().push((
                request.image_base64.to_string(),
                request.mime_type.to_string(),
            ));
            (self.answer)()
        }
    }

    /// Store whose ledger increments always fail
    struct BrokenLedgerStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl DocumentStore for BrokenLedgerStore {
        async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
            self.inner.get(collection, id).await
        }

        async fn put(
            &self,
            collection: &str,
            id: &str,
            fields: Document,
            merge: bool,
        ) -> Result<(), StoreError> {
            self.inner.put(collection, id, fields, merge).await
        }

        async fn add(&self, collection: &str, fields: Document) -> Result<String, StoreError> {
            self.inner.add(collection, fields).await
        }

        async fn query(
            &self,
            collection: &str,
            filters: &[Filter],
        ) -> Result<Vec<StoredDocument>, StoreError> {
            self.inner.query(collection, filters).await
        }

        async fn increment(
            &self,
            _collection: &str,
            _id: &str,
            _field: &str,
            _delta: i64,
            _fields: Document,
        ) -> Result<i64, StoreError> {
            Err(StoreError::Unavailable("write timeout".into()))
        }
    }

    fn supported() -> Result<Verdict, ClassifierError> {
        Ok(Verdict::Supported)
    }

    fn not_supported() -> Result<Verdict, ClassifierError> {
        Ok(Verdict::NotSupported)
    }

    fn garbled() -> Result<Verdict, ClassifierError> {
        Err(ClassifierError::UnexpectedResponse("answer \"maybe\"".into()))
    }

    fn offline() -> Result<Verdict, ClassifierError> {
        Err(ClassifierError::Unavailable("connection refused".into()))
    }

    fn submission(category: &str) -> UploadSubmission {
        UploadSubmission {
            image: Some(ImageUpload {
                bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
                mime_type: DEFAULT_MIME_TYPE.to_string(),
                uri: Some("file:///photos/proof.jpg".to_string()),
            }),
            category: category.to_string(),
            language: "Rust".to_string(),
            description: "Solved the weekly contest".to_string(),
        }
    }

    fn workflow(
        store: Arc<MemoryStore>,
        classifier: Arc<FakeClassifier>,
    ) -> (UploadWorkflow, Arc<PointsLedger>) {
        let ledger = Arc::new(PointsLedger::new(store.clone()));
        (
            UploadWorkflow::new(store, classifier, ledger.clone()),
            ledger,
        )
    }

    async fn seed_points(store: &MemoryStore, user_id: &str, points: i64) {
        store
            .put(
                LEADERBOARD,
                user_id,
                json!({ "userId": user_id, "points": points })
                    .as_object()
                    .cloned()
                    .unwrap(),
                false,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_verified_cp_upload_awards_points() {
        let store = Arc::new(MemoryStore::new());
        seed_points(&store, "u1", 70).await;
        let classifier = FakeClassifier::new(supported);
        let (workflow, ledger) = workflow(store.clone(), classifier.clone());

        let outcome = workflow.run("u1", submission("CP")).await.unwrap();
        let UploadOutcome::Completed {
            record_id,
            points_awarded,
            total_points,
        } = &outcome
        else {
            panic!("unexpected outcome {:?}", outcome);
        };
        assert_eq!(*points_awarded, 30);
        assert_eq!(*total_points, 100);
        assert_eq!(ledger.points_for("u1").await.unwrap(), 100);
        assert_eq!(outcome.message(), "Upload successful! You earned 30 points.");

        let doc = store.get(CONTRIBUTIONS, record_id).await.unwrap().unwrap();
        let record = ContributionRecord::from_document(record_id, &doc);
        assert!(record.verified);
        assert_eq!(record.user_id, "u1");
        assert_eq!(record.image_url, "file:///photos/proof.jpg");

        let calls = classifier.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], ("/9j/4A==".to_string(), "image/jpeg".to_string()));
    }

    #[tokio::test]
    async fn test_each_category_awards_its_value() {
        for (category, value) in [("Open Source", 40), ("CP", 30), ("Achievements", 20), ("Projects", 10)] {
            let store = Arc::new(MemoryStore::new());
            let (workflow, ledger) = workflow(store, FakeClassifier::new(supported));

            workflow.run("u1", submission(category)).await.unwrap();
            assert_eq!(ledger.points_for("u1").await.unwrap(), value);
        }
    }

    #[tokio::test]
    async fn test_rejected_upload_is_recorded_without_points() {
        let store = Arc::new(MemoryStore::new());
        seed_points(&store, "u1", 70).await;
        let (workflow, ledger) = workflow(store.clone(), FakeClassifier::new(not_supported));

        let outcome = workflow.run("u1", submission("CP")).await.unwrap();
        let UploadOutcome::CompletedUnverified { record_id } = &outcome else {
            panic!("unexpected outcome {:?}", outcome);
        };

        let doc = store.get(CONTRIBUTIONS, record_id).await.unwrap().unwrap();
        assert_eq!(doc["verified"], json!(false));
        assert_eq!(doc["aiAnalysis"], json!(0));
        assert_eq!(ledger.points_for("u1").await.unwrap(), 70);
        assert_eq!(outcome.stage(), UploadStage::Persisting);
    }

    #[tokio::test]
    async fn test_unusable_answer_writes_nothing() {
        for (answer, reason) in [
            (garbled as fn() -> _, ServiceFailure::UnexpectedResponse),
            (offline as fn() -> _, ServiceFailure::Unavailable),
        ] {
            let store = Arc::new(MemoryStore::new());
            seed_points(&store, "u1", 70).await;
            let (workflow, ledger) = workflow(store.clone(), FakeClassifier::new(answer));

            let outcome = workflow.run("u1", submission("CP")).await.unwrap();
            assert_eq!(outcome, UploadOutcome::RejectedService { reason });
            assert_eq!(store.count(CONTRIBUTIONS), 0);
            assert_eq!(ledger.points_for("u1").await.unwrap(), 70);
        }
    }

    #[tokio::test]
    async fn test_service_messages_differ() {
        let unavailable = UploadOutcome::RejectedService {
            reason: ServiceFailure::Unavailable,
        };
        let unexpected = UploadOutcome::RejectedService {
            reason: ServiceFailure::UnexpectedResponse,
        };
        assert!(unavailable.message().contains("unavailable"));
        assert_ne!(unavailable.message(), unexpected.message());
    }

    #[tokio::test]
    async fn test_missing_fields_skip_the_classifier() {
        let cases: Vec<(UploadSubmission, &str)> = vec![
            (
                UploadSubmission {
                    image: None,
                    ..submission("CP")
                },
                "image",
            ),
            (
                UploadSubmission {
                    image: Some(ImageUpload {
                        bytes: vec![],
                        mime_type: DEFAULT_MIME_TYPE.to_string(),
                        uri: None,
                    }),
                    ..submission("CP")
                },
                "image",
            ),
            (submission(""), "category"),
            (
                UploadSubmission {
                    language: "  ".to_string(),
                    ..submission("CP")
                },
                "language",
            ),
            (
                UploadSubmission {
                    description: String::new(),
                    ..submission("CP")
                },
                "description",
            ),
        ];

        for (submission, field) in cases {
            let store = Arc::new(MemoryStore::new());
            let classifier = FakeClassifier::new(supported);
            let (workflow, _) = workflow(store.clone(), classifier.clone());

            let outcome = workflow.run("u1", submission).await.unwrap();
            assert_eq!(
                outcome,
                UploadOutcome::RejectedValidation {
                    missing: vec![field]
                }
            );
            assert_eq!(classifier.call_count(), 0);
            assert_eq!(store.count(CONTRIBUTIONS), 0);
        }
    }

    #[tokio::test]
    async fn test_unknown_category_is_verified_but_awards_nothing() {
        let store = Arc::new(MemoryStore::new());
        let (workflow, ledger) = workflow(store.clone(), FakeClassifier::new(supported));

        let outcome = workflow.run("u1", submission("Hackathons")).await.unwrap();
        assert!(matches!(
            outcome,
            UploadOutcome::Completed {
                points_awarded: 0,
                total_points: 0,
                ..
            }
        ));
        assert_eq!(ledger.points_for("u1").await.unwrap(), 0);
        assert_eq!(store.count(CONTRIBUTIONS), 1);
    }

    #[tokio::test]
    async fn test_ledger_failure_reports_persisted_record() {
        let store = Arc::new(BrokenLedgerStore {
            inner: MemoryStore::new(),
        });
        let ledger = Arc::new(PointsLedger::new(store.clone()));
        let workflow = UploadWorkflow::new(store.clone(), FakeClassifier::new(supported), ledger);

        let record_id = match workflow.run("u1", submission("CP")).await {
            Err(UploadError::LedgerUpdate { record_id, .. }) => record_id,
            other => panic!("unexpected result {:?}", other),
        };

        let doc = store.inner.get(CONTRIBUTIONS, &record_id).await.unwrap().unwrap();
        assert_eq!(doc["verified"], json!(true));
    }

    #[test]
    fn test_image_reference_falls_back_to_digest() {
        let image = ImageUpload {
            bytes: b"abc".to_vec(),
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            uri: None,
        };
        assert_eq!(
            image.reference(),
            "sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );

        let image = ImageUpload {
            uri: Some(" ".to_string()),
            ..image
        };
        assert!(image.reference().starts_with("sha256:"));
    }
}
