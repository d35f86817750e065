use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Lifecycle status of an evaluation record.
///
/// Moves `pending -> processing -> completed | failed`. A failed record only
/// goes back to `processing` through an explicit re-submission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EvaluationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Backend holding the uploaded image.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StorageKind {
    /// Files under the local upload directory.
    Local,
    /// S3-compatible object storage bucket.
    Cos,
}

/// Per-category scores in [1, 10] with one decimal of precision.
///
/// `overall` is derived from the six categories, never read from AI text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EvaluationScores {
    pub overall: f64,
    pub composition: f64,
    pub technical_quality: f64,
    pub artistic_merit: f64,
    pub lighting: f64,
    pub subject_matter: f64,
    pub post_processing: f64,
}

impl EvaluationScores {
    pub const MIN: f64 = 1.0;
    pub const MAX: f64 = 10.0;

    /// The six category scores, in a fixed order.
    pub fn categories(&self) -> [f64; 6] {
        [
            self.composition,
            self.technical_quality,
            self.artistic_merit,
            self.lighting,
            self.subject_matter,
            self.post_processing,
        ]
    }

    /// True when every field, overall included, lies within [1, 10].
    pub fn is_valid(&self) -> bool {
        std::iter::once(self.overall)
            .chain(self.categories())
            .all(|score| (Self::MIN..=Self::MAX).contains(&score))
    }
}

/// A stored photo evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_path: String,
    pub image_storage_type: StorageKind,
    /// Present once the evaluation has completed.
    pub scores: Option<EvaluationScores>,
    pub text_summary: Option<String>,
    pub status: EvaluationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything written back to the record when an evaluation completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationReport {
    pub scores: EvaluationScores,
    pub summary: String,
}
