use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::evaluation::{
    Evaluation, EvaluationReport, EvaluationScores, EvaluationStatus, StorageKind,
};

const EVALUATION_COLUMNS: &str = r#"
    id, user_id, image_path, image_storage_type,
    overall_score, composition_score, technical_quality_score,
    artistic_merit_score, lighting_score, subject_matter_score,
    post_processing_score, text_summary, evaluation_status,
    created_at, updated_at
"#;

/// Insert a new pending evaluation
pub async fn create_evaluation(
    pool: &PgPool,
    user_id: Uuid,
    image_path: &str,
    storage: StorageKind,
) -> Result<Evaluation, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO evaluations (user_id, image_path, image_storage_type, evaluation_status)
        VALUES ($1, $2, $3, 'pending')
        RETURNING {EVALUATION_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(image_path)
    .bind(storage.to_string())
    .fetch_one(pool)
    .await?;

    evaluation_from_row(&row)
}

/// Get an evaluation by ID
pub async fn get_evaluation(pool: &PgPool, id: Uuid) -> Result<Option<Evaluation>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {EVALUATION_COLUMNS} FROM evaluations WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(evaluation_from_row).transpose()
}

/// Update evaluation status
pub async fn update_evaluation_status(
    pool: &PgPool,
    id: Uuid,
    status: EvaluationStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE evaluations
        SET evaluation_status = $1, updated_at = NOW()
        WHERE id = $2
        "#,
    )
    .bind(status.to_string())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Write scores and summary and mark the evaluation completed, in one statement
pub async fn update_evaluation_result(
    pool: &PgPool,
    id: Uuid,
    report: &EvaluationReport,
) -> Result<(), sqlx::Error> {
    let scores = &report.scores;
    sqlx::query(
        r#"
        UPDATE evaluations
        SET overall_score = $1,
            composition_score = $2,
            technical_quality_score = $3,
            artistic_merit_score = $4,
            lighting_score = $5,
            subject_matter_score = $6,
            post_processing_score = $7,
            text_summary = $8,
            evaluation_status = 'completed',
            updated_at = NOW()
        WHERE id = $9
        "#,
    )
    .bind(scores.overall)
    .bind(scores.composition)
    .bind(scores.technical_quality)
    .bind(scores.artistic_merit)
    .bind(scores.lighting)
    .bind(scores.subject_matter)
    .bind(scores.post_processing)
    .bind(&report.summary)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

fn evaluation_from_row(row: &PgRow) -> Result<Evaluation, sqlx::Error> {
    let status: String = row.try_get("evaluation_status")?;
    let storage: String = row.try_get("image_storage_type")?;

    Ok(Evaluation {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        image_path: row.try_get("image_path")?,
        image_storage_type: storage
            .parse()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        scores: scores_from_row(row)?,
        text_summary: row.try_get("text_summary")?,
        status: status.parse().map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Scores only exist as a complete set.
fn scores_from_row(row: &PgRow) -> Result<Option<EvaluationScores>, sqlx::Error> {
    let overall: Option<f64> = row.try_get("overall_score")?;
    let Some(overall) = overall else {
        return Ok(None);
    };

    let score = |column: &str| -> Result<f64, sqlx::Error> {
        let value: Option<f64> = row.try_get(column)?;
        Ok(value.unwrap_or(overall))
    };

    Ok(Some(EvaluationScores {
        overall,
        composition: score("composition_score")?,
        technical_quality: score("technical_quality_score")?,
        artistic_merit: score("artistic_merit_score")?,
        lighting: score("lighting_score")?,
        subject_matter: score("subject_matter_score")?,
        post_processing: score("post_processing_score")?,
    }))
}
