//! Score extraction from free-form critique text.
//!
//! Each category owns an ordered list of patterns, stricter label-anchored
//! forms first. The first pattern whose captured number lies in [1, 10]
//! decides the category; a category with no acceptable match keeps
//! [`DEFAULT_CATEGORY_SCORE`]. The overall score is never read from the text.
//! It is always the rounded mean of the six categories.

use regex::Regex;
use std::sync::LazyLock;
use strum::Display;

use crate::models::evaluation::EvaluationScores;

/// Neutral, slightly above average. A missed extraction should neither sink
/// nor inflate the result.
pub const DEFAULT_CATEGORY_SCORE: f64 = 7.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
enum Category {
    Composition,
    TechnicalQuality,
    ArtisticMerit,
    Lighting,
    SubjectMatter,
    PostProcessing,
}

/// Label, colon, number, score marker (`分`, `/10`, `points`).
const NUMBER: &str = r"(\d+(?:\.\d+)?)";

fn strict_cn(label: &str) -> String {
    format!(r"\*{{0,2}}{label}\*{{0,2}}[：:]\s*{NUMBER}\s*分")
}

fn strict_en(label: &str) -> String {
    format!(r"(?i)\*{{0,2}}\b{label}\*{{0,2}}\s*[：:]\*{{0,2}}\s*{NUMBER}\s*(?:/\s*10|分|points?\b)")
}

/// Label, then a short stretch on the same line, then `N/10`.
fn loose_en(label: &str) -> String {
    format!(r"(?i)\b{label}\b[^\n\d]{{0,30}}?{NUMBER}\s*/\s*10")
}

static PATTERNS: LazyLock<Vec<(Category, Vec<Regex>)>> = LazyLock::new(|| {
    let table: [(Category, &[&str], &str); 6] = [
        (Category::Composition, &["构图"], "composition"),
        (Category::TechnicalQuality, &["技术质量"], r"technical(?:\s+quality)?"),
        (Category::ArtisticMerit, &["艺术价值"], r"artistic\s+(?:merit|value)"),
        (Category::Lighting, &["光线"], "lighting"),
        (Category::SubjectMatter, &["主体"], r"subject(?:\s+matter)?"),
        (Category::PostProcessing, &["后期处理", "后期"], r"post[-\s]?processing"),
    ];

    table
        .into_iter()
        .map(|(category, cn_labels, en_label)| {
            let sources = cn_labels
                .iter()
                .map(|label| strict_cn(label))
                .chain([strict_en(en_label), loose_en(en_label)]);
            let patterns = sources
                .map(|source| Regex::new(&source).expect("score patterns are valid regexes"))
                .collect();
            (category, patterns)
        })
        .collect()
});

/// Extract the six category scores and derive the overall score.
pub fn extract_scores(analysis: &str) -> EvaluationScores {
    tracing::debug!(analysis_len = analysis.len(), "Extracting scores from analysis");

    let mut values = [DEFAULT_CATEGORY_SCORE; 6];
    for (slot, (category, patterns)) in values.iter_mut().zip(PATTERNS.iter()) {
        match patterns.iter().find_map(|pattern| capture_score(pattern, analysis)) {
            Some(score) => {
                tracing::debug!(category = %category, score, "Score extracted");
                *slot = score;
            }
            None => {
                tracing::debug!(category = %category, "No score found, using default");
            }
        }
    }

    let [composition, technical_quality, artistic_merit, lighting, subject_matter, post_processing] =
        values;
    let scores = EvaluationScores {
        overall: overall_score(&values),
        composition,
        technical_quality,
        artistic_merit,
        lighting,
        subject_matter,
        post_processing,
    };

    tracing::info!(overall = scores.overall, "Extracted scores from analysis");
    scores
}

/// Mean of the six category scores, rounded to one decimal.
pub fn overall_score(categories: &[f64; 6]) -> f64 {
    round_one_decimal(categories.iter().sum::<f64>() / categories.len() as f64)
}

/// Clamp every field to [1, 10] and round to one decimal.
pub fn normalize_scores(scores: &EvaluationScores) -> EvaluationScores {
    EvaluationScores {
        overall: normalize(scores.overall),
        composition: normalize(scores.composition),
        technical_quality: normalize(scores.technical_quality),
        artistic_merit: normalize(scores.artistic_merit),
        lighting: normalize(scores.lighting),
        subject_matter: normalize(scores.subject_matter),
        post_processing: normalize(scores.post_processing),
    }
}

fn normalize(score: f64) -> f64 {
    // NaN falls to the minimum.
    round_one_decimal(score)
        .max(EvaluationScores::MIN)
        .min(EvaluationScores::MAX)
}

fn capture_score(pattern: &Regex, text: &str) -> Option<f64> {
    let captured = pattern.captures(text)?.get(1)?;
    let score: f64 = captured.as_str().parse().ok()?;
    (EvaluationScores::MIN..=EvaluationScores::MAX)
        .contains(&score)
        .then(|| round_one_decimal(score))
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
