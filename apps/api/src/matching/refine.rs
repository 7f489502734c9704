//! LLM Refinement Stage — optional second-pass adjustment of the heuristic
//! score via one structured model call.
//!
//! The stage never fails the pipeline: malformed or missing fields clamp to
//! neutral, and any client error returns the unmodified heuristic outcome
//! inside an explicit `Fallback` branch so degradation stays visible and
//! testable.

use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cost::CostTracker;
use crate::llm_client::{estimate_tokens, LlmClient, LlmError};
use crate::matching::prompts::{REFINE_PROMPT_TEMPLATE, REFINE_SYSTEM};
use crate::matching::scoring::ScoreOutcome;
use crate::models::job::JobRow;
use crate::models::preference::UserPreferencesRow;

const REFINE_TEMPERATURE: f32 = 0.0;
const REFINE_MAX_TOKENS: u32 = 1024;
const NEUTRAL_DIMENSION: f64 = 50.0;

/// Result of the refinement stage. Fallback carries the untouched heuristic
/// outcome plus the reason refinement was skipped or failed.
#[derive(Debug, Clone)]
pub enum Refinement {
    Refined(ScoreOutcome),
    Fallback { outcome: ScoreOutcome, reason: String },
}

impl Refinement {
    pub fn into_outcome(self) -> ScoreOutcome {
        match self {
            Refinement::Refined(outcome) => outcome,
            Refinement::Fallback { outcome, .. } => outcome,
        }
    }
}

/// Structured response from the refinement call. Every field is optional —
/// the defensive contract defaults and clamps rather than erroring.
#[derive(Debug, Default, Deserialize)]
pub struct RefineResponse {
    pub title_match: Option<f64>,
    pub skills_overlap: Option<f64>,
    pub location_match: Option<f64>,
    pub salary_match: Option<f64>,
    pub company_size: Option<f64>,
    pub seniority_match: Option<f64>,
    pub overall_score: Option<f64>,
    pub justification: Option<String>,
}

/// `refine(job, user_context, heuristic_score) -> ScoringResult`.
/// When the feature flag is off this is a pass-through. Every model
/// invocation reports its estimated token cost to the external collector.
pub async fn refine_score(
    llm: &LlmClient,
    cost: &dyn CostTracker,
    enabled: bool,
    user_id: Uuid,
    job: &JobRow,
    prefs: &UserPreferencesRow,
    heuristic: ScoreOutcome,
) -> Refinement {
    if !enabled {
        return Refinement::Fallback {
            outcome: heuristic,
            reason: "refinement disabled".to_string(),
        };
    }

    let prompt = build_prompt(job, prefs, heuristic.score);
    cost.track(
        user_id,
        estimate_tokens(&prompt, REFINE_SYSTEM, REFINE_MAX_TOKENS),
        "match_refinement",
    )
    .await;

    let result = llm
        .call_json::<RefineResponse>(&prompt, REFINE_SYSTEM, REFINE_TEMPERATURE, REFINE_MAX_TOKENS)
        .await;

    resolve(result, heuristic)
}

fn build_prompt(job: &JobRow, prefs: &UserPreferencesRow, heuristic_score: i64) -> String {
    let job_json = serde_json::json!({
        "title": job.title,
        "company": job.company,
        "industry": job.industry,
        "location": job.location,
        "salary_min": job.salary_min,
        "salary_max": job.salary_max,
        "employment_type": job.employment_type,
        "remote": job.remote,
        "company_size": job.company_size,
        "description": job.description,
    });
    let preferences_json = serde_json::json!({
        "titles": prefs.titles,
        "locations": prefs.locations,
        "remote_ok": prefs.remote_ok,
        "min_salary": prefs.min_salary,
        "skills": prefs.skills,
        "seniority": prefs.seniority,
        "company_sizes": prefs.company_sizes,
    });

    REFINE_PROMPT_TEMPLATE
        .replace("{job_json}", &job_json.to_string())
        .replace("{preferences_json}", &preferences_json.to_string())
        .replace("{heuristic_score}", &heuristic_score.to_string())
}

/// Pure resolution of a refinement attempt — the testable seam between
/// "model answered" and "use the heuristic".
fn resolve(result: Result<RefineResponse, LlmError>, heuristic: ScoreOutcome) -> Refinement {
    match result {
        Ok(response) => Refinement::Refined(refined_outcome(response, &heuristic)),
        Err(e) => {
            warn!("Refinement call failed, using heuristic score: {e}");
            Refinement::Fallback {
                outcome: heuristic,
                reason: e.to_string(),
            }
        }
    }
}

fn clamp_dimension(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(0.0, 100.0),
        _ => NEUTRAL_DIMENSION,
    }
}

/// Builds the refined outcome: the overall score when present (clamped),
/// otherwise the mean of the six clamped dimensions. The heuristic
/// breakdown is retained — refinement adjusts the score, not the
/// per-category accounting.
fn refined_outcome(response: RefineResponse, heuristic: &ScoreOutcome) -> ScoreOutcome {
    let dimensions = [
        clamp_dimension(response.title_match),
        clamp_dimension(response.skills_overlap),
        clamp_dimension(response.location_match),
        clamp_dimension(response.salary_match),
        clamp_dimension(response.company_size),
        clamp_dimension(response.seniority_match),
    ];

    let score = match response.overall_score {
        Some(v) if v.is_finite() => v.clamp(0.0, 100.0),
        _ => dimensions.iter().sum::<f64>() / dimensions.len() as f64,
    }
    .round() as i64;

    let justification = response
        .justification
        .filter(|j| !j.trim().is_empty())
        .unwrap_or_else(|| "no justification provided".to_string());

    debug!("Refined score {} -> {}", heuristic.score, score);

    ScoreOutcome {
        score: score.clamp(0, 100),
        rationale: format!("{score}% match (refined): {justification}"),
        breakdown: heuristic.breakdown.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::scoring::CategoryScore;

    fn heuristic() -> ScoreOutcome {
        ScoreOutcome {
            score: 72,
            rationale: "72% match: title (20/25)".to_string(),
            breakdown: vec![CategoryScore {
                category: "title".to_string(),
                earned: 20,
                possible: 25,
            }],
        }
    }

    #[test]
    fn test_client_error_falls_back_to_exact_heuristic_output() {
        let refinement = resolve(Err(LlmError::EmptyContent), heuristic());
        match refinement {
            Refinement::Fallback { outcome, reason } => {
                assert_eq!(outcome.score, 72);
                assert_eq!(outcome.rationale, "72% match: title (20/25)");
                assert!(reason.contains("empty content"));
            }
            Refinement::Refined(_) => panic!("expected fallback"),
        }
    }

    #[test]
    fn test_overall_score_is_clamped() {
        let response = RefineResponse {
            overall_score: Some(250.0),
            ..Default::default()
        };
        let outcome = refined_outcome(response, &heuristic());
        assert_eq!(outcome.score, 100);
    }

    #[test]
    fn test_missing_overall_uses_mean_of_dimensions() {
        let response = RefineResponse {
            title_match: Some(80.0),
            skills_overlap: Some(60.0),
            // remaining four dimensions default to neutral 50
            ..Default::default()
        };
        let outcome = refined_outcome(response, &heuristic());
        // (80 + 60 + 50*4) / 6 = 56.67 → 57
        assert_eq!(outcome.score, 57);
    }

    #[test]
    fn test_all_fields_missing_defaults_to_neutral() {
        let outcome = refined_outcome(RefineResponse::default(), &heuristic());
        assert_eq!(outcome.score, 50);
        assert!(outcome.rationale.contains("no justification provided"));
    }

    #[test]
    fn test_non_finite_dimension_defaults_to_neutral() {
        let response = RefineResponse {
            overall_score: Some(f64::NAN),
            ..Default::default()
        };
        let outcome = refined_outcome(response, &heuristic());
        assert_eq!(outcome.score, 50);
    }

    #[test]
    fn test_refined_outcome_keeps_heuristic_breakdown() {
        let response = RefineResponse {
            overall_score: Some(88.0),
            justification: Some("Strong implied fit.".to_string()),
            ..Default::default()
        };
        let outcome = refined_outcome(response, &heuristic());
        assert_eq!(outcome.score, 88);
        assert_eq!(outcome.breakdown.len(), 1);
        assert!(outcome.rationale.starts_with("88% match (refined):"));
    }

    fn sample_job() -> JobRow {
        JobRow {
            id: uuid::Uuid::new_v4(),
            dedup_key: "k".to_string(),
            source: "test".to_string(),
            title: "Rust Engineer".to_string(),
            company: "Acme".to_string(),
            industry: None,
            location: Some("Berlin".to_string()),
            salary_min: None,
            salary_max: None,
            employment_type: None,
            remote: true,
            company_size: None,
            description: None,
            url: None,
            first_seen_at: chrono::Utc::now(),
            last_seen_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_disabled_flag_is_a_passthrough() {
        use crate::cost::{CostTracker, LoggingCostTracker};
        let llm = LlmClient::new("test-key".to_string());
        let tracker: &dyn CostTracker = &LoggingCostTracker;
        let refinement = refine_score(
            &llm,
            tracker,
            false,
            uuid::Uuid::new_v4(),
            &sample_job(),
            &crate::models::preference::UserPreferencesRow::empty(uuid::Uuid::new_v4()),
            heuristic(),
        )
        .await;
        match refinement {
            Refinement::Fallback { outcome, reason } => {
                assert_eq!(outcome.score, 72);
                assert_eq!(reason, "refinement disabled");
            }
            Refinement::Refined(_) => panic!("expected passthrough"),
        }
    }
}
