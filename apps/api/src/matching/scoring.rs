//! Heuristic Scorer — deterministic preference-fit scoring.
//!
//! Five weighted categories sum to 100: title (25), location (20),
//! salary (20), skills (20), seniority (15). A company-size bonus worth up
//! to 10 raises the working total to 110, normalized back to 0–100 by
//! dividing by 1.1. Deal-breakers run before scoring proper and
//! short-circuit with a rejection that produces no Match.
//!
//! Category matching uses strength tiers: exact/substring 1.0, token
//! overlap 0.6, no match 0.0. A category with no corresponding user
//! preference contributes a neutral half-weight — absence of preference is
//! not a penalty.

use serde::{Deserialize, Serialize};

use crate::matching::dedup::normalize_text;
use crate::models::job::JobRow;
use crate::models::preference::{LearnedPreferenceRow, UserPreferencesRow};

const TITLE_WEIGHT: i64 = 25;
const LOCATION_WEIGHT: i64 = 20;
const SALARY_WEIGHT: i64 = 20;
const SKILLS_WEIGHT: i64 = 20;
const SENIORITY_WEIGHT: i64 = 15;
const COMPANY_SIZE_WEIGHT: i64 = 10;

/// Penalty multiplier for an acknowledged "dismissed" pattern.
const DISMISSED_PENALTY: f64 = 15.0;
/// Boost multiplier for an acknowledged "saved" pattern.
const SAVED_BOOST: f64 = 10.0;

// ────────────────────────────────────────────────────────────────────────────
// Output data models
// ────────────────────────────────────────────────────────────────────────────

/// Earned vs possible points for one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: String,
    pub earned: i64,
    pub possible: i64,
}

/// A scored job: final 0–100 score, deterministic human-readable rationale,
/// and the per-category breakdown retained on the Match row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreOutcome {
    pub score: i64,
    pub rationale: String,
    pub breakdown: Vec<CategoryScore>,
}

/// A hard preference violation that excludes a job before scoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum DealBreaker {
    ExcludedCompany(String),
    ExcludedIndustry(String),
    SalaryBelowMinimum { offered: i64, minimum: i64 },
}

#[derive(Debug, Clone)]
pub enum ScoreDecision {
    Reject(DealBreaker),
    Scored(ScoreOutcome),
}

// ────────────────────────────────────────────────────────────────────────────
// Entry point
// ────────────────────────────────────────────────────────────────────────────

/// `score(user_preferences, job) -> (score, rationale, reject)`.
/// Deal-breakers short-circuit; otherwise category points are summed,
/// normalized, and adjusted by acknowledged learned patterns, clamped to
/// [0, 100].
pub fn evaluate(
    prefs: &UserPreferencesRow,
    learned: &[LearnedPreferenceRow],
    job: &JobRow,
) -> ScoreDecision {
    if let Some(breaker) = check_deal_breakers(prefs, job) {
        return ScoreDecision::Reject(breaker);
    }

    let breakdown = vec![
        CategoryScore {
            category: "title".to_string(),
            earned: score_title(prefs, job),
            possible: TITLE_WEIGHT,
        },
        CategoryScore {
            category: "location".to_string(),
            earned: score_location(prefs, job),
            possible: LOCATION_WEIGHT,
        },
        CategoryScore {
            category: "salary".to_string(),
            earned: score_salary(prefs, job),
            possible: SALARY_WEIGHT,
        },
        CategoryScore {
            category: "skills".to_string(),
            earned: score_skills(prefs, job),
            possible: SKILLS_WEIGHT,
        },
        CategoryScore {
            category: "seniority".to_string(),
            earned: score_seniority(prefs, job),
            possible: SENIORITY_WEIGHT,
        },
        CategoryScore {
            category: "company size".to_string(),
            earned: score_company_size(prefs, job),
            possible: COMPANY_SIZE_WEIGHT,
        },
    ];

    let raw_total: i64 = breakdown.iter().map(|c| c.earned).sum();
    // Working total is out of 110; normalize back to a 0–100 scale.
    // Integer truncation here means a perfect 110 lands on 99 — preserved
    // intentionally, see DESIGN.md.
    let normalized = (raw_total as f64 / 1.1) as i64;

    let adjusted = apply_pattern_adjustments(normalized, learned, job);
    let score = adjusted.clamp(0, 100);

    let rationale = build_rationale(score, &breakdown);

    ScoreDecision::Scored(ScoreOutcome {
        score,
        rationale,
        breakdown,
    })
}

/// Runs before scoring proper. A job with an unknown salary is never
/// rejected on salary grounds — only a known, sub-minimum salary rejects.
pub fn check_deal_breakers(prefs: &UserPreferencesRow, job: &JobRow) -> Option<DealBreaker> {
    let company = normalize_text(&job.company);
    if prefs
        .excluded_companies
        .iter()
        .any(|c| normalize_text(c) == company)
    {
        return Some(DealBreaker::ExcludedCompany(job.company.clone()));
    }

    if let Some(industry) = &job.industry {
        let industry_norm = normalize_text(industry);
        if prefs
            .excluded_industries
            .iter()
            .any(|i| normalize_text(i) == industry_norm)
        {
            return Some(DealBreaker::ExcludedIndustry(industry.clone()));
        }
    }

    if let (Some(offered), Some(minimum)) = (job.known_salary(), prefs.min_salary) {
        if offered < minimum {
            return Some(DealBreaker::SalaryBelowMinimum { offered, minimum });
        }
    }

    None
}

// ────────────────────────────────────────────────────────────────────────────
// Category scorers
// ────────────────────────────────────────────────────────────────────────────

fn neutral(weight: i64) -> i64 {
    weight / 2
}

fn earned(strength: f64, weight: i64) -> i64 {
    (strength * weight as f64).round() as i64
}

/// Strength of a preference phrase against a candidate text:
/// substring either way 1.0, >= half the tokens present 0.6, else 0.0.
fn phrase_strength(pref: &str, text: &str) -> f64 {
    let pref = normalize_text(pref);
    let text = normalize_text(text);
    if pref.is_empty() || text.is_empty() {
        return 0.0;
    }
    if text.contains(&pref) || pref.contains(&text) {
        return 1.0;
    }
    let tokens: Vec<&str> = pref.split(' ').collect();
    let hits = tokens.iter().filter(|t| text.contains(*t)).count();
    if hits * 2 >= tokens.len() {
        0.6
    } else {
        0.0
    }
}

fn score_title(prefs: &UserPreferencesRow, job: &JobRow) -> i64 {
    if prefs.titles.is_empty() {
        return neutral(TITLE_WEIGHT);
    }
    let best = prefs
        .titles
        .iter()
        .map(|t| phrase_strength(t, &job.title))
        .fold(0.0_f64, f64::max);
    earned(best, TITLE_WEIGHT)
}

fn score_location(prefs: &UserPreferencesRow, job: &JobRow) -> i64 {
    if prefs.locations.is_empty() && !prefs.remote_ok {
        return neutral(LOCATION_WEIGHT);
    }
    if job.remote && prefs.remote_ok {
        return LOCATION_WEIGHT;
    }
    let job_location = match &job.location {
        Some(l) => l,
        None => return neutral(LOCATION_WEIGHT),
    };
    let best = prefs
        .locations
        .iter()
        .map(|l| phrase_strength(l, job_location))
        .fold(0.0_f64, f64::max);
    earned(best, LOCATION_WEIGHT)
}

fn score_salary(prefs: &UserPreferencesRow, job: &JobRow) -> i64 {
    let minimum = match prefs.min_salary {
        Some(m) => m,
        None => return neutral(SALARY_WEIGHT),
    };
    match job.known_salary() {
        // Below-minimum salaries are rejected before scoring; this arm is
        // unreachable through evaluate() but kept total.
        Some(offered) if offered >= minimum => SALARY_WEIGHT,
        Some(_) => 0,
        None => neutral(SALARY_WEIGHT),
    }
}

fn score_skills(prefs: &UserPreferencesRow, job: &JobRow) -> i64 {
    if prefs.skills.is_empty() {
        return neutral(SKILLS_WEIGHT);
    }
    let haystack = normalize_text(&format!(
        "{} {}",
        job.title,
        job.description.as_deref().unwrap_or("")
    ));
    let hits = prefs
        .skills
        .iter()
        .filter(|s| haystack.contains(&normalize_text(s)))
        .count();
    let ratio = hits as f64 / prefs.skills.len() as f64;
    earned(ratio, SKILLS_WEIGHT)
}

/// Jobs carry no explicit seniority; it is inferred from the title.
pub fn infer_seniority(title: &str) -> Option<&'static str> {
    let title = normalize_text(title);
    // Most-specific first: "senior staff engineer" is staff, not senior.
    const LEVELS: [(&str, &str); 8] = [
        ("principal", "principal"),
        ("staff", "staff"),
        ("director", "director"),
        ("lead", "lead"),
        ("senior", "senior"),
        ("sr.", "senior"),
        ("junior", "junior"),
        ("intern", "intern"),
    ];
    LEVELS
        .iter()
        .find(|(needle, _)| title.contains(needle))
        .map(|(_, level)| *level)
}

fn score_seniority(prefs: &UserPreferencesRow, job: &JobRow) -> i64 {
    let pref = match &prefs.seniority {
        Some(s) => normalize_text(s),
        None => return neutral(SENIORITY_WEIGHT),
    };
    match infer_seniority(&job.title) {
        Some(inferred) if inferred == pref => SENIORITY_WEIGHT,
        Some(_) => 0,
        None => neutral(SENIORITY_WEIGHT),
    }
}

fn score_company_size(prefs: &UserPreferencesRow, job: &JobRow) -> i64 {
    if prefs.company_sizes.is_empty() {
        return neutral(COMPANY_SIZE_WEIGHT);
    }
    match &job.company_size {
        None => neutral(COMPANY_SIZE_WEIGHT),
        Some(size) => {
            let size = normalize_text(size);
            if prefs.company_sizes.iter().any(|s| normalize_text(s) == size) {
                COMPANY_SIZE_WEIGHT
            } else {
                0
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Learned-pattern adjustments
// ────────────────────────────────────────────────────────────────────────────

/// True when an acknowledged pattern's (dimension, value) describes this job.
pub fn pattern_matches(pattern: &LearnedPreferenceRow, job: &JobRow) -> bool {
    match pattern.pattern_type.as_str() {
        "company" => normalize_text(&job.company) == pattern.value,
        "location" => job
            .location
            .as_deref()
            .map(|l| normalize_text(l) == pattern.value)
            .unwrap_or(false),
        "remote" => {
            (job.remote && pattern.value == "remote") || (!job.remote && pattern.value == "onsite")
        }
        "employment_type" => job
            .employment_type
            .as_deref()
            .map(|e| normalize_text(e) == pattern.value)
            .unwrap_or(false),
        _ => false,
    }
}

/// Folds acknowledged patterns into the normalized score: a matching
/// "dismissed" pattern subtracts 15 × confidence, a matching "saved"
/// pattern adds 10 × (1 − confidence). Pending and rejected rows never
/// affect live scoring.
fn apply_pattern_adjustments(
    normalized: i64,
    learned: &[LearnedPreferenceRow],
    job: &JobRow,
) -> i64 {
    let mut adjusted = normalized as f64;
    for pattern in learned {
        if pattern.status != "acknowledged" || !pattern_matches(pattern, job) {
            continue;
        }
        match pattern.direction.as_str() {
            "dismissed" => adjusted -= DISMISSED_PENALTY * pattern.confidence,
            "saved" => adjusted += SAVED_BOOST * (1.0 - pattern.confidence),
            _ => {}
        }
    }
    adjusted as i64
}

/// Deterministic rationale: the same inputs always produce the same string.
fn build_rationale(score: i64, breakdown: &[CategoryScore]) -> String {
    let parts: Vec<String> = breakdown
        .iter()
        .map(|c| format!("{} ({}/{})", c.category, c.earned, c.possible))
        .collect();
    format!("{score}% match: {}", parts.join(", "))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn make_job(company: &str, salary_max: Option<i64>) -> JobRow {
        JobRow {
            id: Uuid::new_v4(),
            dedup_key: "k".to_string(),
            source: "test".to_string(),
            title: "Senior Rust Engineer".to_string(),
            company: company.to_string(),
            industry: Some("Software Development".to_string()),
            location: Some("Berlin, Germany".to_string()),
            salary_min: None,
            salary_max,
            employment_type: Some("full_time".to_string()),
            remote: false,
            company_size: Some("51-200".to_string()),
            description: Some("You will write Rust and Tokio services.".to_string()),
            url: None,
            first_seen_at: Utc::now(),
            last_seen_at: Utc::now(),
        }
    }

    fn full_prefs() -> UserPreferencesRow {
        UserPreferencesRow {
            user_id: Uuid::new_v4(),
            titles: vec!["Rust Engineer".to_string()],
            locations: vec!["Berlin".to_string()],
            remote_ok: false,
            min_salary: Some(100_000),
            skills: vec!["rust".to_string(), "tokio".to_string()],
            seniority: Some("senior".to_string()),
            company_sizes: vec!["51-200".to_string()],
            excluded_companies: vec![],
            excluded_industries: vec![],
        }
    }

    fn make_pattern(
        pattern_type: &str,
        value: &str,
        direction: &str,
        confidence: f64,
        status: &str,
    ) -> LearnedPreferenceRow {
        LearnedPreferenceRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            pattern_type: pattern_type.to_string(),
            value: value.to_string(),
            direction: direction.to_string(),
            confidence,
            occurrences: 5,
            status: status.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn scored(decision: ScoreDecision) -> ScoreOutcome {
        match decision {
            ScoreDecision::Scored(outcome) => outcome,
            ScoreDecision::Reject(b) => panic!("expected a score, got rejection {b:?}"),
        }
    }

    #[test]
    fn test_perfect_fit_normalizes_110_to_99() {
        let outcome = scored(evaluate(&full_prefs(), &[], &make_job("Acme", Some(130_000))));
        let raw: i64 = outcome.breakdown.iter().map(|c| c.earned).sum();
        assert_eq!(raw, 110);
        // 110 / 1.1 truncates to 99 — the preserved rounding quirk.
        assert_eq!(outcome.score, 99);
    }

    #[test]
    fn test_no_preferences_is_neutral_not_zero() {
        let prefs = UserPreferencesRow::empty(Uuid::new_v4());
        let outcome = scored(evaluate(&prefs, &[], &make_job("Acme", None)));
        // Neutral half-weights: 12+10+10+10+7+5 = 54 → /1.1 → 49.
        assert_eq!(outcome.score, 49);
    }

    #[test]
    fn test_known_salary_below_minimum_rejects() {
        let decision = evaluate(&full_prefs(), &[], &make_job("Acme", Some(90_000)));
        match decision {
            ScoreDecision::Reject(DealBreaker::SalaryBelowMinimum { offered, minimum }) => {
                assert_eq!(offered, 90_000);
                assert_eq!(minimum, 100_000);
            }
            other => panic!("expected salary rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_salary_never_rejects() {
        let mut prefs = full_prefs();
        prefs.min_salary = Some(150_000);
        let outcome = evaluate(&prefs, &[], &make_job("Acme", None));
        assert!(matches!(outcome, ScoreDecision::Scored(_)));
    }

    #[test]
    fn test_excluded_company_rejects_before_scoring() {
        let mut prefs = full_prefs();
        prefs.excluded_companies = vec!["BadCo".to_string()];
        let decision = evaluate(&prefs, &[], &make_job("BadCo", Some(140_000)));
        assert!(matches!(
            decision,
            ScoreDecision::Reject(DealBreaker::ExcludedCompany(_))
        ));
    }

    #[test]
    fn test_excluded_industry_rejects() {
        let mut prefs = full_prefs();
        prefs.excluded_industries = vec!["software development".to_string()];
        let decision = evaluate(&prefs, &[], &make_job("Acme", Some(140_000)));
        assert!(matches!(
            decision,
            ScoreDecision::Reject(DealBreaker::ExcludedIndustry(_))
        ));
    }

    #[test]
    fn test_company_exclusion_is_case_insensitive() {
        let mut prefs = full_prefs();
        prefs.excluded_companies = vec!["badco".to_string()];
        let decision = evaluate(&prefs, &[], &make_job("BadCo", Some(140_000)));
        assert!(matches!(decision, ScoreDecision::Reject(_)));
    }

    #[test]
    fn test_dismissed_pattern_subtracts_scaled_penalty() {
        let base = scored(evaluate(&full_prefs(), &[], &make_job("Acme", Some(130_000)))).score;
        let pattern = make_pattern("company", "acme", "dismissed", 0.8, "acknowledged");
        let adjusted = scored(evaluate(
            &full_prefs(),
            &[pattern],
            &make_job("Acme", Some(130_000)),
        ))
        .score;
        // 15 × 0.8 = 12 points down.
        assert_eq!(adjusted, base - 12);
    }

    #[test]
    fn test_saved_pattern_adds_inverse_scaled_boost() {
        let prefs = UserPreferencesRow::empty(Uuid::new_v4());
        let base = scored(evaluate(&prefs, &[], &make_job("Acme", None))).score;
        let pattern = make_pattern("company", "acme", "saved", 0.6, "acknowledged");
        let adjusted = scored(evaluate(&prefs, &[pattern], &make_job("Acme", None))).score;
        // 10 × (1 − 0.6) = 4 points up.
        assert_eq!(adjusted, base + 4);
    }

    #[test]
    fn test_pending_and_rejected_patterns_never_affect_scoring() {
        let base = scored(evaluate(&full_prefs(), &[], &make_job("Acme", Some(130_000)))).score;
        let patterns = vec![
            make_pattern("company", "acme", "dismissed", 0.9, "pending"),
            make_pattern("company", "acme", "dismissed", 0.9, "rejected"),
        ];
        let unchanged = scored(evaluate(
            &full_prefs(),
            &patterns,
            &make_job("Acme", Some(130_000)),
        ))
        .score;
        assert_eq!(unchanged, base);
    }

    #[test]
    fn test_score_clamped_to_zero_under_stacked_penalties() {
        let prefs = UserPreferencesRow::empty(Uuid::new_v4());
        let patterns: Vec<_> = (0..10)
            .map(|_| make_pattern("company", "acme", "dismissed", 0.95, "acknowledged"))
            .collect();
        let outcome = scored(evaluate(&prefs, &patterns, &make_job("Acme", None)));
        assert_eq!(outcome.score, 0);
    }

    #[test]
    fn test_score_clamped_to_hundred_under_stacked_boosts() {
        let patterns: Vec<_> = (0..20)
            .map(|_| make_pattern("company", "acme", "saved", 0.0, "acknowledged"))
            .collect();
        let outcome = scored(evaluate(
            &full_prefs(),
            &patterns,
            &make_job("Acme", Some(130_000)),
        ));
        assert_eq!(outcome.score, 100);
    }

    #[test]
    fn test_remote_pattern_matches_remote_jobs() {
        let mut job = make_job("Acme", None);
        job.remote = true;
        let pattern = make_pattern("remote", "remote", "dismissed", 0.7, "acknowledged");
        assert!(pattern_matches(&pattern, &job));
        job.remote = false;
        assert!(!pattern_matches(&pattern, &job));
    }

    #[test]
    fn test_rationale_is_deterministic_and_enumerates_categories() {
        let outcome = scored(evaluate(&full_prefs(), &[], &make_job("Acme", Some(130_000))));
        assert_eq!(
            outcome.rationale,
            "99% match: title (25/25), location (20/20), salary (20/20), \
             skills (20/20), seniority (15/15), company size (10/10)"
        );
        let again = scored(evaluate(&full_prefs(), &[], &make_job("Acme", Some(130_000))));
        assert_eq!(outcome.rationale, again.rationale);
    }

    #[test]
    fn test_partial_title_overlap_earns_partial_points() {
        let mut prefs = full_prefs();
        prefs.titles = vec!["Rust Developer".to_string()];
        let outcome = scored(evaluate(&prefs, &[], &make_job("Acme", Some(130_000))));
        let title = &outcome.breakdown[0];
        assert_eq!(title.category, "title");
        // One of two preference tokens present → 0.6 tier → 15/25.
        assert_eq!(title.earned, 15);
    }

    #[test]
    fn test_remote_job_satisfies_remote_preference() {
        let mut prefs = full_prefs();
        prefs.remote_ok = true;
        prefs.locations = vec![];
        let mut job = make_job("Acme", Some(130_000));
        job.remote = true;
        job.location = None;
        let outcome = scored(evaluate(&prefs, &[], &job));
        assert_eq!(outcome.breakdown[1].earned, 20);
    }

    #[test]
    fn test_infer_seniority_most_specific_wins() {
        assert_eq!(infer_seniority("Senior Staff Engineer"), Some("staff"));
        assert_eq!(infer_seniority("Sr. Backend Engineer"), Some("senior"));
        assert_eq!(infer_seniority("Software Engineer"), None);
    }

    #[test]
    fn test_exclusion_list_and_salary_floor_select_one_of_two_jobs() {
        let mut prefs = UserPreferencesRow::empty(Uuid::new_v4());
        prefs.min_salary = Some(120_000);
        prefs.excluded_companies = vec!["BadCo".to_string()];

        let job_a = make_job("Acme", Some(130_000));
        let mut job_b = make_job("BadCo", Some(140_000));
        job_b.industry = None;

        assert!(matches!(
            evaluate(&prefs, &[], &job_a),
            ScoreDecision::Scored(_)
        ));
        assert!(matches!(
            evaluate(&prefs, &[], &job_b),
            ScoreDecision::Reject(DealBreaker::ExcludedCompany(_))
        ));
    }

    #[test]
    fn test_scores_bounded_for_all_inputs() {
        let jobs = [
            make_job("Acme", Some(130_000)),
            make_job("Acme", None),
            make_job("", None),
        ];
        for job in &jobs {
            let outcome = scored(evaluate(&UserPreferencesRow::empty(Uuid::new_v4()), &[], job));
            assert!((0..=100).contains(&outcome.score));
        }
    }
}
