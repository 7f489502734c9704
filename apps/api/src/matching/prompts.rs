// LLM prompt constants for the matching module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for match refinement — enforces JSON-only output.
pub const REFINE_SYSTEM: &str = "You are an expert recruiter evaluating how well a job posting \
    fits a candidate's stated preferences. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Refinement prompt template.
/// Replace: {job_json}, {preferences_json}, {heuristic_score}
pub const REFINE_PROMPT_TEMPLATE: &str = r#"Score how well this job posting fits the candidate's preferences.

A deterministic heuristic already scored this pairing {heuristic_score}/100. Adjust it only
where the posting text carries signal the heuristic cannot see (implied seniority, skill
adjacency, location nuance). Small corrections are expected; large swings need strong evidence.

Return a JSON object with this EXACT schema (no extra fields, every score 0-100):
{
  "title_match": 80,
  "skills_overlap": 70,
  "location_match": 100,
  "salary_match": 50,
  "company_size": 50,
  "seniority_match": 90,
  "overall_score": 76,
  "justification": "One or two sentences explaining the adjustment."
}

JOB POSTING:
{job_json}

CANDIDATE PREFERENCES:
{preferences_json}"#;
