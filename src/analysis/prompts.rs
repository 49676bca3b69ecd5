// src/analysis/prompts.rs

pub const SYSTEM_PROMPT: &str =
    "You are a career coach. Respond with a single, valid JSON object and nothing else.";

pub fn build_analysis_prompt(job_desc: &str, resume_text: &str) -> String {
    format!(
        r#"You are an expert career coach and resume writer.

Compare the candidate's resume with the job description below, then return a single JSON object with exactly these keys:

- "resume_match_score": an integer from 0 to 100 estimating how well the resume matches the job.
- "match_analysis": a short paragraph explaining the score, naming the strongest matches and the most important gaps.
- "updated_resume_content": the full resume rewritten as plain text, tailored to this job. Keep every fact truthful; reorder and rephrase, do not invent experience.
- "cover_letter_content": a one-page cover letter in plain text addressed to the hiring team for this job.

Do not use Markdown. Do not use LaTeX commands. Do not wrap the JSON in code fences.

JOB DESCRIPTION:
{}

RESUME:
{}"#,
        job_desc.trim(),
        resume_text.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_is_deterministic_and_complete() {
        let a = build_analysis_prompt("  Build pipelines ", "Jane Doe\nRust");
        let b = build_analysis_prompt("  Build pipelines ", "Jane Doe\nRust");
        assert_eq!(a, b);

        for key in [
            "resume_match_score",
            "match_analysis",
            "updated_resume_content",
            "cover_letter_content",
        ] {
            assert!(a.contains(key), "prompt is missing {}", key);
        }
        assert!(a.contains("JOB DESCRIPTION:\nBuild pipelines\n"));
        assert!(a.ends_with("RESUME:\nJane Doe\nRust"));
    }
}
