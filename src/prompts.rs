pub const CRITIQUE: &str = include_str!("../data/prompts/critique.txt");
pub const MATCH_SCORE: &str = include_str!("../data/prompts/match_score.txt");
pub const OPTIMIZE: &str = include_str!("../data/prompts/optimize.txt");
pub const GRAMMAR: &str = include_str!("../data/prompts/grammar.txt");
pub const KEYWORD_DENSITY: &str = include_str!("../data/prompts/keyword_density.txt");
pub const SUGGEST_ROLES: &str = include_str!("../data/prompts/suggest_roles.txt");
pub const SECTION_CHECK: &str = include_str!("../data/prompts/section_check.txt");
pub const COVER_LETTER: &str = include_str!("../data/prompts/cover_letter.txt");
pub const SALARY_INSIGHTS: &str = include_str!("../data/prompts/salary_insights.txt");
pub const SKILL_GAP: &str = include_str!("../data/prompts/skill_gap.txt");
pub const INTERVIEW_QUESTIONS: &str = include_str!("../data/prompts/interview_questions.txt");
pub const BRANDING: &str = include_str!("../data/prompts/branding.txt");

pub const REPORT_HTML: &str = include_str!("../data/templates/report.html");

/// Replace `{{key}}` placeholders in a template string.
///
/// Substitution is single pass: placeholder-looking text inside a value is
/// left alone. Unknown keys are kept verbatim.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = &after[..end];
                match vars.iter().find(|(k, _)| *k == key) {
                    Some((_, value)) => result.push_str(value),
                    None => result.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    result.push_str(rest);
    result
}

/// Placeholder keys referenced by a template, in order of first appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut keys = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else { break };
        let key = &after[..end];
        if !keys.contains(&key) {
            keys.push(key);
        }
        rest = &after[end + 2..];
    }
    keys
}
