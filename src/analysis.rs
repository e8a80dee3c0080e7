//! Analysis kinds and the single dispatcher that runs them
//!
//! Each kind is a static [`AnalysisProfile`]: a prompt template, whether a job
//! description is mandatory, and the optional parameters it interpolates with
//! their fallbacks. [`Analyzer::run`] renders the template, calls the model
//! through the retry wrapper and turns any failure into a typed
//! [`AnalysisOutcome`] whose display form is always presentable.

use crate::ai::RemoteCaller;
use crate::error::ErrorKind;
use crate::models::ContentPart;
use crate::{prompts, Error, Result};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisKind {
    Critique,
    MatchScore,
    Optimize,
    Grammar,
    KeywordDensity,
    SuggestRoles,
    SectionCheck,
    CoverLetter,
    SalaryInsights,
    SkillGap,
    InterviewQuestions,
    Branding,
}

/// An optional prompt parameter and the text used when the caller omits it.
#[derive(Debug, Clone, Copy)]
pub struct ExtraParam {
    pub key: &'static str,
    pub fallback: &'static str,
}

#[derive(Debug)]
pub struct AnalysisProfile {
    pub kind: AnalysisKind,
    pub slug: &'static str,
    pub title: &'static str,
    pub requires_job_description: bool,
    pub extra_params: &'static [ExtraParam],
    pub template: &'static str,
    /// Completes "Error <context>: <message>".
    pub error_context: &'static str,
}

static PROFILES: [AnalysisProfile; 12] = [
    AnalysisProfile {
        kind: AnalysisKind::Critique,
        slug: "critique",
        title: "Resume Analysis",
        requires_job_description: true,
        extra_params: &[],
        template: prompts::CRITIQUE,
        error_context: "analyzing resume",
    },
    AnalysisProfile {
        kind: AnalysisKind::MatchScore,
        slug: "match-score",
        title: "ATS Match Score",
        requires_job_description: true,
        extra_params: &[],
        template: prompts::MATCH_SCORE,
        error_context: "calculating match score",
    },
    AnalysisProfile {
        kind: AnalysisKind::Optimize,
        slug: "optimize",
        title: "Optimized Resume",
        requires_job_description: true,
        extra_params: &[ExtraParam {
            key: "language",
            fallback: "English",
        }],
        template: prompts::OPTIMIZE,
        error_context: "optimizing resume",
    },
    AnalysisProfile {
        kind: AnalysisKind::Grammar,
        slug: "grammar",
        title: "Grammar Check",
        requires_job_description: false,
        extra_params: &[],
        template: prompts::GRAMMAR,
        error_context: "checking grammar",
    },
    AnalysisProfile {
        kind: AnalysisKind::KeywordDensity,
        slug: "keyword-density",
        title: "Keyword Density Analysis",
        requires_job_description: true,
        extra_params: &[],
        template: prompts::KEYWORD_DENSITY,
        error_context: "analyzing keyword density",
    },
    AnalysisProfile {
        kind: AnalysisKind::SuggestRoles,
        slug: "suggest-roles",
        title: "Suggested Roles",
        requires_job_description: false,
        extra_params: &[],
        template: prompts::SUGGEST_ROLES,
        error_context: "suggesting roles",
    },
    AnalysisProfile {
        kind: AnalysisKind::SectionCheck,
        slug: "section-check",
        title: "Section Completeness Check",
        requires_job_description: false,
        extra_params: &[],
        template: prompts::SECTION_CHECK,
        error_context: "checking sections",
    },
    AnalysisProfile {
        kind: AnalysisKind::CoverLetter,
        slug: "cover-letter",
        title: "Cover Letter",
        requires_job_description: true,
        extra_params: &[
            ExtraParam {
                key: "company_name",
                fallback: "[Company Name]",
            },
            ExtraParam {
                key: "hiring_manager",
                fallback: "[Hiring Manager]",
            },
        ],
        template: prompts::COVER_LETTER,
        error_context: "generating cover letter",
    },
    AnalysisProfile {
        kind: AnalysisKind::SalaryInsights,
        slug: "salary-insights",
        title: "Salary Insights",
        requires_job_description: false,
        extra_params: &[
            ExtraParam {
                key: "location",
                fallback: "General Market",
            },
            ExtraParam {
                key: "experience_level",
                fallback: "Based on Resume",
            },
        ],
        template: prompts::SALARY_INSIGHTS,
        error_context: "generating salary insights",
    },
    AnalysisProfile {
        kind: AnalysisKind::SkillGap,
        slug: "skill-gap",
        title: "Skill Gap Analysis",
        requires_job_description: true,
        extra_params: &[],
        template: prompts::SKILL_GAP,
        error_context: "performing skill gap analysis",
    },
    AnalysisProfile {
        kind: AnalysisKind::InterviewQuestions,
        slug: "interview-questions",
        title: "Interview Questions",
        requires_job_description: true,
        extra_params: &[],
        template: prompts::INTERVIEW_QUESTIONS,
        error_context: "generating interview questions",
    },
    AnalysisProfile {
        kind: AnalysisKind::Branding,
        slug: "branding",
        title: "Personal Branding Statement",
        requires_job_description: false,
        extra_params: &[ExtraParam {
            key: "target_role",
            fallback: "Not specified",
        }],
        template: prompts::BRANDING,
        error_context: "generating branding statement",
    },
];

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 12] = [
        Self::Critique,
        Self::MatchScore,
        Self::Optimize,
        Self::Grammar,
        Self::KeywordDensity,
        Self::SuggestRoles,
        Self::SectionCheck,
        Self::CoverLetter,
        Self::SalaryInsights,
        Self::SkillGap,
        Self::InterviewQuestions,
        Self::Branding,
    ];

    pub fn profile(self) -> &'static AnalysisProfile {
        // PROFILES is ordered like the enum.
        &PROFILES[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        self.profile().slug
    }

    pub fn title(self) -> &'static str {
        self.profile().title
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|k| k.as_str()).collect();
                format!(
                    "Unknown analysis '{}'. Expected one of: {}",
                    s,
                    known.join(", ")
                )
            })
    }
}

/// Caller-supplied context interpolated into prompts.
#[derive(Debug, Clone, Default)]
pub struct AnalysisParams {
    pub job_description: Option<String>,
    pub language: Option<String>,
    pub company_name: Option<String>,
    pub hiring_manager: Option<String>,
    pub location: Option<String>,
    pub experience_level: Option<String>,
    pub target_role: Option<String>,
}

impl AnalysisParams {
    pub fn with_job_description(mut self, job_description: impl Into<String>) -> Self {
        self.job_description = Some(job_description.into());
        self
    }

    fn value(&self, key: &str) -> Option<&str> {
        let value = match key {
            "job_description" => &self.job_description,
            "language" => &self.language,
            "company_name" => &self.company_name,
            "hiring_manager" => &self.hiring_manager,
            "location" => &self.location,
            "experience_level" => &self.experience_level,
            "target_role" => &self.target_role,
            _ => return None,
        };
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }
}

/// Render the prompt for `kind`.
pub fn build_prompt(kind: AnalysisKind, params: &AnalysisParams) -> Result<String> {
    let profile = kind.profile();
    let job_description = params.value("job_description");

    if profile.requires_job_description && job_description.is_none() {
        return Err(Error::MissingInput(format!(
            "{} requires a job description",
            profile.title
        )));
    }

    let mut vars: Vec<(&str, &str)> = Vec::with_capacity(profile.extra_params.len() + 1);
    if let Some(jd) = job_description {
        vars.push(("job_description", jd));
    }
    for extra in profile.extra_params {
        vars.push((extra.key, params.value(extra.key).unwrap_or(extra.fallback)));
    }

    Ok(prompts::render(profile.template, &vars))
}

/// Everything needed for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub kind: AnalysisKind,
    pub params: AnalysisParams,
    pub parts: Vec<ContentPart>,
    /// Overrides the analyzer's default model.
    pub model: Option<String>,
}

impl AnalysisRequest {
    pub fn new(kind: AnalysisKind, params: AnalysisParams, parts: Vec<ContentPart>) -> Self {
        Self {
            kind,
            params,
            parts,
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Result of one analysis: model text, or a typed failure that still
/// displays as a readable message.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Success(String),
    Failed {
        kind: ErrorKind,
        context: &'static str,
        detail: String,
    },
}

impl AnalysisOutcome {
    pub fn from_error(context: &'static str, error: &Error) -> Self {
        Self::Failed {
            kind: error.kind(),
            context,
            detail: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Failed {
                kind: ErrorKind::Fatal,
                ..
            }
        )
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Success(text) => Some(text),
            Self::Failed { .. } => None,
        }
    }
}

impl fmt::Display for AnalysisOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(text) => f.write_str(text),
            Self::Failed {
                context, detail, ..
            } => write!(f, "Error {}: {}", context, detail),
        }
    }
}

pub struct Analyzer {
    caller: RemoteCaller,
    default_model: String,
}

impl Analyzer {
    pub fn new(caller: RemoteCaller, default_model: String) -> Self {
        Self {
            caller,
            default_model,
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Run one analysis. Never fails: errors come back as
    /// [`AnalysisOutcome::Failed`].
    pub async fn run(&self, request: &AnalysisRequest) -> AnalysisOutcome {
        let profile = request.kind.profile();
        let model = request.model.as_deref().unwrap_or(&self.default_model);

        let result = match build_prompt(request.kind, &request.params) {
            Ok(prompt) => {
                info!(
                    analysis = profile.slug,
                    model,
                    parts = request.parts.len(),
                    "Running analysis"
                );
                self.caller.call(&prompt, &request.parts, model).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(text) => AnalysisOutcome::Success(text),
            Err(e) => {
                warn!(analysis = profile.slug, kind = %e.kind(), "Analysis failed: {}", e);
                AnalysisOutcome::from_error(profile.error_context, &e)
            }
        }
    }
}
