use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use resumeflow::analysis::{AnalysisKind, AnalysisParams, AnalysisRequest};
use resumeflow::app::{authorize_admin, App};
use resumeflow::history::{InteractionStore, LogSummary};
use resumeflow::models::{Config, UserIdentity};
use resumeflow::render::{
    sanitize_filename, ReportRenderer, WkhtmlToPdf, DEFAULT_FOOTER, DEFAULT_TITLE,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "resumeflow")]
#[command(about = "Resume and job description analysis with Gemini")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one analysis against a resume.
    Analyze(AnalyzeArgs),
    /// Render a markdown file as a styled PDF report.
    Render {
        markdown: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value = DEFAULT_TITLE)]
        title: String,
        #[arg(long, default_value = DEFAULT_FOOTER)]
        footer: String,
    },
    /// Drop interaction history older than the retention window.
    Prune {
        #[arg(long)]
        days: Option<i64>,
    },
    /// Show usage statistics from the interaction log.
    Stats {
        #[arg(long)]
        admin_pass: Option<String>,
    },
}

#[derive(Debug, Args)]
struct AnalyzeArgs {
    #[arg(value_name = "KIND", value_parser = parse_kind_arg)]
    kind: AnalysisKind,
    /// Resume as PDF, image, or text.
    #[arg(long)]
    resume: PathBuf,
    /// File holding the job description.
    #[arg(long, conflicts_with = "job_desc_text")]
    job_desc: Option<PathBuf>,
    #[arg(long)]
    job_desc_text: Option<String>,
    /// PDF pages to send to the model.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=20))]
    pages: u32,
    #[arg(long)]
    language: Option<String>,
    #[arg(long)]
    company: Option<String>,
    #[arg(long)]
    hiring_manager: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    experience_level: Option<String>,
    #[arg(long)]
    target_role: Option<String>,
    /// Override the configured model.
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    /// Also render the result as a PDF. With no path, one is derived from
    /// the analysis title.
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    pdf: Option<String>,
}

fn parse_kind_arg(input: &str) -> std::result::Result<AnalysisKind, String> {
    input.parse()
}

fn default_pdf_path(kind: AnalysisKind) -> PathBuf {
    PathBuf::from(format!("{}.pdf", sanitize_filename(kind.title())))
}

async fn read_job_description(args: &AnalyzeArgs) -> Result<Option<String>> {
    match (&args.job_desc, &args.job_desc_text) {
        (Some(path), _) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading job description {}", path.display()))?;
            Ok(Some(text))
        }
        (None, Some(text)) => Ok(Some(text.clone())),
        (None, None) => Ok(None),
    }
}

async fn write_pdf(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    info!("Saved PDF to {}", path.display());
    Ok(())
}

/// Returns the process exit code.
async fn analyze(app: &App, args: AnalyzeArgs) -> Result<i32> {
    let parts = app.load_resume(&args.resume, args.pages).await?;
    let params = AnalysisParams {
        job_description: read_job_description(&args).await?,
        language: args.language.clone(),
        company_name: args.company.clone(),
        hiring_manager: args.hiring_manager.clone(),
        location: args.location.clone(),
        experience_level: args.experience_level.clone(),
        target_role: args.target_role.clone(),
    };

    let mut request = AnalysisRequest::new(args.kind, params, parts);
    if let Some(model) = &args.model {
        request = request.with_model(model.clone());
    }
    let user = UserIdentity::new(args.name.clone(), args.email.clone());

    let outcome = app.analyze(&request, &user).await;
    println!("{}", outcome);

    if outcome.is_fatal() {
        error!("Model API key has expired or is invalid. Please renew it and try again.");
        return Ok(2);
    }

    let Some(text) = outcome.text() else {
        return Ok(1);
    };

    if let Some(out) = args.pdf {
        let out = if out.is_empty() {
            default_pdf_path(args.kind)
        } else {
            PathBuf::from(out)
        };
        if let Some(pdf) = app.render_report(text, args.kind.title(), DEFAULT_FOOTER).await {
            write_pdf(&out, &pdf).await?;
        }
    }

    Ok(0)
}

async fn render(config: &Config, markdown: &Path, out: &Path, title: &str, footer: &str) -> Result<()> {
    let text = tokio::fs::read_to_string(markdown)
        .await
        .with_context(|| format!("reading {}", markdown.display()))?;
    let renderer = ReportRenderer::new(Arc::new(WkhtmlToPdf::new(config.wkhtmltopdf_path.clone())));
    let pdf = renderer.render_pdf(&text, title, footer).await?;
    write_pdf(out, &pdf).await
}

/// Prune the log on its own, without the startup prune `App::new` runs.
fn prune(config: &Config, days: Option<i64>) -> Result<bool> {
    let store = InteractionStore::new(config.db_file.clone());
    let mut data = store.load();
    Ok(store.prune(&mut data, days.unwrap_or(config.history_retention_days))?)
}

fn stats(config: &Config, admin_pass: Option<&str>) -> Result<LogSummary> {
    authorize_admin(config.admin_pass.as_deref(), admin_pass)?;
    Ok(InteractionStore::new(config.db_file.clone()).load().summary())
}

/// Only `analyze` builds the full app, so the other commands run without a
/// Gemini key.
async fn run(config: Config, command: Command) -> Result<i32> {
    match command {
        Command::Analyze(args) => {
            let app = App::new(config)
                .await
                .context("Failed to initialize application")?;
            let code = analyze(&app, args).await;
            if let Err(e) = app.shutdown().await {
                error!("{}", e);
            }
            code
        }
        Command::Render {
            markdown,
            out,
            title,
            footer,
        } => {
            render(&config, &markdown, &out, &title, &footer).await?;
            Ok(0)
        }
        Command::Prune { days } => {
            if prune(&config, days)? {
                println!("Old interaction history cleaned up.");
            } else {
                println!("No interaction history needed cleaning.");
            }
            Ok(0)
        }
        Command::Stats { admin_pass } => {
            let summary = stats(&config, admin_pass.as_deref())?;
            println!("Unique users: {}", summary.unique_users);
            println!("Total interactions: {}", summary.total_interactions);
            for (analysis, count) in &summary.by_analysis {
                println!("  {:<22} {}", analysis, count);
            }
            Ok(0)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resumeflow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let code = match run(config, args.command).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
