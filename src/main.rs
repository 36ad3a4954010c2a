use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod batch;
mod chat;
mod classify;
mod config;
mod error;
mod models;
mod report;
mod risk;
mod scoring;
mod validate;

use crate::chat::{ChatSession, HttpChatBackend};
use crate::config::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::error::ChatError;
use crate::models::{CourseCategory, DeviceType, LearnerMetrics};
use crate::scoring::{RemoteScorer, RiskScoringClient};

#[derive(Parser)]
#[command(name = "completion-risk")]
#[command(about = "Course completion risk scoring and learning assistant client", long_about = None)]
struct Cli {
    /// Base URL of the scoring and assistant service
    #[arg(long, global = true, env = "LEARNING_API_URL", default_value = DEFAULT_BASE_URL)]
    api_url: String,

    /// Request timeout in seconds
    #[arg(long, global = true, env = "LEARNING_API_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Score with the local heuristic instead of the remote model
    #[arg(long, global = true)]
    offline: bool,

    /// Simulated latency for the local heuristic, in milliseconds
    #[arg(long, global = true, default_value_t = 0)]
    latency_ms: u64,

    /// Seed for the heuristic's random noise
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict completion for one learner
    Predict {
        #[command(flatten)]
        metrics: MetricsArgs,
        /// Learner metrics as a JSON object with the service's field names
        #[arg(long)]
        json: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Score every learner in a CSV file
    Batch {
        #[arg(long)]
        csv: PathBuf,
        /// Write a markdown report here instead of printing it
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Talk to the learning assistant
    Chat,
    /// Check the backend's health endpoint
    Health,
}

#[derive(Args)]
struct MetricsArgs {
    #[arg(long, default_value_t = 0.0)]
    time_spent: f64,
    #[arg(long, default_value_t = 0)]
    videos: i64,
    #[arg(long, default_value_t = 0)]
    quizzes: i64,
    #[arg(long, default_value_t = 0.0)]
    quiz_score: f64,
    #[arg(long, default_value_t = 0.0)]
    completion_rate: f64,
    #[arg(long)]
    category: Option<CourseCategory>,
    #[arg(long)]
    device: Option<DeviceType>,
}

impl From<MetricsArgs> for LearnerMetrics {
    fn from(args: MetricsArgs) -> Self {
        LearnerMetrics {
            time_spent_minutes: args.time_spent,
            videos_watched: args.videos,
            quizzes_taken: args.quizzes,
            average_quiz_score: args.quiz_score,
            completion_rate: args.completion_rate,
            course_category: args.category,
            device_type: args.device,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let config = if self.offline {
            ClientConfig::offline()
        } else {
            ClientConfig::remote(&self.api_url).context("invalid --api-url")?
        };

        Ok(config
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_heuristic_latency(Duration::from_millis(self.latency_ms))
            .with_seed(self.seed))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("completion_risk=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.client_config()?;

    match cli.command {
        Commands::Predict {
            metrics,
            json,
            format,
        } => {
            let metrics = match json {
                Some(raw) => serde_json::from_str::<LearnerMetrics>(&raw)
                    .context("--json is not a valid learner metrics object")?,
                None => LearnerMetrics::from(metrics),
            };

            let client = RiskScoringClient::from_config(&config)?;
            info!(strategy = client.strategy_name(), "scoring learner");
            let prediction = client.score(&metrics).await?;

            match format {
                OutputFormat::Text => {
                    print!(
                        "{}",
                        report::render_prediction(&prediction, client.is_approximation())
                    );
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&prediction)?);
                }
            }
        }
        Commands::Batch { csv, out } => {
            let file = std::fs::File::open(&csv)
                .with_context(|| format!("failed to open {}", csv.display()))?;
            let rows = batch::read_metrics_csv(file)?;

            let client = RiskScoringClient::from_config(&config)?;
            let outcomes = batch::score_all(&client, rows).await;
            let report = report::build_batch_report(
                &csv.display().to_string(),
                client.strategy_name(),
                client.is_approximation(),
                &outcomes,
            );

            match out {
                Some(path) => {
                    std::fs::write(&path, report)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Report written to {}.", path.display());
                }
                None => print!("{report}"),
            }
        }
        Commands::Chat => {
            let base_url = config
                .base_url
                .as_ref()
                .context("the assistant needs a backend; drop --offline")?;
            let backend = HttpChatBackend::new(config.http_client()?, base_url)?;
            run_chat(ChatSession::new(backend)).await?;
        }
        Commands::Health => {
            let base_url = config
                .base_url
                .as_ref()
                .context("health checks need a backend; drop --offline")?;
            let scorer = RemoteScorer::new(config.http_client()?, base_url)?;
            let health = scorer.health().await?;
            println!("Status: {}", health.status);
            println!("Model loaded: {}", health.model_loaded);
            println!("Assistant configured: {}", health.assistant_configured);
        }
    }

    Ok(())
}

async fn run_chat(mut session: ChatSession<HttpChatBackend>) -> anyhow::Result<()> {
    info!(session = %session.id(), "chat session started");
    for message in session.messages() {
        println!("{}", message.content);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line == "/quit" {
            break;
        }

        match session.send(line).await {
            Ok(reply) => println!("{}", reply.content),
            Err(ChatError::EmptyMessage) => continue,
            Err(err) => {
                warn!(error = %err, "assistant request failed");
                if let Some(diagnostic) = session.messages().last() {
                    println!("{}", diagnostic.content);
                }
            }
        }
    }

    info!(
        session = %session.id(),
        messages = session.messages().len(),
        "chat session ended"
    );
    Ok(())
}
