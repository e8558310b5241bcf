#[cfg(feature = "cli")]
use chat_summaries::{
    config::Config, metrics, telemetry, ChatRole, ContextOrchestrator, HttpTextGenerator,
    SummaryDatabase,
};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use dotenvy::dotenv;
#[cfg(feature = "cli")]
use std::sync::Arc;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "chat-summaries", version, about = "Summarize chat history and assemble model context")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Command {
    /// Store one message at the end of a chat
    Append {
        #[arg(long)]
        chat: String,
        /// user, assistant or system
        #[arg(long, default_value = "user")]
        role: String,
        content: String,
    },
    /// Print the system prompt and message window for the next turn
    Context {
        #[arg(long)]
        chat: String,
        #[arg(long, default_value = "You are a helpful character.")]
        prompt: String,
    },
    /// Run one summary pass against the configured backend
    Update {
        #[arg(long)]
        chat: String,
        #[arg(long)]
        print_metrics: bool,
    },
    /// List stored summaries
    Summaries {
        #[arg(long)]
        chat: String,
        #[arg(long)]
        json: bool,
    },
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    telemetry::init_tracing();
    metrics::init_metrics();

    let cli = Cli::parse();
    let cfg = Config::from_env()?;
    cfg.print_config();

    let database = Arc::new(SummaryDatabase::new(&cfg.database_path)?);
    let generator = Arc::new(HttpTextGenerator::from_config(&cfg)?);
    let orchestrator = ContextOrchestrator::new(database, generator, cfg.summary.clone())?;

    match cli.command {
        Command::Append { chat, role, content } => {
            let role: ChatRole = role.parse()?;
            let message = orchestrator.record_message(&chat, role, &content).await?;
            println!("{} #{} ({})", message.chat_id, message.sequence, message.role);
        }
        Command::Context { chat, prompt } => {
            let history = orchestrator.sanitized_history(&chat).await?;
            let built = orchestrator.prepare_turn(&chat, &history, &prompt).await;

            println!("{}", built.system_prompt);
            println!();
            for message in &built.recent_messages {
                println!("{}: {}", message.role.as_str().to_uppercase(), message.content);
            }
        }
        Command::Update { chat, print_metrics } => {
            let report = orchestrator.summary_worker().updater().run_pass(&chat).await?;
            println!(
                "{} messages: {} chunk, {} meta, {} fallback, {} duplicate",
                report.total_messages,
                report.chunks_created,
                report.metas_created,
                report.fallbacks,
                report.duplicates
            );
            if let Some(reason) = report.halted {
                println!("stopped early: {:?}", reason);
            }
            if print_metrics {
                print!("{}", metrics::gather_metrics()?);
            }
        }
        Command::Summaries { chat, json } => {
            let overview = orchestrator.list_summaries(&chat).await?;
            if overview.is_empty() && !json {
                println!("no summaries stored for {}", chat);
            } else if json {
                println!("{}", serde_json::to_string_pretty(&overview)?);
            } else {
                for summary in overview.meta.iter().chain(overview.chunks.iter()) {
                    println!(
                        "[{} {}-{}] {}",
                        orchestrator.config().locale.summary_label(summary.level),
                        summary.start_seq,
                        summary.end_seq,
                        summary.summary.trim()
                    );
                }
            }
        }
    }

    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    println!("CLI feature not enabled. Enable with --features cli");
}
