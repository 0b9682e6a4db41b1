use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aisenda_core::config::{self, ClientConfig};
use aisenda_core::history::{
    generate_id, weekly_activity, HistoryStore, PendingTask, RecordKind,
};
use aisenda_core::http::RequestOptions;
use aisenda_core::protocol::{ChatRequest, Message, MessageBuilder, MessageRole, StreamDelta};
use aisenda_core::providers::{route_model, ProviderError};
use aisenda_core::services::AssistantService;
use aisenda_core::stream::{CloseReason, StreamCallbacks};
use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "aisenda", version, about = "Aisenda beauty-consulting assistant")]
struct Cli {
    /// YAML or JSON configuration file; AISENDA_* variables are used when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send a prompt and print the reply as it arrives
    Chat(ChatArgs),
    /// Stream a facial analysis with checkpoints in the history store
    Analyze(AnalyzeArgs),
    /// Re-run a pending analysis
    Resume { task_id: String },
    /// Generate styled replies to a client question
    Qa(QaArgs),
    /// Show which provider convention a model routes to
    Route { model: String },
    #[command(subcommand)]
    History(HistoryCommand),
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    model: Option<String>,
    /// Image file to attach; repeatable
    #[arg(long = "image")]
    images: Vec<PathBuf>,
    /// Ask for one non-streamed reply
    #[arg(long)]
    no_stream: bool,
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    #[arg(long = "image", required = true)]
    images: Vec<PathBuf>,
    #[arg(long)]
    requirement: String,
    #[arg(long, default_value = "detailed")]
    depth: String,
}

#[derive(Debug, Parser)]
struct QaArgs {
    #[arg(long)]
    question: String,
    #[arg(long, default_value = "consultation")]
    scenario: String,
    #[arg(long, default_value = "professional")]
    style: String,
}

#[derive(Debug, Subcommand)]
enum HistoryCommand {
    List {
        #[arg(long)]
        kind: Option<RecordKind>,
        #[arg(long)]
        limit: Option<usize>,
    },
    Delete {
        id: String,
    },
    Export {
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Import {
        path: PathBuf,
    },
    Stats,
    Tasks,
}

/// Prints deltas to stdout as they arrive
#[derive(Default)]
struct Printer {
    chars: usize,
}

impl StreamCallbacks for Printer {
    fn on_message(&mut self, delta: &StreamDelta) {
        self.chars += delta.content.chars().count();
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(delta.content.as_bytes());
        let _ = stdout.flush();
    }

    fn on_error(&mut self, error: &ProviderError) {
        if self.chars > 0 {
            println!();
        }
        debug!("Stream failed after {} characters: {error}", self.chars);
    }

    fn on_close(&mut self, reason: CloseReason) {
        println!();
        if reason == CloseReason::Cancelled {
            eprintln!("cancelled after {} characters", self.chars);
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run(Cli::parse()).await {
        eprintln!("aisenda error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    if let Command::Route { model } = &cli.command {
        let tag = route_model(model);
        println!("{model} -> {tag} ({})", tag.endpoint());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    debug!(
        "Using gateway {} with key {}",
        config.base_url,
        config.api_key.partial_redact()
    );
    let service =
        AssistantService::from_config(config).context("failed to create assistant service")?;

    match cli.command {
        Command::Chat(args) => chat(&service, args).await,
        Command::Analyze(args) => analyze(&service, args).await,
        Command::Resume { task_id } => {
            let options = cancellable_options(&service);
            service
                .resume_task(&task_id, options, &mut Printer::default())
                .await
                .with_context(|| format!("failed to resume task {task_id}"))?;
            Ok(())
        }
        Command::Qa(args) => {
            let replies = service
                .generate_qa_replies(&args.question, &args.scenario, &args.style)
                .await
                .context("failed to generate replies")?;
            for (i, reply) in replies.iter().enumerate() {
                println!("{}. [{}] {}", i + 1, reply.style, reply.content);
            }
            Ok(())
        }
        Command::History(command) => history(&service, command).await,
        Command::Route { .. } => Ok(()),
    }
}

fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    match path {
        Some(path) => config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => config::load_from_env().context("failed to load config from environment"),
    }
}

/// Request options whose cancel token fires on Ctrl-C
fn cancellable_options(service: &AssistantService) -> RequestOptions {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });
    service.client().request_options().with_cancel(cancel)
}

async fn chat(service: &AssistantService, args: ChatArgs) -> Result<()> {
    let images = args
        .images
        .iter()
        .map(|path| read_image(path))
        .collect::<Result<Vec<_>>>()?;
    let message = if images.is_empty() {
        Message::user(args.prompt)
    } else {
        MessageBuilder::new(MessageRole::User)
            .text(args.prompt)
            .images(images)
            .build()
    };
    let model = args
        .model
        .unwrap_or_else(|| service.config().default_model.clone());
    let request = ChatRequest::new(model, vec![message]).with_streaming(!args.no_stream);

    let options = cancellable_options(service);
    service
        .client()
        .fetch_stream(request, options, &mut Printer::default())
        .await
        .context("chat request failed")?;
    Ok(())
}

async fn analyze(service: &AssistantService, args: AnalyzeArgs) -> Result<()> {
    let images = args
        .images
        .iter()
        .map(|path| read_image(path))
        .collect::<Result<Vec<_>>>()?;
    let prompt = aisenda_core::services::prompts::facial_analysis(&args.requirement, &args.depth);
    let task_id = generate_id("task");
    let task = PendingTask::analyze(task_id, prompt, images, Some(args.requirement));

    let options = cancellable_options(service);
    service
        .run_tracked_analysis(task, options, &mut Printer::default())
        .await
        .context("facial analysis failed")?;
    Ok(())
}

async fn history(service: &AssistantService, command: HistoryCommand) -> Result<()> {
    let store: &Arc<dyn HistoryStore> = match service.history() {
        Some(store) => store,
        None => bail!("no history store configured"),
    };

    match command {
        HistoryCommand::List { kind, limit } => {
            let records = match kind {
                Some(kind) => store.list_by_kind(kind, limit).await?,
                None => store.list(limit).await?,
            };
            for record in records {
                let preview: String = record.result.chars().take(60).collect();
                println!(
                    "{}  {}  {:<7}  {}",
                    record.id,
                    record.created_at.format("%Y-%m-%d %H:%M"),
                    record.kind,
                    preview.replace('\n', " ")
                );
            }
        }
        HistoryCommand::Delete { id } => {
            if !store.delete(&id).await? {
                bail!("no record with id {id}");
            }
            println!("deleted {id}");
        }
        HistoryCommand::Export { out } => {
            let json = store.export().await?;
            match out {
                Some(path) => std::fs::write(&path, json)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => println!("{json}"),
            }
        }
        HistoryCommand::Import { path } => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let count = store.import(&json).await?;
            println!("imported {count} records");
        }
        HistoryCommand::Stats => {
            let stats = store.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            let records = store.list(None).await?;
            let today = Utc::now().date_naive();
            for (day, count) in weekly_activity(&records, today) {
                println!("{day}  {}", "#".repeat(count));
            }
        }
        HistoryCommand::Tasks => {
            for task in store.list_tasks().await? {
                println!(
                    "{}  {}  {} characters saved",
                    task.id,
                    task.timestamp.format("%Y-%m-%d %H:%M"),
                    task.partial_response.chars().count()
                );
            }
        }
    }
    Ok(())
}

/// Read an image file into a data URL
fn read_image(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read image {}", path.display()))?;
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        other => bail!("unsupported image type {:?} for {}", other, path.display()),
    };
    Ok(format!("data:{mime};base64,{}", BASE64.encode(bytes)))
}
