//! Budget RAG CLI
//!
//! A command-line interface for the budget document assistant.

use anyhow::{Context, Result};
use async_trait::async_trait;
use budget_rag_agents::{
    handle_event, setup_memory, BudgetAgent, HttpAnnotator, HttpKnowledgeBase, HttpMemoryService,
    HttpModelRuntime, Responder, SearchSettings, SearchTool, ServiceSettings,
};
use budget_rag_storage::{upload_folder, HttpObjectStore, PDF_EXTENSIONS};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Budget RAG - ask questions about government budget documents
#[derive(Parser)]
#[command(name = "budget-rag")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the knowledge base and print the tool output
    Search {
        /// Search query
        query: String,
    },

    /// Ask the budget agent one question
    Ask {
        /// Question for the agent
        question: String,
    },

    /// Interactive chat with the budget agent
    Chat,

    /// Run the API handler on an event (reads stdin if no path is given)
    Handle {
        /// Path to an event JSON file
        path: Option<PathBuf>,
    },

    /// Upload local PDFs to the input area of the bucket
    Upload {
        /// Local folder holding the PDFs
        folder: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Setup logging. Stdout is reserved for command output.
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let services = ServiceSettings::from_env();
    let settings = SearchSettings::from_env();

    match cli.command {
        Commands::Search { query } => {
            let tool = build_search_tool(&services, settings);
            println!("{}", tool.search_knowledge_base(&query).await);
        }
        Commands::Ask { question } => {
            let agent = build_agent(&services, settings).await;
            let answer = agent.ask(&question).await.context("Agent failed to answer")?;
            println!("{}", answer);
        }
        Commands::Chat => {
            cmd_chat(&services, settings).await?;
        }
        Commands::Handle { path } => {
            cmd_handle(services, settings, path).await?;
        }
        Commands::Upload { folder } => {
            cmd_upload(&services, &settings, folder).await?;
        }
    }

    Ok(())
}

fn build_search_tool(services: &ServiceSettings, settings: SearchSettings) -> SearchTool {
    let mut knowledge_base = HttpKnowledgeBase::new(&services.knowledge_base_endpoint);
    let mut store = HttpObjectStore::new(&services.storage_endpoint);
    if let Some(token) = &services.bearer_token {
        knowledge_base = knowledge_base.with_bearer_token(token);
        store = store.with_bearer_token(token);
    }

    let tool = SearchTool::new(Arc::new(knowledge_base), Arc::new(store), settings);
    match &services.annotation_url {
        Some(url) => {
            let mut annotator = HttpAnnotator::new(url);
            if let Some(token) = &services.bearer_token {
                annotator = annotator.with_bearer_token(token);
            }
            tool.with_annotator(Arc::new(annotator))
        }
        None => tool,
    }
}

async fn build_agent(services: &ServiceSettings, settings: SearchSettings) -> BudgetAgent {
    let mut runtime = HttpModelRuntime::new(&services.runtime_endpoint);
    let mut memory =
        HttpMemoryService::new(&services.memory_control_endpoint, &services.memory_endpoint);
    if let Some(token) = &services.bearer_token {
        runtime = runtime.with_bearer_token(token);
        memory = memory.with_bearer_token(token);
    }

    let search = build_search_tool(services, settings);
    let agent = BudgetAgent::new(Arc::new(runtime), search, &services.model_id);

    match setup_memory(&memory).await {
        Some(session) => agent.with_memory(Arc::new(memory), session),
        None => agent,
    }
}

/// Builds the agent only once a request has passed validation
struct OnDemandAgent {
    services: ServiceSettings,
    settings: SearchSettings,
}

#[async_trait]
impl Responder for OnDemandAgent {
    async fn respond(&self, query: &str) -> budget_rag_agents::Result<String> {
        let agent = build_agent(&self.services, self.settings.clone()).await;
        agent.ask(query).await
    }
}

async fn cmd_chat(services: &ServiceSettings, settings: SearchSettings) -> Result<()> {
    let agent = build_agent(services, settings).await;

    println!("{}", agent.name());
    match agent.session() {
        Some(session) => println!("Memory: {} (session {})", session.memory_id, session.session_id),
        None => println!("Memory: unavailable, answers will not be remembered"),
    }
    println!("Interactive chat started. Type 'exit' to quit.");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("User: ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            println!("Ending session.");
            break;
        }

        match agent.ask(input).await {
            Ok(answer) => println!("Agent: {}", answer),
            Err(e) => println!("Error: {}", e),
        }
        println!();
    }

    Ok(())
}

async fn cmd_handle(
    services: ServiceSettings,
    settings: SearchSettings,
    path: Option<PathBuf>,
) -> Result<()> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read event from {}", path.display()))?,
        None => {
            let mut raw = String::new();
            io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read event from stdin")?;
            raw
        }
    };
    let event: serde_json::Value =
        serde_json::from_str(&raw).context("Event is not valid JSON")?;

    let responder = OnDemandAgent { services, settings };
    let response = handle_event(&event, &responder).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}

async fn cmd_upload(
    services: &ServiceSettings,
    settings: &SearchSettings,
    folder: PathBuf,
) -> Result<()> {
    if !folder.exists() {
        println!("Folder not found: {}", folder.display());
        return Ok(());
    }
    let Some(bucket) = settings.bucket.as_deref() else {
        anyhow::bail!("S3 bucket not configured. Please set S3_BUCKET environment variable.");
    };

    let mut store = HttpObjectStore::new(&services.storage_endpoint);
    if let Some(token) = &services.bearer_token {
        store = store.with_bearer_token(token);
    }

    let prefix = upload_prefix(&folder);
    info!("Uploading {} to s3://{}/{}", folder.display(), bucket, prefix);
    let count = upload_folder(&store, &folder, &prefix, bucket, PDF_EXTENSIONS)
        .await
        .with_context(|| format!("Failed to upload {}", folder.display()))?;

    println!("✓ Uploaded {} file(s) to s3://{}/{}", count, bucket, prefix);
    println!();
    println!("Waiting for automatic parsing to complete...");
    println!("   (Uploaded PDFs are converted to chunks and markdown downstream)");

    Ok(())
}

/// Key prefix for an uploaded folder: `input/` plus the folder's own name.
/// Relative and absolute spellings of the same folder give the same prefix.
fn upload_prefix(folder: &Path) -> String {
    let resolved = folder.canonicalize().unwrap_or_else(|_| folder.to_path_buf());
    let name = resolved
        .components()
        .rev()
        .find_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        });

    match name {
        Some(name) => format!("input/{}", name),
        None => "input".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_prefix_uses_folder_name() {
        let root = tempfile::tempdir().unwrap();
        let folder = root.path().join("gov_data");
        std::fs::create_dir(&folder).unwrap();

        assert_eq!(upload_prefix(&folder), "input/gov_data");
        assert_eq!(upload_prefix(&folder.join(".")), "input/gov_data");
        assert_eq!(upload_prefix(&root.path().join("gov_data/")), "input/gov_data");
    }

    #[test]
    fn test_upload_prefix_for_unresolved_paths() {
        assert_eq!(upload_prefix(Path::new("./missing_folder")), "input/missing_folder");
        assert_eq!(upload_prefix(Path::new("missing_folder/")), "input/missing_folder");
        assert_eq!(upload_prefix(Path::new("/")), "input");
    }
}
