use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mcp_chat::agent::{ChatClient, DEFAULT_SYSTEM_PROMPT};
use mcp_chat::cli::{Cli, CommandHistory, Commands, Repl};
use mcp_chat::config::{self, ChatFileConfig};
use mcp_chat::llm::{AnthropicClient, AnthropicConfig, CompletionService};
use mcp_chat::mcp::McpClientPool;
use mcp_chat::output::{OutputEvent, OutputWriter, TerminalOutput};
use mcp_chat::session::{ChatSession, ChatSettings, SessionStore};

#[tokio::main]
async fn main() {
    // Logs go to stderr so they never mix with streamed output
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let file_config = ChatFileConfig::load().unwrap_or_else(|e| {
        tracing::warn!("Ignoring config file: {:#}", e);
        ChatFileConfig::default()
    });

    let model = file_config.model(cli.model.as_deref());

    match cli.command {
        Some(Commands::Chats) => return run_list_chats(),
        #[cfg(feature = "web")]
        Some(Commands::Web { port }) => {
            let state = mcp_chat::web::AppState {
                store: SessionStore::open_default()?,
                completion: completion_service(&file_config)?,
                launcher: Arc::new(mcp_chat::mcp::ChildProcessLauncher),
                model,
                max_tokens: file_config.max_tokens(),
                max_tool_rounds: file_config.max_tool_rounds(),
                system_prompt: file_config.chat.system_prompt.clone(),
            };
            return mcp_chat::web::serve(state, port).await;
        }
        None => {}
    }

    let completion = completion_service(&file_config)?;
    let servers = gather_servers(&cli)?;
    if cli.agent {
        tracing::info!("Agent mode requested; running the standard tool loop");
    }

    let mut client = ChatClient::new(completion, McpClientPool::default())
        .with_max_tokens(file_config.max_tokens())
        .with_max_tool_rounds(file_config.max_tool_rounds())
        .with_default_system_prompt(Some(
            file_config
                .chat
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        ));
    let failed = client.connect_servers(&servers).await;
    if !failed.is_empty() {
        let output = TerminalOutput::auto();
        for spec in failed {
            output.write(OutputEvent::Warning(format!(
                "Continuing without server \"{}\"",
                spec
            )));
        }
    }

    let result = match (&cli.prompt, &cli.eval) {
        (None, None) => run_interactive(&mut client, &cli, &model, &servers).await,
        (prompt, eval) => {
            let mut result = Ok(());
            if let Some(prompt) = prompt {
                println!("Running prompt: {}", prompt);
                result = run_prompt(&mut client, &cli, &model, &servers, prompt).await;
            }
            if let Some(path) = eval {
                println!("Running evaluation with file: {}", path.display());
                println!("Evaluation mode is not implemented yet.");
            }
            result
        }
    };

    client.cleanup().await;
    result
}

/// Anthropic client; fails when no API key is set
fn completion_service(file_config: &ChatFileConfig) -> Result<Arc<dyn CompletionService>> {
    let api = AnthropicConfig::from_key(std::env::var("ANTHROPIC_API_KEY").ok())?
        .with_base_url(file_config.api_url());
    Ok(Arc::new(AnthropicClient::new(api)))
}

/// Servers from `-s` flags followed by those in the desktop config
fn gather_servers(cli: &Cli) -> Result<Vec<String>> {
    let mut servers = cli.servers.clone();

    if let Some(path) = &cli.config {
        let path: PathBuf = match path {
            Some(path) => path.clone(),
            None => config::default_config_path()?,
        };
        let from_config = config::parse_config_file(&path);
        tracing::info!(
            "Loaded {} server(s) from {}",
            from_config.len(),
            path.display()
        );
        servers.extend(from_config);
    }

    Ok(servers)
}

/// Load the chat named by `--chat`, or start a new one
async fn open_session(
    client: &mut ChatClient,
    cli: &Cli,
    model: &str,
    servers: &[String],
    echo: Option<&dyn OutputWriter>,
) -> Result<(SessionStore, ChatSession)> {
    match &cli.chat {
        Some(path) => {
            let (store, id) = SessionStore::for_file(path)?;
            let mut session = client
                .resume(&store, &id, echo, servers.is_empty())
                .await
                .with_context(|| format!("Failed to load chat file {}", path.display()))?;
            if cli.model.is_some() {
                session.settings.model = model.to_string();
            }
            Ok((store, session))
        }
        None => {
            let mut settings = ChatSettings::with_model(model);
            if !servers.is_empty() {
                settings.servers = Some(servers.to_vec());
            }
            Ok((SessionStore::open_default()?, ChatSession::new(settings)))
        }
    }
}

async fn run_interactive(
    client: &mut ChatClient,
    cli: &Cli,
    model: &str,
    servers: &[String],
) -> Result<()> {
    let output = TerminalOutput::auto();
    let echo: &dyn OutputWriter = &output;
    let (store, mut session) = open_session(client, cli, model, servers, Some(echo)).await?;
    let history = CommandHistory::load(CommandHistory::default_path()?);

    Repl::new(client, &store, &mut session, history, &output)
        .run()
        .await
}

async fn run_prompt(
    client: &mut ChatClient,
    cli: &Cli,
    model: &str,
    servers: &[String],
    prompt: &str,
) -> Result<()> {
    let (store, mut session) = open_session(client, cli, model, servers, None).await?;

    let result = client.process_query(&mut session, prompt).await;
    if let Err(e) = store.save(&mut session) {
        tracing::error!("Failed to save chat file: {}", e);
    }

    let response = result?;
    println!("{}", response);
    Ok(())
}

fn run_list_chats() -> Result<()> {
    let store = SessionStore::open_default()?;
    let chats = store.list()?;
    let output = TerminalOutput::auto();

    if chats.is_empty() {
        output.write(OutputEvent::System("No saved chats.".to_string()));
        return Ok(());
    }

    for chat in chats {
        output.write(OutputEvent::Text(format!(
            "{}  {}  ({} messages, {})",
            chat.id,
            chat.title,
            chat.message_count,
            chat.model.as_deref().unwrap_or("-")
        )));
    }
    Ok(())
}
