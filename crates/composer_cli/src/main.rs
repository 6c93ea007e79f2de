use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use composer::logging::init_tracing;
use composer::{ComposeRequest, Composer, ComposerConfig};
use composer_cli::{commands, providers};
use generation::cancel_signal;
use session_store::{ChatStore, FileStore};
use signal_hook::consts::{SIGINT, SIGTERM};

#[derive(Parser)]
#[command(name = "composer")]
#[command(about = "Chat-driven artifact composer with live streamed replies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage chat sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// List a session's messages, oldest first
    Messages { session_id: String },
    /// Send one request and stream the reply as JSON lines
    Send(SendArgs),
}

#[derive(Subcommand)]
enum SessionAction {
    /// Create an untitled session
    Create,
    /// List sessions, oldest first
    List,
    /// Show one session
    Show { session_id: String },
    /// Set a session title
    Rename { session_id: String, title: String },
    /// Delete a session and its messages
    Delete { session_id: String },
}

#[derive(Args)]
struct SendArgs {
    session_id: String,
    /// Request text
    #[arg(long, conflicts_with = "stdin_json")]
    content: Option<String>,
    /// File holding the artifact as the user currently sees it
    #[arg(long, conflicts_with = "stdin_json")]
    artifact_file: Option<PathBuf>,
    /// Part of the artifact the request refers to
    #[arg(long, conflicts_with = "stdin_json")]
    selected_text: Option<String>,
    /// Ask for a rich HTML artifact instead of Markdown
    #[arg(long, conflicts_with = "stdin_json")]
    document_editor: bool,
    /// Read `{content, artifact, selectedText, isDocumentEditor}` from stdin
    #[arg(long)]
    stdin_json: bool,
}

impl SendArgs {
    fn into_request(self) -> Result<ComposeRequest> {
        if self.stdin_json {
            let mut body = String::new();
            io::stdin()
                .read_to_string(&mut body)
                .context("failed to read request body from stdin")?;
            return Ok(ComposeRequest::from_json(&body)?);
        }

        let Some(content) = self.content else {
            bail!("either --content or --stdin-json is required");
        };
        let artifact = match &self.artifact_file {
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("failed to read artifact file {}", path.display()))?,
            None => String::new(),
        };
        let request = ComposeRequest::new(content)
            .with_artifact(artifact)
            .with_selected_text(self.selected_text.unwrap_or_default())
            .document_editor(self.document_editor);
        request.validate()?;
        Ok(request)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ComposerConfig::from_env()?;
    init_tracing(config.log_filter.as_deref());

    let store = Arc::new(
        FileStore::open(&config.store_dir)
            .with_context(|| format!("failed to open store at {}", config.store_dir.display()))?,
    );
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Session { action } => match action {
            SessionAction::Create => commands::create_session(store.as_ref(), &mut out)?,
            SessionAction::List => commands::list_sessions(store.as_ref(), &mut out)?,
            SessionAction::Show { session_id } => {
                commands::show_session(store.as_ref(), &session_id, &mut out)?
            }
            SessionAction::Rename { session_id, title } => {
                commands::rename_session(store.as_ref(), &session_id, &title, &mut out)?
            }
            SessionAction::Delete { session_id } => {
                commands::delete_session(store.as_ref(), &session_id)?
            }
        },
        Commands::Messages { session_id } => {
            commands::list_messages(store.as_ref(), &session_id, &mut out)?
        }
        Commands::Send(args) => {
            let session_id = args.session_id.clone();
            let request = args.into_request()?;
            let provider = providers::provider_from_config(&config)?;
            let store: Arc<dyn ChatStore> = store;
            let composer = Composer::new(store, provider).with_settings(config.settings());

            let cancel = cancel_signal();
            for signal in [SIGINT, SIGTERM] {
                signal_hook::flag::register(signal, Arc::clone(&cancel))
                    .context("failed to install signal handler")?;
            }

            commands::send(&composer, &session_id, &request, &cancel, &mut out)?;
        }
    }

    Ok(())
}
