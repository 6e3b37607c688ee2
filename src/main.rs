use std::sync::Arc;

use clap::{Arg, ArgAction, Command};
use dotenv::dotenv;
use time::{Duration, OffsetDateTime};
use tokio::net::{TcpListener, UnixListener};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use promptlab::{
    api::{self, AppState},
    catalog,
    config::{Config, TutorKind},
    store::{MemoryStore, PgStore, Store},
    tutor::{ClaudeTutor, PromptCoach, ScriptedTutor, Tutor},
};

fn cli() -> Command {
    Command::new("promptlab")
        .about("Prompt-engineering curriculum server")
        .arg(
            Arg::new("port")
                .help("TCP port to listen on")
                .default_value("8090"),
        )
        .arg(
            Arg::new("unix")
                .long("unix")
                .value_name("PATH")
                .help("Listen on a Unix socket instead of TCP"),
        )
        .arg(
            Arg::new("memory")
                .long("memory")
                .action(ArgAction::SetTrue)
                .help("Run against a seeded in-memory store"),
        )
}

async fn memory_store() -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    let store = MemoryStore::new();
    catalog::seed(&store).await?;

    let user_id = Uuid::new_v4();
    let token = store
        .issue_token(user_id, OffsetDateTime::now_utc() + Duration::days(30))
        .await?;
    info!(user_id = %user_id, token = %token, "in-memory store ready with a development token");

    Ok(Arc::new(store))
}

fn tutors(
    config: &Config,
) -> Result<(Arc<dyn Tutor>, Option<Arc<dyn PromptCoach>>), Box<dyn std::error::Error>> {
    match config.tutor {
        TutorKind::Claude => {
            let claude = Arc::new(ClaudeTutor::new(&config.anthropic)?);
            let tutor: Arc<dyn Tutor> = claude.clone();
            let coach: Arc<dyn PromptCoach> = claude;
            Ok((tutor, Some(coach)))
        }
        TutorKind::Scripted => {
            let coach = match ClaudeTutor::new(&config.anthropic) {
                Ok(claude) => Some(Arc::new(claude) as Arc<dyn PromptCoach>),
                Err(e) => {
                    warn!(error = %e, "prompt coaching disabled");
                    None
                }
            };
            Ok((Arc::new(ScriptedTutor), coach))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("promptlab=info,tower_http=info")),
        )
        .init();

    let matches = cli().get_matches();
    let config = Config::from_env()?;

    let store = if matches.get_flag("memory") {
        memory_store().await?
    } else {
        let store = PgStore::connect(config.require_database_url()?).await?;
        store.migrate().await?;
        Arc::new(store) as Arc<dyn Store>
    };

    let (tutor, coach) = tutors(&config)?;
    info!(tutor = tutor.name(), coaching = coach.is_some(), "tutor configured");

    let state = Arc::new(AppState {
        store,
        tutor,
        coach,
        dialogue: config.dialogue,
    });
    let app = api::router(state, &config.static_dir);

    info!("Initialized routes");

    if let Some(socket_path) = matches.get_one::<String>("unix") {
        // delete the file before binding
        tokio::fs::remove_file(socket_path).await.ok();
        let listener = UnixListener::bind(socket_path)?;

        info!("Starting server on Unix socket: {}", socket_path);
        axum::serve(listener, app.into_make_service()).await?;
    } else {
        let port = matches
            .get_one::<String>("port")
            .map(String::as_str)
            .unwrap_or("8090");
        let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
        info!("Starting server on port {}", port);
        axum::serve(listener, app.into_make_service()).await?;
    }

    Ok(())
}
