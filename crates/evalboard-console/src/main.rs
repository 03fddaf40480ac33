#![allow(non_snake_case)]

mod config {
    use evalboard_client::ClientConfig;
    use serde::Deserialize;

    #[derive(Deserialize, Clone, Debug, Default)]
    pub struct Config {
        #[serde(default)]
        pub server: ServerConfig,
        #[serde(default)]
        pub auth: AuthConfig,
        #[serde(default)]
        pub client: ClientConfig,
    }

    #[derive(Deserialize, Clone, Debug)]
    #[serde(default)]
    pub struct ServerConfig {
        pub bind: String,
        pub port: u16,
    }

    #[derive(Deserialize, Clone, Debug)]
    #[serde(default)]
    pub struct AuthConfig {
        pub admin_username: String,
        pub admin_email: String,
        pub admin_password: String,
        pub access_token_ttl_secs: u64,
    }

    impl Default for ServerConfig {
        fn default() -> Self {
            Self {
                bind: "127.0.0.1".into(),
                port: 8000,
            }
        }
    }

    impl Default for AuthConfig {
        fn default() -> Self {
            Self {
                admin_username: "admin".into(),
                admin_email: "admin@example.com".into(),
                admin_password: "change-me-on-first-run".into(),
                access_token_ttl_secs: 900,
            }
        }
    }

    pub fn load(path: &str) -> Config {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("failed to parse config {path}: {e}, using defaults");
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("failed to read config {path}: {e}, using defaults");
                Config::default()
            }
        }
    }

}

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use evalboard_api::middleware::auth::AppState;
use evalboard_client::{ClientContext, ClientError, FileTokenStore, StorageError};
use evalboard_types::{FilterUpdate, LoginRequest, Priority, SortField, SortOrder};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "evalboard")]
#[command(author, version, about = "TweetEval dashboard client and development backend", long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = "config.example.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the in-memory development backend
    Serve,
    /// Log in and store the token pair
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Show the user behind the stored session
    Whoami,
    /// End the session and forget stored tokens
    Logout,
    /// List tasks with filters
    Tasks {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        status: Vec<String>,
        #[arg(long)]
        priority: Vec<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        due_from: Option<NaiveDate>,
        #[arg(long)]
        due_to: Option<NaiveDate>,
        #[arg(long)]
        overdue: bool,
        #[arg(long)]
        completed: bool,
        #[arg(long)]
        sort_by: Option<String>,
        #[arg(long)]
        sort_order: Option<String>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        page_size: Option<u32>,
    },
}

#[derive(Debug, Error)]
enum ConsoleError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Invalid(String),
}

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let appConfig = config::load(&args.config);

    match run(args.command, appConfig).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, appConfig: config::Config) -> Result<(), ConsoleError> {
    if let Command::Serve = command {
        return serve(appConfig).await;
    }

    let storage = Arc::new(FileTokenStore::new(&appConfig.client.token_path)?);
    let context = ClientContext::new(&appConfig.client, storage)?;

    let result = match command {
        Command::Serve => Ok(()),
        Command::Login { email, password } => login(&context, email, password).await,
        Command::Whoami => whoami(&context).await,
        Command::Logout => {
            context.session.logout().await;
            println!("logged out");
            Ok(())
        }
        Command::Tasks {
            search,
            status,
            priority,
            tags,
            due_from,
            due_to,
            overdue,
            completed,
            sort_by,
            sort_order,
            page,
            page_size,
        } => {
            let mut updates = vec![
                FilterUpdate::Search(search.unwrap_or_default()),
                FilterUpdate::Status(status),
                FilterUpdate::Priority(parse_priorities(&priority)?),
                FilterUpdate::Tags(tags),
                FilterUpdate::DueDateFrom(due_from),
                FilterUpdate::DueDateTo(due_to),
                FilterUpdate::OverdueOnly(overdue),
                FilterUpdate::CompletedOnly(completed),
            ];
            if let Some(raw) = sort_by {
                let field = SortField::parse(&raw)
                    .ok_or_else(|| ConsoleError::Invalid(format!("unknown sort field: {raw}")))?;
                updates.push(FilterUpdate::SortBy(field));
            }
            if let Some(raw) = sort_order {
                let order = SortOrder::parse(&raw)
                    .ok_or_else(|| ConsoleError::Invalid(format!("unknown sort order: {raw}")))?;
                updates.push(FilterUpdate::SortOrder(order));
            }
            if let Some(size) = page_size {
                updates.push(FilterUpdate::PageSize(size));
            }
            list_tasks(&context, updates, page).await
        }
    };

    for notification in context.notifications.list() {
        eprintln!("{}", notification.message);
    }
    result
}

async fn serve(appConfig: config::Config) -> Result<(), ConsoleError> {
    let appState = AppState::new(Duration::from_secs(appConfig.auth.access_token_ttl_secs));
    match appState.accounts.create_user(
        &appConfig.auth.admin_username,
        &appConfig.auth.admin_email,
        &appConfig.auth.admin_password,
        true,
    ) {
        Ok(user) => info!("seeded admin account {}", user.email),
        Err(e) => warn!("failed to seed admin account: {e}"),
    }

    let app = evalboard_api::api_router(appState).layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", appConfig.server.bind, appConfig.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {addr}");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

async fn login(context: &ClientContext, email: String, password: String) -> Result<(), ConsoleError> {
    let form = LoginRequest {
        email,
        password,
        remember: false,
    };
    let response = context.session.login(&form).await?;
    println!(
        "logged in as {} <{}>",
        response.user.username, response.user.email
    );
    Ok(())
}

async fn whoami(context: &ClientContext) -> Result<(), ConsoleError> {
    context.session.check_status().await;
    match context.session.user() {
        Some(user) => {
            println!("{} <{}>", user.username, user.email);
            if let Some(organization) = user.organization {
                println!("organization: {organization}");
            }
            println!("verified: {}", user.is_verified);
        }
        None => println!("not logged in"),
    }
    Ok(())
}

async fn list_tasks(
    context: &ClientContext,
    updates: Vec<FilterUpdate>,
    page: Option<u32>,
) -> Result<(), ConsoleError> {
    context
        .tasks
        .update_filters_at(updates, page.unwrap_or(1))
        .await?;

    let state = context.tasks.snapshot();
    for task in &state.tasks {
        let due = task
            .due_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".into());
        let marker = if task.is_overdue { "!" } else { " " };
        println!(
            "{:>4} {marker} {:<12} {:<7} {:<10}  {}",
            task.id,
            task.status,
            task.priority.as_str(),
            due,
            task.title
        );
    }
    println!(
        "page {} of {} ({} tasks, {} active filters)",
        state.filters.page,
        state.total_pages,
        state.total_count,
        state.filters.active_filter_count()
    );
    Ok(())
}

fn parse_priorities(raw: &[String]) -> Result<Vec<Priority>, ConsoleError> {
    raw.iter()
        .map(|p| {
            Priority::parse(p).ok_or_else(|| ConsoleError::Invalid(format!("unknown priority: {p}")))
        })
        .collect()
}
