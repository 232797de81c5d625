use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use taskboard_session::backend::{DirectoryClient, UserApiClient};
use taskboard_session::config::{AppConfig, ConfigError};
use taskboard_session::router::{Navigation, NavigationGuard};
use taskboard_session::services::registration::{Registrar, Registration, RegistrationError};
use taskboard_session::services::session::{SessionError, SessionSynchronizer};
use taskboard_session::services::types::{Role, ServiceError};
use taskboard_session::state::{SessionState, SessionStore};
use taskboard_session::storage::FileStorage;
use taskboard_session::supabase::SupabaseClient;
use taskboard_session::supabase::auth::SupabaseAuth;
use taskboard_session::supabase::records::PostgrestUserStore;
use tracing_subscriber::EnvFilter;

/// Bound on waiting for the listener to apply a sign-in event.
const EVENT_SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error("timed out waiting for session state to update")]
    Timeout,
}

#[derive(Parser, Debug)]
#[command(name = "taskboard", about = "Taskboard session and navigation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the current session and identity.
    Status,
    /// Run paths through the navigation guard.
    Navigate {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    Login {
        #[arg(long, env = "TASKBOARD_EMAIL")]
        email: String,
        #[arg(long, env = "TASKBOARD_PASSWORD")]
        password: String,
    },
    Logout,
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "staff")]
        role: Role,
        #[arg(long)]
        name: String,
        #[arg(long)]
        team: Option<String>,
        #[arg(long)]
        department: Option<String>,
    },
}

struct App {
    config: AppConfig,
    auth: Arc<SupabaseAuth>,
    records: Arc<PostgrestUserStore>,
    synchronizer: Arc<SessionSynchronizer>,
}

impl App {
    fn build(config: AppConfig) -> Result<Self, CliError> {
        let storage = Arc::new(FileStorage::open(&config.storage_path));
        let client = SupabaseClient::new(&config.supabase, config.timeouts)?;
        let auth = Arc::new(
            SupabaseAuth::new(client.clone(), storage.clone()).with_refresh_margin(config.refresh_margin_secs),
        );
        let records = Arc::new(PostgrestUserStore::new(client));
        let synchronizer = Arc::new(SessionSynchronizer::new(
            SessionStore::new(),
            auth.clone(),
            records.clone(),
            storage,
        ));
        Ok(Self { config, auth, records, synchronizer })
    }

    fn store(&self) -> &SessionStore {
        self.synchronizer.store()
    }

    /// Wait until the listener has applied a state matching `pred`.
    async fn settle(&self, pred: impl FnMut(&SessionState) -> bool) -> Result<(), CliError> {
        let mut rx = self.store().subscribe();
        tokio::time::timeout(EVENT_SETTLE_TIMEOUT, rx.wait_for(pred))
            .await
            .map_err(|_| CliError::Timeout)?
            .map_err(|_| CliError::Timeout)?;
        self.synchronizer.flush_background().await;
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = App::build(AppConfig::from_env()?)?;
    app.synchronizer.initialize().await?;

    let result = run(&app, cli.command).await;
    app.synchronizer.shutdown().await;
    result
}

async fn run(app: &App, command: Command) -> Result<(), CliError> {
    match command {
        Command::Status => {
            app.synchronizer.flush_background().await;
            print_state(&app.store().snapshot());
            Ok(())
        }
        Command::Navigate { paths } => {
            let guard = NavigationGuard::new(app.store().clone());
            for path in paths {
                match guard.navigate(&path).await {
                    Navigation::Allowed(target) => println!("{path} -> {target}"),
                    Navigation::Redirected { to, .. } => println!("{path} -> {to} (redirected)"),
                }
            }
            Ok(())
        }
        Command::Login { email, password } => {
            let session = app.auth.sign_in_with_password(&email, &password).await?;
            let token = session.access_token;
            app.settle(|s| s.session.as_ref().is_some_and(|s| s.access_token == token)).await?;
            print_state(&app.store().snapshot());
            Ok(())
        }
        Command::Logout => {
            app.auth.sign_out().await?;
            app.settle(|s| s.session.is_none()).await?;
            println!("signed out");
            Ok(())
        }
        Command::Register { email, password, role, name, team, department } => {
            let users = UserApiClient::new(&app.config.user_api_url, app.config.timeouts)?;
            let directory = DirectoryClient::new(&app.config.team_api_url, &app.config.dept_api_url, app.config.timeouts)?;
            let registrar = Registrar::new(app.auth.clone(), app.records.clone(), users, directory);
            let form = Registration { email, password, role, name, team, department };
            let registered = registrar.register(&form).await?;
            println!("registered {} as userid {} ({})", registered.record.id, registered.record.userid, registered.record.role);
            if registered.session.is_none() {
                println!("check your inbox to verify the address before signing in");
            }
            Ok(())
        }
    }
}

fn print_state(state: &SessionState) {
    println!("logged_in: {}", state.is_logged_in());
    if let Some(user) = &state.user {
        println!("user: {} {}", user.id, user.email.as_deref().unwrap_or("-"));
    }
    match state.identity() {
        Some(identity) => println!("userid: {}\nrole: {}", identity.user_id, identity.role),
        None => println!("userid: -\nrole: -"),
    }
}
