use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use clap::{Args, Parser, Subcommand};
use cliauth::{
    AuthError, Authenticator, AuthenticatorConfig, CancellationToken, CredentialStore,
    DEFAULT_API_URL, DEFAULT_CLIENT_ID, spawn_interrupt_watcher,
};

#[derive(Debug, Parser)]
#[command(
    name = "cliauth",
    version,
    about = "Log in to Polar Signals from the command line."
)]
struct Cli {
    /// Override the credentials file location
    #[arg(long, global = true, env = "CLIAUTH_CREDENTIALS")]
    credentials: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Authentication commands
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
}

#[derive(Debug, Subcommand)]
enum AuthAction {
    /// Log in through the browser and save credentials
    Login(LoginArgs),
    /// Show authentication status
    Status,
}

#[derive(Debug, Args)]
struct LoginArgs {
    /// Print the URL instead of opening a browser
    #[arg(long)]
    no_open: bool,

    /// API base URL used for OAuth discovery
    #[arg(long, env = "CLIAUTH_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// OAuth client ID
    #[arg(long, env = "CLIAUTH_CLIENT_ID", default_value = DEFAULT_CLIENT_ID)]
    client_id: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("CLIAUTH_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AuthError> {
    let store = match cli.credentials {
        Some(path) => CredentialStore::new(path),
        None => CredentialStore::default_location()?,
    };

    match cli.command {
        Command::Auth { action } => match action {
            AuthAction::Login(args) => login(args, &store).await,
            AuthAction::Status => status(&store),
        },
    }
}

async fn login(args: LoginArgs, store: &CredentialStore) -> Result<(), AuthError> {
    let config = AuthenticatorConfig::new(args.api_url)
        .with_client_id(args.client_id)
        .with_no_open(args.no_open);
    let authenticator = Authenticator::new(config)?;

    let cancel = CancellationToken::new();
    let watcher = spawn_interrupt_watcher(cancel.clone());
    let result = authenticator.login(&cancel).await;
    cancel.cancel();
    let _ = watcher.await;

    let token = result?;
    store.save(&token)?;

    println!(
        "Successfully logged in!\nCredentials saved to {}",
        store.path().display()
    );
    Ok(())
}

fn status(store: &CredentialStore) -> Result<(), AuthError> {
    let token = match store.load() {
        Ok(Some(token)) => token,
        other => {
            if let Err(err) = other {
                tracing::debug!(error = %err, "unreadable credentials");
            }
            println!("Not logged in.");
            println!("Run 'cliauth auth login' to authenticate.");
            return Ok(());
        }
    };

    println!("Logged in.");
    println!("Credentials file: {}", store.path().display());
    println!("Token type: {}", token.token_type);

    if let Some(expiry) = token.expiry {
        if expiry <= Utc::now() {
            println!("Token status: Expired");
        } else {
            println!(
                "Token expires: {}",
                expiry.to_rfc3339_opts(SecondsFormat::Secs, true)
            );
        }
    }

    if token.refresh_token.is_some() {
        println!("Refresh token: Present");
    }

    Ok(())
}
