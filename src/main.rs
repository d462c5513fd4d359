// ABOUTME: Entry point for the waypoint binary.
// ABOUTME: Parses CLI arguments, initializes tracing, and drives one session against the backend.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde_json::json;

use waypoint_core::{EndpointConfig, OAuthProvider, UserId, UserType};
use waypoint_session::SessionContext;

#[derive(Debug, Parser)]
#[command(name = "waypoint", version, about = "Talk to an auth backend whose route shape is uncertain")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Credentials for commands that sign in before acting.
#[derive(Debug, clap::Args)]
struct Credentials {
    #[arg(long, env = "WAYPOINT_EMAIL")]
    email: Option<String>,
    #[arg(long, env = "WAYPOINT_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the resolved endpoint configuration.
    Config,
    /// Ask the backend who is signed in.
    Whoami,
    /// Sign in and print the resulting session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "WAYPOINT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and print the resulting session.
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "WAYPOINT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign in (when credentials are given) and sign out again.
    Logout {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Admin user management.
    Users {
        #[command(subcommand)]
        action: UsersAction,
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Print the social login URL for a provider (google, naver).
    OauthUrl { provider: String },
}

#[derive(Debug, Subcommand)]
enum UsersAction {
    /// List all users.
    List,
    /// Change a user's type.
    SetType { id: String, user_type: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = EndpointConfig::resolve();

    let default_filter = if config.mode.is_development() {
        "waypoint=debug,waypoint_client=debug,waypoint_session=debug"
    } else {
        "waypoint=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(base_url = %config.base_url, prefix = %config.route_prefix, "waypoint starting up");

    match cli.command {
        Command::Config => print_json(&config)?,
        Command::OauthUrl { provider } => {
            let provider: OAuthProvider = provider.parse()?;
            println!("{}", config.oauth_login_url(provider));
        }
        Command::Whoami => {
            let context = start(&config).await?;
            print_json(&context.state())?;
        }
        Command::Login { email, password } => {
            let context = start(&config).await?;
            let outcome = context.login(&email, &password).await;
            print_json(&json!({ "outcome": outcome, "session": context.state() }))?;
            if !outcome.success {
                std::process::exit(1);
            }
        }
        Command::Register {
            name,
            email,
            password,
        } => {
            let context = start(&config).await?;
            let outcome = context.register(&name, &email, &password).await;
            print_json(&json!({ "outcome": outcome, "session": context.state() }))?;
            if !outcome.success {
                std::process::exit(1);
            }
        }
        Command::Logout { credentials } => {
            let context = start(&config).await?;
            sign_in(&context, &credentials).await?;
            context.logout().await;
            print_json(&context.state())?;
        }
        Command::Users {
            action,
            credentials,
        } => {
            let context = start(&config).await?;
            sign_in(&context, &credentials).await?;
            match action {
                UsersAction::List => {
                    let users = context.admin().list_users().await?;
                    print_json(&users)?;
                }
                UsersAction::SetType { id, user_type } => {
                    let id = match id.parse::<i64>() {
                        Ok(n) => UserId::Number(n),
                        Err(_) => UserId::Text(id),
                    };
                    let updated = context
                        .admin()
                        .change_user_type(&id, &UserType::parse(&user_type))
                        .await?;
                    print_json(&json!({ "updated": updated }))?;
                }
            }
        }
    }

    Ok(())
}

/// Start the session and wait for the startup identity check.
async fn start(config: &EndpointConfig) -> anyhow::Result<SessionContext> {
    let context = SessionContext::start(config).context("failed to set up HTTP transport")?;
    context.settled().await;
    Ok(context)
}

/// Sign in when both credentials were supplied; otherwise act anonymously.
async fn sign_in(context: &SessionContext, credentials: &Credentials) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (&credentials.email, &credentials.password) else {
        return Ok(());
    };
    let outcome = context.login(email, password).await;
    if !outcome.success {
        bail!("login failed: {}", outcome.message);
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
