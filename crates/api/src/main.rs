//! AgriOps console entry point: session management from the command line.

use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use url::Url;

use agriops_api::GatewayClient;
use agriops_session::{AuthConfig, AuthScope, FileStorage, IdentityProvider, LogNavigator, use_auth};

#[derive(Parser)]
#[command(name = "agriops-console")]
#[command(about = "AgriOps admin console session tools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current session (default)
    Status,
    /// List the mock personas
    Personas,
    /// Sign in; with the mock provider pass a persona id
    Login { persona: Option<String> },
    /// Finish an external login with the URL the browser was sent back to
    Callback { url: Url },
    /// Sign out and clear stored credentials
    Logout,
    /// Print a valid access token, renewing it if needed
    Token,
    /// GET a gateway path with the current credential and print the JSON
    Get { path: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    agriops_observability::init();

    let config = AuthConfig::from_env().context("invalid auth configuration")?;
    let storage = FileStorage::in_default_location()?;
    tracing::debug!(dir = %storage.dir().display(), provider = config.provider_kind().as_str(), "starting console");

    let scope = AuthScope::new();
    scope
        .mount_and_bootstrap(IdentityProvider::from_config(
            &config,
            Arc::new(storage),
            Arc::new(LogNavigator),
        ))
        .await;
    let auth = use_auth(&scope);

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => match auth.user() {
            Some(user) => println!(
                "signed in as {} <{}> ({}), {} permission(s)",
                user.display_name(),
                user.email(),
                user.primary_role(),
                user.permissions().len()
            ),
            None => println!("not signed in ({} provider)", auth.provider().kind().as_str()),
        },
        Commands::Personas => {
            let personas = auth.personas();
            if personas.is_empty() {
                bail!("the {} provider has no personas", auth.provider().kind().as_str());
            }
            for persona in personas {
                println!("{:<20} {}", persona.persona_id(), persona.label());
            }
        }
        Commands::Login { persona: Some(id) } => {
            let identity = auth.select_persona(&id).await?;
            println!("signed in as {} ({})", identity.display_name(), identity.primary_role());
        }
        Commands::Login { persona: None } => {
            auth.login().await?;
            if auth.show_login_selector() {
                println!("choose a persona:");
                for persona in auth.personas() {
                    println!("  {:<20} {}", persona.persona_id(), persona.label());
                }
            }
        }
        Commands::Callback { url } => {
            let Some(handler) = auth.provider().redirect_handler() else {
                bail!("callbacks are only used by the external provider");
            };
            let identity = handler.complete_login_from_url(&url).await?;
            println!("signed in as {} ({})", identity.display_name(), identity.primary_role());
        }
        Commands::Logout => {
            auth.logout().await?;
            println!("signed out");
        }
        Commands::Token => {
            let credential = auth.get_access_token().await?;
            println!("{}", credential.as_str());
        }
        Commands::Get { path } => {
            let gateway = GatewayClient::from_env(auth.clone()).context("invalid GATEWAY_BASE_URL")?;
            let body: serde_json::Value = gateway.get_json(&path).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}
