use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use porttrack_core::{
    config::{AuthzConfig, Config},
    jwt::{AccessTokenRequest, JwtManager},
    policy::PolicyRegistry,
    server,
    state::AppState,
    telemetry,
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "porttrack-core", version, about = "PortTrack authorization service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Print the effective policy registry as JSON
    Policies,
    /// Mint a signed access token for local development
    MintToken(MintTokenArgs),
}

#[derive(Debug, Args)]
struct MintTokenArgs {
    /// Subject claim
    #[arg(long)]
    sub: String,
    /// Role claim; repeat for several
    #[arg(long = "role")]
    roles: Vec<String>,
    /// Permission claim; repeat for several
    #[arg(long = "permission")]
    permissions: Vec<String>,
    #[arg(long)]
    user_id: Option<i64>,
    #[arg(long)]
    port_id: Option<i64>,
    /// Token lifetime in seconds
    #[arg(long)]
    ttl_secs: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Policies => print_policies(),
        Command::MintToken(args) => mint_token(args),
    }
}

async fn serve() -> Result<()> {
    let config = Config::from_env()?;
    let prometheus_handle = telemetry::init(&config.telemetry)?;

    info!("Starting PortTrack Core");
    info!("HTTP server listening on {}", config.http_addr());

    let state = AppState::from_config(config)?.with_prometheus_handle(prometheus_handle);
    server::run(state).await
}

fn print_policies() -> Result<()> {
    let registry = PolicyRegistry::load(&AuthzConfig::from_env())?;
    println!("{}", serde_json::to_string_pretty(&registry.to_json())?);
    Ok(())
}

fn mint_token(args: MintTokenArgs) -> Result<()> {
    let config = Config::from_env()?;
    if config.is_production() {
        bail!("mint-token is disabled when ENVIRONMENT=production");
    }

    let manager = JwtManager::new(config.jwt)?;
    let token = manager.create_access_token(&AccessTokenRequest {
        sub: args.sub,
        roles: args.roles,
        permissions: args.permissions,
        user_id: args.user_id,
        port_id: args.port_id,
        ttl_secs: args.ttl_secs,
    })?;
    println!("{}", token);
    Ok(())
}
