//! # Tableside Entry Point
//!
//! `serve` runs the API. The remaining subcommands bootstrap local setups:
//! applying migrations, registering a tenant, loading its menu and minting
//! bearer tokens in place of the external identity provider.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tableside::{
    auth::{JwtKeys, Role},
    config::ConfigLoader,
    db,
    repositories::TenantRepository,
    seed::{MenuSeed, seed_menu},
    server::run_server,
    telemetry,
};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "tableside", version, about = "Restaurant ordering service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Register a restaurant
    CreateTenant {
        /// Public code printed in QR URLs and display codes
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: String,
    },
    /// Load menu items from a JSON seed file; existing item codes are skipped
    SeedMenu {
        #[arg(long)]
        file: PathBuf,
    },
    /// Mint a bearer token signed with the configured secret
    IssueToken {
        #[arg(long)]
        subject: String,
        #[arg(long, value_enum)]
        role: RoleArg,
        #[arg(long)]
        tenant_id: Option<Uuid>,
        #[arg(long, default_value_t = 12)]
        ttl_hours: i64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Owner,
    Staff,
    Admin,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Owner => Role::Owner,
            RoleArg::Staff => Role::Staff,
            RoleArg::Admin => Role::Admin,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    telemetry::init_tracing(&config).context("initializing telemetry")?;

    if let Ok(redacted) = config.redacted_json() {
        tracing::debug!(config = %redacted, "Loaded configuration");
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let pool = db::init_pool(&config).await?;
            db::run_migrations(&pool).await?;
            run_server(config, pool).await
        }
        Command::Migrate => {
            let pool = db::init_pool(&config).await?;
            db::run_migrations(&pool).await?;
            tracing::info!("Migrations applied");
            Ok(())
        }
        Command::CreateTenant { code, name } => {
            let code = code.trim();
            if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
                bail!("tenant code must be non-empty and alphanumeric");
            }
            let pool = db::init_pool(&config).await?;
            let tenant = TenantRepository::new(&pool)
                .create(code, name.trim())
                .await
                .context("creating tenant")?;
            println!("{}", tenant.id);
            Ok(())
        }
        Command::SeedMenu { file } => {
            let seed = MenuSeed::from_file(&file)
                .with_context(|| format!("reading menu seed {}", file.display()))?;
            let pool = db::init_pool(&config).await?;
            let report = seed_menu(&pool, &seed).await.context("seeding menu")?;
            println!("created {} item(s), skipped {}", report.created, report.skipped);
            Ok(())
        }
        Command::IssueToken {
            subject,
            role,
            tenant_id,
            ttl_hours,
        } => {
            let role = Role::from(role);
            if role != Role::Admin && tenant_id.is_none() {
                bail!("owner and staff tokens need --tenant-id");
            }
            let keys = JwtKeys::from_secret(config.jwt_secret_or_dev().as_bytes());
            let token = keys
                .issue(&subject, role, tenant_id, chrono::Duration::hours(ttl_hours))
                .context("signing token")?;
            println!("{token}");
            Ok(())
        }
    }
}
