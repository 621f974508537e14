use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use sea_orm_migration::MigratorTrait;
use serde::Serialize;
use tracing::info;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use schemacanvas::auth::{IdentityProvider, StaticIdentity};
use schemacanvas::config::EngineConfig;
use schemacanvas::database::{establish_connection, get_database_url, migrations::Migrator};
use schemacanvas::AppContext;

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    /// TOML file with engine settings
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,
    /// Database file, or `:memory:`
    #[clap(short, long, global = true)]
    database: Option<String>,
    /// User id to act as
    #[clap(short, long, global = true)]
    actor: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Db {
        #[clap(subcommand)]
        command: DbCommands,
    },
    Project {
        #[clap(subcommand)]
        command: ProjectCommands,
    },
    Snapshot {
        #[clap(subcommand)]
        command: SnapshotCommands,
    },
    /// Undo the actor's last change in a project
    Undo {
        #[clap(short, long)]
        project: String,
    },
    /// Redo the actor's last undone change in a project
    Redo {
        #[clap(short, long)]
        project: String,
    },
    /// Show the actor's undo stack for a project
    History {
        #[clap(short, long)]
        project: String,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    Init,
    Migrate {
        #[clap(subcommand)]
        direction: MigrateDirection,
    },
}

#[derive(Subcommand, Debug)]
enum MigrateDirection {
    Up,
    Down,
    Fresh,
}

#[derive(Subcommand, Debug)]
enum ProjectCommands {
    Create { name: String },
    List,
    /// Print the full schema graph of a project
    Show { id: String },
}

#[derive(Subcommand, Debug)]
enum SnapshotCommands {
    Capture {
        #[clap(short, long)]
        project: String,
        #[clap(short = 'm', long, default_value = "")]
        description: String,
    },
    List {
        #[clap(short, long)]
        project: String,
    },
    Restore { id: String },
    Show { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    let mut config = EngineConfig::load(args.config.as_deref())?;
    if let Some(database) = &args.database {
        config.database_url = get_database_url(Some(database));
    }
    if args.actor.is_some() {
        config.actor = args.actor.clone();
    }

    let db = establish_connection(&config.database_url)
        .await
        .with_context(|| format!("Failed to connect to {}", config.database_url))?;

    if let Commands::Db { command } = &args.command {
        match command {
            DbCommands::Init => {
                info!("Initializing database: {}", config.database_url);
                migrate_database(&db, &MigrateDirection::Up).await?;
            }
            DbCommands::Migrate { direction } => {
                info!("Running database migration: {:?}", direction);
                migrate_database(&db, direction).await?;
            }
        }
        return Ok(());
    }

    let identity = StaticIdentity::new(config.actor.clone());
    let actor = identity.current_actor();
    let context = AppContext::new(db, config);

    match args.command {
        Commands::Db { .. } => {}
        Commands::Project { command } => match command {
            ProjectCommands::Create { name } => {
                print_json(&context.projects().create_project(&actor, &name).await?)?;
            }
            ProjectCommands::List => {
                print_json(&context.projects().list_owned_projects(&actor).await?)?;
            }
            ProjectCommands::Show { id } => {
                let graph = context
                    .projects()
                    .load_graph(&actor, &id)
                    .await?
                    .ok_or_else(|| anyhow!("Project {} not found", id))?;
                print_json(&graph)?;
            }
        },
        Commands::Snapshot { command } => match command {
            SnapshotCommands::Capture {
                project,
                description,
            } => {
                print_json(
                    &context
                        .snapshots()
                        .capture(&actor, &project, &description)
                        .await?,
                )?;
            }
            SnapshotCommands::List { project } => {
                print_json(&context.snapshots().list_snapshots(&actor, &project).await?)?;
            }
            SnapshotCommands::Restore { id } => {
                let summary = context.snapshots().restore(&actor, &id).await?;
                info!(
                    "Restored snapshot {}: {} upserted, {} removed",
                    id, summary.upserted, summary.removed
                );
                print_json(&serde_json::json!({
                    "snapshotId": id,
                    "upserted": summary.upserted,
                    "removed": summary.removed,
                }))?;
            }
            SnapshotCommands::Show { id } => {
                let snapshot = context
                    .snapshots()
                    .get_snapshot(&actor, &id)
                    .await?
                    .ok_or_else(|| anyhow!("Snapshot {} not found", id))?;
                print_json(&snapshot)?;
            }
        },
        Commands::Undo { project } => {
            print_json(&context.undo().undo(&actor, &project).await?)?;
        }
        Commands::Redo { project } => {
            print_json(&context.undo().redo(&actor, &project).await?)?;
        }
        Commands::History { project } => {
            print_json(&context.undo().history(&actor, &project).await?)?;
        }
    }

    Ok(())
}

async fn migrate_database(
    db: &sea_orm::DatabaseConnection,
    direction: &MigrateDirection,
) -> Result<()> {
    match direction {
        MigrateDirection::Up => {
            info!("Running migrations up");
            Migrator::up(db, None).await?;
        }
        MigrateDirection::Down => {
            info!("Running migrations down");
            Migrator::down(db, None).await?;
        }
        MigrateDirection::Fresh => {
            info!("Running fresh migrations (down then up)");
            Migrator::down(db, None).await?;
            Migrator::up(db, None).await?;
        }
    }

    info!("Database migration completed");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    if log_level.is_none() {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .without_time()
                .init();
            return;
        }
    }

    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("sqlx=warn,{}", log_level)))
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
