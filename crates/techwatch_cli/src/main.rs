//! `techwatch` command-line entry point.
//!
//! # Responsibility
//! - Expose the cycle management and link assignment surfaces on the shell.
//! - Print every result as pretty JSON on stdout.
//!
//! # Invariants
//! - All business rules live in `techwatch_core`; this binary only parses,
//!   wires and prints.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use techwatch_core::{
    init_logging_from_config, open_db, CapacityAllocator, CreateCycleRequest, CycleStatus,
    LifecycleController, LinkService, LinkStatus, SqliteStore, SystemClock, TechWatchConfig,
    TechWatchResult, UpdateCycleRequest,
};

/// Watch-cycle planner for curated links
#[derive(Parser, Debug)]
#[command(name = "techwatch", version, about)]
struct Cli {
    /// SQLite database file (created when missing)
    #[arg(long, default_value = "techwatch.db")]
    db: PathBuf,

    /// Optional techwatch.toml with engine and logging settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Absolute directory for log files, overrides `logging.dir`
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage watch cycles
    #[command(subcommand)]
    Cycle(CycleCommand),
    /// Manage links and their assignment
    #[command(subcommand)]
    Link(LinkCommand),
    /// Assign every NEXT_CYCLE link to the next available cycles
    Distribute,
}

#[derive(Subcommand, Debug)]
enum CycleCommand {
    /// List cycles, latest date first
    List,
    Get {
        id: Uuid,
    },
    /// Show the active cycle, if any
    Active,
    Create {
        /// Scheduled date, YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, value_parser = parse_cycle_status)]
        status: Option<CycleStatus>,
        #[arg(long, allow_negative_numbers = true)]
        capacity: Option<i64>,
    },
    Activate {
        id: Uuid,
    },
    /// Complete a cycle and hand ACTIVE to its successor
    Complete {
        id: Uuid,
    },
    Update {
        id: Uuid,
        #[arg(long, value_parser = parse_cycle_status)]
        status: Option<CycleStatus>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, allow_negative_numbers = true)]
        capacity: Option<i64>,
    },
    Delete {
        id: Uuid,
    },
    /// List links assigned to a cycle
    Links {
        id: Uuid,
    },
    /// Count links assigned to a cycle
    Count {
        id: Uuid,
    },
    /// Distribute NEXT_CYCLE links on behalf of the active cycle
    Collect {
        id: Uuid,
    },
}

#[derive(Subcommand, Debug)]
enum LinkCommand {
    /// Record a discovered link
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        url: String,
    },
    Get {
        id: Uuid,
    },
    /// Set the triage status (TO_PROCESS, KEEP, LATER, REJECT, NEXT_CYCLE)
    Status {
        id: Uuid,
        #[arg(value_parser = parse_link_status)]
        status: LinkStatus,
    },
    /// Assign a link to the next cycle with spare capacity
    AssignNext {
        id: Uuid,
    },
    /// Detach a link from one cycle
    Remove {
        #[arg(long)]
        cycle: Uuid,
        #[arg(long)]
        link: Uuid,
    },
}

fn parse_cycle_status(value: &str) -> Result<CycleStatus, String> {
    CycleStatus::parse(value)
        .ok_or_else(|| format!("unknown cycle status `{value}`; expected PLANNED|ACTIVE|COMPLETED"))
}

fn parse_link_status(value: &str) -> Result<LinkStatus, String> {
    LinkStatus::parse(value).ok_or_else(|| {
        format!("unknown link status `{value}`; expected TO_PROCESS|KEEP|LATER|REJECT|NEXT_CYCLE")
    })
}

/// Attaches the error kind so shell callers can tell NotFound from Conflict.
fn engine<T>(result: TechWatchResult<T>) -> Result<T> {
    result.map_err(|err| {
        let kind = err.kind();
        anyhow::Error::new(err).context(format!("{kind:?}"))
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render JSON")?;
    println!("{rendered}");
    Ok(())
}

fn load_config(cli: &Cli) -> Result<TechWatchConfig> {
    let mut config = match &cli.config {
        Some(path) => TechWatchConfig::from_path(path)
            .with_context(|| format!("Failed to load config from '{}'", path.display()))?,
        None => TechWatchConfig::default(),
    };
    if let Some(dir) = &cli.log_dir {
        config.logging.dir = Some(dir.clone());
    }
    Ok(config)
}

fn run_cycle(
    command: CycleCommand,
    lifecycle: &LifecycleController<SqliteStore<'_>, SystemClock>,
    allocator: &CapacityAllocator<SqliteStore<'_>, SystemClock>,
) -> Result<()> {
    match command {
        CycleCommand::List => print_json(&engine(lifecycle.list())?),
        CycleCommand::Get { id } => print_json(&engine(lifecycle.get(id))?),
        CycleCommand::Active => print_json(&engine(lifecycle.get_active())?),
        CycleCommand::Create {
            date,
            status,
            capacity,
        } => {
            let request = CreateCycleRequest {
                scheduled_date: Some(date),
                status,
                capacity,
            };
            print_json(&engine(lifecycle.create(&request))?)
        }
        CycleCommand::Activate { id } => print_json(&engine(lifecycle.activate(id))?),
        CycleCommand::Complete { id } => print_json(&engine(lifecycle.complete(id))?),
        CycleCommand::Update {
            id,
            status,
            date,
            capacity,
        } => {
            let request = UpdateCycleRequest {
                status,
                scheduled_date: date,
                capacity,
            };
            print_json(&engine(lifecycle.update(id, &request))?)
        }
        CycleCommand::Delete { id } => {
            let successor = engine(lifecycle.delete(id))?;
            print_json(&json!({ "deleted": id, "successor": successor }))
        }
        CycleCommand::Links { id } => print_json(&engine(allocator.list_links(id))?),
        CycleCommand::Count { id } => {
            let count = engine(allocator.count_links(id))?;
            print_json(&json!({ "cycleId": id, "count": count }))
        }
        CycleCommand::Collect { id } => {
            let assigned = engine(lifecycle.collect_next_links(id))?;
            print_json(&json!({ "cycleId": id, "assigned": assigned }))
        }
    }
}

fn run_link(
    command: LinkCommand,
    links: &LinkService<SqliteStore<'_>>,
    allocator: &CapacityAllocator<SqliteStore<'_>, SystemClock>,
) -> Result<()> {
    match command {
        LinkCommand::Add { title, url } => print_json(&engine(links.create_link(&title, &url))?),
        LinkCommand::Get { id } => print_json(&engine(links.get_link(id))?),
        LinkCommand::Status { id, status } => {
            print_json(&engine(links.set_link_status(id, status))?)
        }
        LinkCommand::AssignNext { id } => print_json(&engine(allocator.assign_link_to_next(id))?),
        LinkCommand::Remove { cycle, link } => {
            engine(allocator.remove_link_from_tech_watch(cycle, link))?;
            print_json(&json!({ "cycleId": cycle, "linkId": link, "removed": true }))
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging_from_config(&config.logging)
        .map_err(anyhow::Error::msg)
        .context("Failed to initialize logging")?;

    let conn = open_db(&cli.db)
        .with_context(|| format!("Failed to open database '{}'", cli.db.display()))?;
    let store = SqliteStore::try_new(&conn).context("Database schema is not ready")?;

    let lifecycle = LifecycleController::new(store, SystemClock, config.engine.clone());
    let allocator = CapacityAllocator::new(store, SystemClock, config.engine.clone());
    let links = LinkService::new(store);

    info!("event=cli_command module=cli status=start command={:?}", cli.command);
    match cli.command {
        Command::Cycle(command) => run_cycle(command, &lifecycle, &allocator),
        Command::Link(command) => run_link(command, &links, &allocator),
        Command::Distribute => {
            let assigned = engine(allocator.distribute_next_links())?;
            print_json(&json!({ "assigned": assigned }))
        }
    }
}
