//! PostRank operator CLI.
//!
//! # Responsibility
//! - Drive the ranking core against a SQLite store file.
//! - Keep output line-oriented and deterministic for scripting.

use clap::{Parser, Subcommand};
use log::error;
use postrank_core::{
    default_log_level, init_logging, CommunityId, EngineConfig, ItemId, ScoreEngine,
    SqliteScoreStore, SystemClock,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "postrank", version, about = "Vote-driven item ranking")]
struct Cli {
    /// SQLite store file.
    #[arg(long, env = "POSTRANK_DB", default_value = "postrank.db")]
    db: PathBuf,

    /// Absolute directory for rotating log files; logging is off when unset.
    #[arg(long, env = "POSTRANK_LOG_DIR")]
    log_dir: Option<String>,

    #[arg(long, env = "POSTRANK_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register a new item as created now.
    Create { item: i64, community: i64 },
    /// Cast a vote (-1, 0 or 1).
    Vote {
        user: String,
        item: String,
        #[arg(allow_negative_numbers = true)]
        value: f64,
    },
    /// Highest-scoring items first.
    Top {
        #[arg(default_value_t = 10)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Active voters of an item.
    Voters { item: i64 },
    /// Creation time, score, tally and window of an item.
    Info { item: i64 },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(err) = init_logging(level, log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::from_env()?;
    let store = SqliteScoreStore::open(&cli.db)?;
    let engine = ScoreEngine::new(store, SystemClock, config)?;

    match cli.command {
        Command::Create { item, community } => {
            let item = engine.create_item(ItemId(item), CommunityId(community))?;
            println!(
                "created item={} community={} created_at={} score={}",
                item.id, item.community_id, item.created_at, item.score
            );
        }
        Command::Vote { user, item, value } => {
            let receipt = engine.vote_str(&user, &item, value)?;
            println!(
                "voted item={} previous={} current={} delta={}",
                receipt.item_id,
                receipt.previous.as_f64(),
                receipt.current.as_f64(),
                receipt.score_delta
            );
        }
        Command::Top { limit, offset } => {
            for (rank, entry) in engine
                .registrar()
                .top_items(limit, offset)?
                .into_iter()
                .enumerate()
            {
                let position = rank as u64 + u64::from(offset) + 1;
                println!("{position} item={} score={}", entry.id, entry.score);
            }
        }
        Command::Voters { item } => {
            for (user, vote) in engine.ledger().voters(ItemId(item))? {
                println!("{user} {}", vote.as_f64());
            }
        }
        Command::Info { item } => {
            let id = ItemId(item);
            let Some(snapshot) = engine.registrar().get_item(id)? else {
                println!("item={id} unknown");
                return Ok(());
            };
            let tally = engine.ledger().tally(id)?;
            let closes_at = engine.window().closes_at(id)?.unwrap_or(snapshot.created_at);
            println!(
                "item={} created_at={} score={} up={} down={} closes_at={}",
                id, snapshot.created_at, snapshot.score, tally.up, tally.down, closes_at
            );
        }
    }

    Ok(())
}
