use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::U256;
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use clmm_replay::events::loader;
use clmm_replay::events::models::PoolEvent;
use clmm_replay::events::replay::{self, day_start};
use clmm_replay::{ConfigurableCorePool, PoolConfig, Roadmap, Snapshot};
use clmm_replay::storage::sqlite::SqliteSnapshotStore;

#[derive(Parser)]
#[command(
    name = "clmm-replay",
    version,
    about = "Deterministic replayer for concentrated-liquidity pools"
)]
struct Cli {
    /// sqlite URL of the snapshot store, e.g. sqlite://snapshots.db?mode=rwc
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay an event file into a fresh pool
    Replay {
        /// JSON event file, or the liquidity-event CSV when --swaps is given
        events: PathBuf,

        /// swap-event CSV accompanying a liquidity-event CSV
        #[arg(long)]
        swaps: Option<PathBuf>,

        /// first day to replay (inclusive, UTC)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// first day to exclude (UTC)
        #[arg(long)]
        end: Option<NaiveDate>,

        #[arg(long, default_value = "USDC")]
        token0: String,

        #[arg(long, default_value = "WETH")]
        token1: String,

        #[arg(long, default_value_t = 3000)]
        fee_pips: u32,

        #[arg(long, default_value_t = 60)]
        tick_spacing: i32,

        /// initial sqrt price, Q64.96 as a decimal string
        #[arg(long)]
        sqrt_price: String,

        /// persist the final state as a snapshot with this description
        #[arg(long)]
        snapshot: Option<String>,
    },

    /// Print a persisted snapshot
    Inspect { snapshot_id: Uuid },

    /// Materialize a snapshot into a new pool and persist the copy
    Fork { snapshot_id: Uuid },

    /// Re-snapshot a persisted state under a new id and description
    Snapshot { snapshot_id: Uuid, description: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let roadmap = Roadmap::shared();
    if let Some(url) = &cli.db {
        let store = SqliteSnapshotStore::connect(url)
            .await
            .with_context(|| format!("opening snapshot store {url}"))?;
        roadmap.attach_store(Arc::new(store));
    }

    match cli.command {
        Command::Replay {
            events,
            swaps,
            start,
            end,
            token0,
            token1,
            fee_pips,
            tick_spacing,
            sqrt_price,
            snapshot,
        } => {
            let merged = load_events(&events, swaps.as_deref())?;
            let windowed = replay::window(merged, start.map(day_start), end.map(day_start));
            if windowed.is_empty() {
                bail!("no events inside the requested window");
            }

            let sqrt_price = U256::from_str(&sqrt_price)
                .with_context(|| format!("parsing --sqrt-price {sqrt_price}"))?;
            let config = PoolConfig::new(token0, token1, fee_pips, tick_spacing)?;
            let mut machine = ConfigurableCorePool::with_roadmap(config, roadmap.clone());
            machine.initialize(sqrt_price)?;

            let stats = replay::replay_events(&mut machine, &windowed)?;
            let state = machine.state();
            println!("pool      {}", machine.pool_id());
            println!(
                "replayed  {} mints, {} burns, {} swaps",
                stats.mints, stats.burns, stats.swaps
            );
            println!("price     {}", state.sqrt_price_x96);
            println!("tick      {}", state.tick_current);
            println!("liquidity {}", state.liquidity);

            if let Some(description) = snapshot {
                machine.take_snapshot(&description)?;
                let snapshot_id = machine.persist_snapshot().await?;
                println!("snapshot  {snapshot_id}");
            }
        }
        Command::Inspect { snapshot_id } => {
            let snapshot = roadmap.load_snapshot(snapshot_id).await?;
            print_snapshot(&snapshot);
        }
        Command::Fork { snapshot_id } => {
            let snapshot = roadmap.load_snapshot(snapshot_id).await?;
            let mut machine =
                ConfigurableCorePool::with_roadmap(snapshot.config.clone(), roadmap.clone());
            machine.recover(snapshot_id).await?;
            let fork = machine.fork();
            println!("pool      {}", fork.pool_id());
            println!("state     {}", fork.state().id);
        }
        Command::Snapshot { snapshot_id, description } => {
            let snapshot = roadmap.load_snapshot(snapshot_id).await?;
            let mut machine =
                ConfigurableCorePool::with_roadmap(snapshot.config.clone(), roadmap.clone());
            machine.recover(snapshot_id).await?;
            machine.take_snapshot(&description)?;
            let new_id = machine.persist_snapshot().await?;
            println!("snapshot  {new_id}");
        }
    }

    Ok(())
}

fn load_events(events: &Path, swaps: Option<&Path>) -> Result<Vec<PoolEvent>> {
    let merged = match swaps {
        Some(swaps_path) => replay::merge_events(
            loader::load_liquidity_events_csv(events)?,
            loader::load_swap_events_csv(swaps_path)?,
        ),
        None => {
            let file = loader::load_events_json(events)?;
            replay::merge_events(file.liquidity_events, file.swap_events)
        }
    };
    Ok(merged)
}

fn print_snapshot(snapshot: &Snapshot) {
    println!("snapshot    {}", snapshot.id);
    println!("description {}", snapshot.description);
    println!("created     {}", snapshot.created_at.to_rfc3339());
    println!(
        "pair        {}/{} fee {} spacing {}",
        snapshot.config.token0,
        snapshot.config.token1,
        snapshot.config.fee_pips,
        snapshot.config.tick_spacing
    );
    println!("price       {}", snapshot.sqrt_price_x96);
    println!("tick        {}", snapshot.tick_current);
    println!("liquidity   {}", snapshot.liquidity);
    println!("ticks       {}", snapshot.ticks.len());
    println!("positions   {}", snapshot.positions.len());
}
