use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fs2::FileExt;
use tempfile::NamedTempFile;
use tracing_subscriber::EnvFilter;

use sdft::{
    to_base_units, to_decimal_string, Address, Amount, AmountError, Ledger, LedgerEvent,
    LedgerSnapshot, TokenConfig,
};

#[derive(Parser, Debug)]
#[command(name = "sdft", version, about = "Simple DeFi Token ledger")]
struct Cli {
    /// Ledger state file (JSON snapshot).
    #[arg(long, global = true, default_value = "sdft-state.json")]
    state: PathBuf,

    /// Log filter, e.g. `debug` or `sdft=trace`.
    #[arg(long, global = true, default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new ledger crediting the whole supply to the deployer
    Genesis {
        #[arg(long)]
        deployer: Address,
        /// JSON token config; defaults to the SDFT parameters
        #[arg(long)]
        config: Option<PathBuf>,
        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },
    /// Token name, symbol, supply and state root
    Info,
    /// Balance of an account
    Balance { account: Address },
    /// Remaining allowance of a spender over an owner's balance
    Allowance { owner: Address, spender: Address },
    /// Plain transfer
    Transfer {
        #[arg(long)]
        from: Address,
        #[arg(long)]
        to: Address,
        #[arg(value_parser = parse_amount)]
        amount: Amount,
    },
    /// Transfer that burns the configured share of the amount
    TransferBurn {
        #[arg(long)]
        from: Address,
        #[arg(long)]
        to: Address,
        #[arg(value_parser = parse_amount)]
        amount: Amount,
    },
    /// Set a spender's allowance (overwrites)
    Approve {
        #[arg(long)]
        owner: Address,
        #[arg(long)]
        spender: Address,
        #[arg(value_parser = parse_amount)]
        amount: Amount,
    },
    /// Spend an allowance on behalf of the owner
    TransferFrom {
        #[arg(long)]
        spender: Address,
        #[arg(long)]
        owner: Address,
        #[arg(long)]
        to: Address,
        #[arg(value_parser = parse_amount)]
        amount: Amount,
    },
    /// Decimal token quantity to base units
    ToUnits { amount: String },
    /// Base units to decimal token quantity
    FromUnits { units: Amount },
}

fn parse_amount(s: &str) -> Result<Amount, AmountError> {
    to_base_units(s)
}

fn load_ledger(path: &Path) -> Result<Ledger> {
    let bytes = fs::read(path)
        .with_context(|| format!("read state {} (run `sdft genesis` first)", path.display()))?;
    let snapshot: LedgerSnapshot =
        serde_json::from_slice(&bytes).with_context(|| format!("parse state {}", path.display()))?;
    let ledger = Ledger::from_snapshot(snapshot)
        .with_context(|| format!("verify state {}", path.display()))?;
    tracing::debug!(path = %path.display(), height = ledger.height(), "state loaded");
    Ok(ledger)
}

fn state_dir(path: &Path) -> Result<&Path> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("mkdir {}", dir.display()))?;
    Ok(dir)
}

/// Takes an exclusive lock on `<state>.lock`, held until the returned file
/// is dropped. Every load-mutate-save cycle runs under it so concurrent
/// invocations apply one after another.
fn lock_state(path: &Path) -> Result<File> {
    state_dir(path)?;
    let lock_path = path.with_extension("lock");
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&lock_path)
        .with_context(|| format!("open {}", lock_path.display()))?;
    file.lock_exclusive()
        .with_context(|| format!("lock {}", lock_path.display()))?;
    Ok(file)
}

fn save_ledger(path: &Path, ledger: &Ledger) -> Result<()> {
    let dir = state_dir(path)?;
    let json = serde_json::to_vec_pretty(&ledger.snapshot())?;
    // unique temp file + rename: a crash never leaves a truncated state file
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;
    tmp.write_all(&json)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("replace {}", path.display()))?;
    tracing::debug!(path = %path.display(), height = ledger.height(), "state saved");
    Ok(())
}

fn print_events(events: &[LedgerEvent]) -> Result<()> {
    for event in events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}

/// Loads the state, applies one mutation, persists and prints its events.
fn mutate(
    path: &Path,
    op: impl FnOnce(&mut Ledger) -> Result<(), sdft::LedgerError>,
) -> Result<()> {
    let _lock = lock_state(path)?;
    let mut ledger = load_ledger(path)?;
    op(&mut ledger)?;
    save_ledger(path, &ledger)?;
    print_events(&ledger.take_events())
}

fn run(cli: Cli) -> Result<()> {
    let state = cli.state.as_path();
    match cli.command {
        Command::Genesis {
            deployer,
            config,
            force,
        } => {
            let _lock = lock_state(state)?;
            if state.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", state.display());
            }
            let config = match config {
                Some(path) => TokenConfig::load(&path)
                    .with_context(|| format!("load config {}", path.display()))?,
                None => TokenConfig::default(),
            };
            let mut ledger = Ledger::initialize(config, deployer);
            save_ledger(state, &ledger)?;
            tracing::info!(%deployer, state = %state.display(), "genesis written");
            print_events(&ledger.take_events())
        }
        Command::Info => {
            let ledger = load_ledger(state)?;
            println!("name:         {}", ledger.name());
            println!("symbol:       {}", ledger.symbol());
            println!("decimals:     {}", ledger.decimals());
            println!("total supply: {}", to_decimal_string(ledger.total_supply()));
            println!("burn rate:    {}", ledger.burn_rate());
            println!("holders:      {}", ledger.holders().count());
            println!("height:       {}", ledger.height());
            println!("state root:   {}", hex::encode(ledger.state_root()));
            Ok(())
        }
        Command::Balance { account } => {
            let ledger = load_ledger(state)?;
            println!("{}", to_decimal_string(ledger.balance_of(&account)));
            Ok(())
        }
        Command::Allowance { owner, spender } => {
            let ledger = load_ledger(state)?;
            println!("{}", to_decimal_string(ledger.allowance(&owner, &spender)));
            Ok(())
        }
        Command::Transfer { from, to, amount } => {
            mutate(state, |ledger| ledger.transfer(from, to, amount))
        }
        Command::TransferBurn { from, to, amount } => {
            mutate(state, |ledger| ledger.transfer_with_auto_burn(from, to, amount))
        }
        Command::Approve {
            owner,
            spender,
            amount,
        } => mutate(state, |ledger| ledger.approve(owner, spender, amount)),
        Command::TransferFrom {
            spender,
            owner,
            to,
            amount,
        } => mutate(state, |ledger| {
            ledger.transfer_from(spender, owner, to, amount)
        }),
        Command::ToUnits { amount } => {
            let units = to_base_units(&amount).with_context(|| format!("parse {amount:?}"))?;
            println!("{units}");
            Ok(())
        }
        Command::FromUnits { units } => {
            println!("{}", to_decimal_string(units));
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log))
        .with_writer(std::io::stderr)
        .init();
    run(cli)
}
