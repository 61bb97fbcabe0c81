use std::process::ExitCode;

use anyhow::Context as _;
use clap::{CommandFactory as _, Parser};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

use store_cli::{
    config::Config,
    context::ExecutionContext,
    dispatch::Dispatcher,
    models::{Action, Scope, StoreType},
    store::StoreError,
};

/// Get, set or remove items in the store
#[derive(Debug, Clone, Parser)]
#[command(name = "store-cli", version)]
struct Args {
    /// Scope of command. For example: event, job, pipeline
    #[arg(long, global = true, default_value = "")]
    scope: String,

    /// Type of the command. For example: cache, artifact, log
    #[arg(long = "type", global = true)]
    store_type: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::Subcommand)]
enum Command {
    /// Get a new item from the store
    Get(KeyArgs),

    /// Put a new item to the store
    Set(KeyArgs),

    /// Remove an existing item from the store
    Remove(KeyArgs),
}

#[derive(Debug, Clone, clap::Args)]
struct KeyArgs {
    keys: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    install_fault_hook();

    const DEFAULT_TRACING_DIRECTIVE: &str = concat!(env!("CARGO_CRATE_NAME"), "=info,warn");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_TRACING_DIRECTIVE)),
        )
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{}", error_message(&error));
            ExitCode::FAILURE
        }
    }
}

/// One validated store operation taken from the command line.
#[derive(Debug, PartialEq, Eq)]
struct Invocation {
    action: Action,
    store_type: StoreType,
    scope: Scope,
    key: String,
}

impl Invocation {
    /// Returns `None` when the command line does not name exactly one key.
    fn from_args(args: Args) -> Result<Option<Self>, StoreError> {
        let (action, keys) = match args.command {
            Command::Get(key_args) => (Action::Get, key_args.keys),
            Command::Set(key_args) => (Action::Set, key_args.keys),
            Command::Remove(key_args) => (Action::Remove, key_args.keys),
        };
        let Ok([key]) = <[String; 1]>::try_from(keys) else {
            return Ok(None);
        };

        let store_type = args
            .store_type
            .as_deref()
            .ok_or_else(|| StoreError::InvalidParameters("missing --type".to_string()))?
            .parse()?;
        let scope = args.scope.parse()?;

        Ok(Some(Self {
            action,
            store_type,
            scope,
            key,
        }))
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let Some(invocation) = Invocation::from_args(args)? else {
        Args::command().print_help()?;
        return Ok(());
    };
    let Invocation {
        action,
        store_type,
        scope,
        key,
    } = invocation;

    let config = Config::from_env().context("failed to read store settings from environment")?;
    let ctx = ExecutionContext::from_config(config).context("failed to resolve working directory")?;

    tracing::debug!(%action, %store_type, %scope, %key, "executing");
    Dispatcher::remote(&ctx)
        .execute(action, store_type, scope, &key)
        .await?;

    Ok(())
}

fn error_message(error: &anyhow::Error) -> String {
    format!("ERROR: {error:#}")
}

/// Report a panic with a backtrace and exit with a failure code.
fn install_fault_hook() {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::force_capture();
        eprintln!("ERROR: Something terrible has happened. Please file a ticket with this info:");
        eprintln!("ERROR: {info}\n{backtrace}");
        std::process::exit(1);
    }));
}
