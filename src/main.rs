use clap::{
    ArgGroup,
    Parser,
};
use coinflip_client::{
    aptos_client::AptosClient,
    client,
    config::{
        self,
        GameConfig,
        NetworkTarget,
    },
    ledger::Address,
    preferences::{
        JsonFilePreferences,
        PREFERENCES_DIR,
        resolve_preferences_path,
    },
    wallets::{
        KeystoreWallet,
        Session,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    sync::Arc,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

#[derive(Parser, Debug)]
#[command(name = "coinflip", about = "Terminal client for the on-chain coin flip game")]
#[command(group(
    ArgGroup::new("network")
        .required(true)
        .args(["mainnet", "testnet", "devnet", "local"])
))]
struct Args {
    /// Connect to Aptos mainnet
    #[arg(long)]
    mainnet: bool,
    /// Connect to Aptos testnet
    #[arg(long)]
    testnet: bool,
    /// Connect to Aptos devnet
    #[arg(long)]
    devnet: bool,
    /// Connect to a local node
    #[arg(long)]
    local: bool,
    /// Override the fullnode URL for the selected network
    #[arg(long)]
    rpc_url: Option<String>,
    /// Address of the published coin flip module
    #[arg(long)]
    contract: Option<String>,
    /// Encrypted keystore used to sign wagers; without it the client is read-only
    #[arg(long, requires = "address")]
    wallet: Option<String>,
    /// Account the keystore signs for
    #[arg(long)]
    address: Option<String>,
    /// Preference file (defaults to ~/.coinflip/preferences.json)
    #[arg(long)]
    prefs: Option<String>,
    /// Directory for the rolling log file
    #[arg(long)]
    log_dir: Option<String>,
}

impl Args {
    fn network(&self) -> Result<NetworkTarget> {
        let url = |default: &str| {
            self.rpc_url
                .clone()
                .unwrap_or_else(|| default.to_string())
        };
        let network = if self.mainnet {
            NetworkTarget::Mainnet {
                url: url(config::DEFAULT_MAINNET_RPC_URL),
            }
        } else if self.testnet {
            NetworkTarget::Testnet {
                url: url(config::DEFAULT_TESTNET_RPC_URL),
            }
        } else if self.devnet {
            NetworkTarget::Devnet {
                url: url(config::DEFAULT_DEVNET_RPC_URL),
            }
        } else if self.local {
            NetworkTarget::LocalNode {
                url: url(config::DEFAULT_LOCAL_RPC_URL),
            }
        } else {
            return Err(eyre!(
                "Select a network with --mainnet, --testnet, --devnet, or --local"
            ));
        };
        Ok(network)
    }

    fn game_config(&self) -> Result<GameConfig> {
        let config = GameConfig::default();
        match &self.contract {
            Some(raw) => {
                let contract = Address::parse(raw)
                    .wrap_err_with(|| format!("invalid --contract address {raw}"))?;
                Ok(config.with_contract(contract))
            }
            None => Ok(config),
        }
    }

    fn log_dir(&self) -> Result<PathBuf> {
        match &self.log_dir {
            Some(raw) => Ok(PathBuf::from(shellexpand::tilde(raw).into_owned())),
            None => {
                let home =
                    std::env::var("HOME").wrap_err("HOME environment variable not set")?;
                Ok(PathBuf::from(home).join(PREFERENCES_DIR).join("logs"))
            }
        }
    }
}

/// The terminal UI owns stdout, so logs go to a daily rolling file.
fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("failed to create log directory {}", log_dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(rolling::daily(log_dir, "coinflip.log"));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!("failed to install tracing subscriber: {e}"))?;
    Ok(guard)
}

fn open_session(args: &Args, node: &AptosClient) -> Result<Session> {
    let Some(keystore) = &args.wallet else {
        return Ok(Session::Disconnected);
    };
    let raw_address = args
        .address
        .as_deref()
        .ok_or_else(|| eyre!("--wallet requires --address <account>"))?;
    let address = Address::parse(raw_address)
        .wrap_err_with(|| format!("invalid --address {raw_address}"))?;
    let wallet = KeystoreWallet::open(node.clone(), address, Path::new(keystore))?;
    Ok(Session::Connected(wallet))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let _log_guard = init_tracing(&args.log_dir()?)?;

    let network = args.network()?;
    let config = Arc::new(args.game_config()?);
    tracing::info!(
        network = network.name(),
        url = network.url(),
        contract = %config.contract,
        "starting coinflip client"
    );

    let node = AptosClient::new(network.url())?;
    // the keystore password prompt needs the normal terminal, before the UI starts
    let session = open_session(&args, &node)?;
    let prefs_path = resolve_preferences_path(args.prefs.as_deref())?;
    let prefs = JsonFilePreferences::open(&prefs_path)
        .wrap_err_with(|| format!("failed to load preferences from {}", prefs_path.display()))?;

    client::run_app(config, Arc::new(session), Arc::new(node), prefs).await
}
