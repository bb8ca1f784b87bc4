//! ibt
//!
//! Command-line driver for the IBT mint/reclaim flow. Every command connects,
//! refreshes the flow, performs its action only if the derived state offers
//! it, and prints the resulting state.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ethers::prelude::*;
use ibt_evm::{describe, EvmConfig, EvmContract, RpcSession};
use ibt_flow::{
    Action, FlowController, FlowState, MemoryStore, SessionStore, SledStore, TxKind,
    VerificationResponse,
};
use tracing::{info, warn};

type Client = SignerMiddleware<Provider<Http>, LocalWallet>;
type Controller = FlowController<EvmContract<Client>, RpcSession<Client>, Box<dyn SessionStore>>;

#[derive(Parser)]
#[command(name = "ibt", about = "Mint and reclaim Iris-bound tokens")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current flow state.
    Status,
    /// Record the identity verifier's response for the connected account.
    Verify(VerifyArgs),
    /// Mint the IBT bound to the cached proof.
    Mint,
    /// Move the IBT to the connected account.
    Reclaim,
    /// Ask the wallet to switch to the required network.
    SwitchNetwork,
}

#[derive(Args)]
struct VerifyArgs {
    /// JSON file with `merkle_root`, `nullifier_hash` and `proof`.
    #[arg(long)]
    response: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ibt=info,ibt_evm=info,ibt_flow=info".into()),
        )
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = EvmConfig::from_env()?;
    let mut flow = connect(&config).await?;

    let state = match cli.command {
        Commands::Status => flow.refresh().await,
        Commands::Verify(args) => verify(&mut flow, &args).await?,
        Commands::Mint => submit_and_wait(&mut flow, TxKind::Mint).await?,
        Commands::Reclaim => {
            if flow.refresh().await.action() == Some(Action::StartReclaim) {
                flow.start_reclaim()?;
            }
            submit_and_wait(&mut flow, TxKind::Reclaim).await?
        }
        Commands::SwitchNetwork => {
            flow.request_network_switch().await;
            flow.refresh().await
        }
    };

    println!("{}", describe(&state, flow.chain().as_ref()));
    Ok(())
}

async fn connect(config: &EvmConfig) -> Result<Controller> {
    let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
        .context("Failed to create HTTP provider")?;
    let chain_id = provider
        .get_chainid()
        .await
        .context("Failed to query chain id")?
        .as_u64();

    // Without a key the session reports no account, so nothing is ever signed.
    let (wallet, account) = match &config.private_key {
        Some(key) => {
            let wallet = key.parse::<LocalWallet>().context("Invalid private key")?;
            let account = wallet.address();
            (wallet, Some(account))
        }
        None => (LocalWallet::new(&mut rand::thread_rng()), None),
    };

    let client = Arc::new(SignerMiddleware::new(provider, wallet.with_chain_id(chain_id)));
    let session = Arc::new(RpcSession::new(Arc::clone(&client), account));
    session.sync().await?;

    info!(
        account = ?account,
        chain_id,
        contract = ?config.contract_address,
        "connected"
    );

    let contract = Arc::new(EvmContract::new(config.contract_address, client));
    Ok(FlowController::new(
        config.flow_config(),
        contract,
        session,
        open_store(config),
    ))
}

fn open_store(config: &EvmConfig) -> Box<dyn SessionStore> {
    match SledStore::open(&config.session_dir) {
        Ok(store) => Box::new(store),
        Err(err) => {
            warn!(
                dir = %config.session_dir.display(),
                error = %err,
                "session store unavailable, proofs kept in memory"
            );
            Box::new(MemoryStore::new())
        }
    }
}

async fn verify(flow: &mut Controller, args: &VerifyArgs) -> Result<FlowState> {
    let raw = fs::read_to_string(&args.response)
        .with_context(|| format!("failed to read {}", args.response.display()))?;
    let response: VerificationResponse =
        serde_json::from_str(&raw).context("Invalid verification response")?;

    flow.refresh().await;
    flow.record_verification(&response)?;
    Ok(flow.refresh().await)
}

async fn submit_and_wait(flow: &mut Controller, kind: TxKind) -> Result<FlowState> {
    let wanted = match kind {
        TxKind::Mint => Action::SubmitMint,
        TxKind::Reclaim => Action::SubmitReclaim,
    };
    let state = flow.refresh().await;
    if state.action() != Some(wanted) {
        return Ok(state);
    }

    let hash = flow.submit(kind).await?;
    println!("{}", describe(&flow.state(), flow.chain().as_ref()));

    let status = flow.wait_for_transaction().await?;
    info!(?hash, ?status, "transaction settled");
    Ok(flow.refresh().await)
}
