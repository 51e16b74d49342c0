// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use zka_config::{Args, Config};
use zka_daemon::wiring::build_settlement_transferer;
use zka_daemon::{build_app, wiring, AppState};
use zka_payments::facilitator::PaymentFacilitator;
use zka_payments::settlement::SettlementWorker;
use zka_runtime::pool::WorkerPool;
use zka_skills::Skills;

/// Number of concurrent worker-pool pollers draining the submitted-task queue.
const WORKER_COUNT: usize = 4;

/// Interval between settlement sweeps.
const SETTLEMENT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("zka=debug,zka_daemon=debug,zka_runtime=debug")
    } else {
        EnvFilter::new("zka=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env().context("load configuration from environment")?;
    let bind = args.bind.clone().unwrap_or_else(|| format!("0.0.0.0:{}", config.port));
    let chain_rpc_url = config.chain_rpc_url.clone();

    let deps = wiring::build_deps(config).await.context("build dependency bundle")?;

    let pool = Arc::new(WorkerPool::new(deps.clone(), Arc::new(Skills)));
    {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.run(WORKER_COUNT).await });
    }

    if let Some(settlement_deps) = spawn_settlement_worker(&deps, &chain_rpc_url)? {
        tokio::spawn(settlement_deps);
    }

    let state = Arc::new(AppState::new(deps, pool));
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&bind).await.with_context(|| format!("bind {bind}"))?;
    info!(%bind, "zka-daemon listening");

    axum::serve(listener, app).await.context("serve")
}

/// Build the settlement sweep loop as a future ready to be spawned, if
/// settlement is configured (`SETTLEMENT_USDC_ADDRESS`/`SETTLEMENT_OPERATOR_ADDRESS`
/// both set). Returns `None` when settlement is unconfigured, meaning no
/// sweeps ever run and payments stay `pending` until confirmed by hand.
fn spawn_settlement_worker(
    deps: &zka_runtime::deps::Deps,
    chain_rpc_url: &str,
) -> Result<Option<impl std::future::Future<Output = ()> + Send + 'static>> {
    let provider = zka_chain::connect(chain_rpc_url).context("connect settlement chain provider")?;
    let Some(transferer) = build_settlement_transferer(&deps.config, provider).context("build settlement transferer")? else {
        info!("settlement sweeps disabled: SETTLEMENT_USDC_ADDRESS or SETTLEMENT_OPERATOR_ADDRESS not set");
        return Ok(None);
    };

    let kv = Arc::clone(&deps.kv);
    let signing_ttl = Duration::from_secs(deps.config.signing_ttl_secs);
    let clock = Arc::clone(&deps.clock);

    Ok(Some(async move {
        let facilitator = PaymentFacilitator::new(kv.as_ref(), signing_ttl);
        let worker = SettlementWorker::new(facilitator, transferer.as_ref());
        let mut interval = tokio::time::interval(SETTLEMENT_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            match worker.sweep_once(clock.now()).await {
                Ok(outcomes) if !outcomes.is_empty() => info!(count = outcomes.len(), "settlement sweep completed"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "settlement sweep failed"),
            }
        }
    }))
}
