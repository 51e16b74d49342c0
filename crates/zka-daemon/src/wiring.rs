// SPDX-License-Identifier: MIT OR Apache-2.0
//! Builds the process-wide [`Deps`] bundle from [`zka_config::Config`]:
//! chain providers, the TEE backend, the attestation client, and (best
//! effort, logged only) startup identity registration.

use std::path::PathBuf;
use std::sync::Arc;

use alloy_primitives::Address;
use zka_config::{Config, TeeMode};
use zka_error::{AgentError, ErrorCode};
use zka_kv::{KvStore, MemoryKvStore, RedisKvStore};
use zka_payments::UsdcTransferer;
use zka_prover::{ProverBinaries, SubprocessProverDriver};
use zka_runtime::deps::{Clock, Deps, NoopReputationHook, ReputationHook, SystemClock};
use zka_runtime::flow::FlowOrchestrator;
use zka_runtime::store::TaskStore;
use zka_tee::{DisabledTee, LocalTee, NitroTee, TeeProvider};

use crate::attestation_client::HttpAttestationBackend;
use crate::chain_adapters::{ChainReputationHook, EvmChainVerifier};

fn parse_address(raw: &str, what: &str) -> Result<Address, AgentError> {
    raw.parse()
        .map_err(|e| AgentError::validation(ErrorCode::InvalidConfig, format!("invalid {what} address {raw}: {e}")))
}

fn build_kv(config: &Config) -> Result<Arc<dyn KvStore>, AgentError> {
    if config.kv_store_url == "memory://" {
        return Ok(Arc::new(MemoryKvStore::new()));
    }
    if config.kv_store_url.starts_with("redis://") || config.kv_store_url.starts_with("rediss://") {
        return Ok(Arc::new(RedisKvStore::new(&config.kv_store_url)?));
    }
    Err(AgentError::validation(
        ErrorCode::InvalidConfig,
        format!("unsupported kvStoreUrl scheme: {} (expected memory:// or redis://)", config.kv_store_url),
    ))
}

fn build_tee(config: &Config) -> Result<Arc<dyn TeeProvider>, AgentError> {
    let mode = match config.tee_mode {
        TeeMode::Auto => TeeMode::Local,
        other => other,
    };
    Ok(match mode {
        TeeMode::Disabled => Arc::new(DisabledTee),
        TeeMode::Local => {
            let driver = SubprocessProverDriver::new(ProverBinaries {
                witness_gen: PathBuf::from(&config.prover_witness_gen_bin),
                prove: PathBuf::from(&config.prover_bin),
            });
            Arc::new(LocalTee::new(Box::new(driver)))
        }
        TeeMode::Nitro => {
            let cid = config
                .enclave_cid
                .ok_or_else(|| AgentError::validation(ErrorCode::InvalidConfig, "teeMode=nitro requires an enclave CID"))?;
            Arc::new(NitroTee::new(cid, u32::from(config.enclave_port)))
        }
        TeeMode::Auto => unreachable!("auto resolved above"),
    })
}

/// Build every [`Deps`] field from `config`. Chain connectivity failures are
/// fatal (the process cannot serve requests without a verifier); identity
/// registration and reputation wiring are best-effort and never abort
/// startup.
pub async fn build_deps(config: Config) -> Result<Deps, AgentError> {
    let kv = build_kv(&config)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let signing_ttl = std::time::Duration::from_secs(config.signing_ttl_secs);

    let tasks = Arc::new(TaskStore::new(Arc::clone(&kv)));
    let flows = Arc::new(FlowOrchestrator::new(Arc::clone(&kv), signing_ttl));
    let bus = Arc::new(zka_bus::EventBus::new());
    let tee = build_tee(&config)?;

    let read_provider = zka_chain::connect(&config.chain_rpc_url)?;
    let chain_verifier = Arc::new(EvmChainVerifier::new(read_provider.clone()));

    let attestation = Arc::new(HttpAttestationBackend::new(config.attestation_endpoint.clone())?);

    let (signing_provider, agent_address) = zka_chain::connect_signing(&config.chain_rpc_url, &config.prover_private_key)?;

    let reputation: Arc<dyn ReputationHook> = match &config.reputation_registry_address {
        Some(addr) => {
            let registry_address = parse_address(addr, "reputation registry")?;
            Arc::new(ChainReputationHook::new(signing_provider.clone(), registry_address, agent_address))
        }
        None => Arc::new(NoopReputationHook),
    };

    if let Some(addr) = &config.identity_registry_address {
        match parse_address(addr, "identity registry") {
            Ok(registry_address) => {
                let provider = signing_provider.clone();
                let public_base_url = config.public_base_url.clone();
                let agent_version = config.agent_version.clone();
                tokio::spawn(async move {
                    zka_chain::register_if_needed(&provider, registry_address, agent_address, &public_base_url, &agent_version).await;
                });
            }
            Err(e) => tracing::warn!(error = %e, "skipping identity auto-registration: invalid registry address"),
        }
    }

    let config = Arc::new(config);

    Ok(Deps {
        kv,
        tasks,
        flows,
        bus,
        config,
        clock,
        tee,
        chain_verifier,
        reputation,
        attestation,
        llm_router: None,
    })
}

/// Build the USDC settlement transferer, if settlement is configured.
/// Returns `None` when either address is absent, meaning settlement sweeps
/// are skipped entirely.
pub fn build_settlement_transferer(
    config: &Config,
    provider: alloy_provider::RootProvider,
) -> Result<Option<Arc<dyn UsdcTransferer>>, AgentError> {
    let (Some(usdc), Some(operator)) = (&config.settlement_usdc_address, &config.settlement_operator_address) else {
        return Ok(None);
    };
    let usdc_address = parse_address(usdc, "settlement USDC")?;
    let operator_address = parse_address(operator, "settlement operator")?;
    Ok(Some(Arc::new(zka_chain::EvmUsdcTransferer::new(provider, usdc_address, operator_address))))
}
