// SPDX-License-Identifier: MIT OR Apache-2.0
//! Environment-driven configuration for the proof-generation agent.
//!
//! [`Config::from_env`] is the single entry point the daemon binary calls at
//! startup. An invalid `payment_mode` or `tee_mode` fails process start by
//! returning an `Err` rather than silently defaulting.

use std::fmt;
use std::str::FromStr;
use zka_error::{AgentError, ErrorCode};

/// Payment enforcement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMode {
    /// The payment gate is a pass-through; every request is marked `paymentSkipped`.
    Disabled,
    /// The payment gate enforces on a test network.
    Testnet,
    /// The payment gate enforces on mainnet.
    Mainnet,
}

impl PaymentMode {
    /// Whether this mode requires a settled payment before admitting a request.
    #[must_use]
    pub fn requires_payment(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disabled => "disabled",
            Self::Testnet => "testnet",
            Self::Mainnet => "mainnet",
        };
        f.write_str(s)
    }
}

impl FromStr for PaymentMode {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disabled" => Ok(Self::Disabled),
            "testnet" => Ok(Self::Testnet),
            "mainnet" => Ok(Self::Mainnet),
            other => Err(AgentError::validation(
                ErrorCode::InvalidConfig,
                format!("invalid payment mode: {other} (expected disabled|testnet|mainnet)"),
            )),
        }
    }
}

/// TEE delegation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeeMode {
    /// Proof generation always happens in-process; no enclave is used.
    Disabled,
    /// Proof generation delegates to the in-process prover driver directly.
    Local,
    /// Proof generation delegates to a Nitro-style enclave over vsock.
    Nitro,
    /// Select `Nitro` if an enclave is configured and reachable, else `Local`.
    Auto,
}

impl fmt::Display for TeeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disabled => "disabled",
            Self::Local => "local",
            Self::Nitro => "nitro",
            Self::Auto => "auto",
        };
        f.write_str(s)
    }
}

impl FromStr for TeeMode {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disabled" => Ok(Self::Disabled),
            "local" => Ok(Self::Local),
            "nitro" => Ok(Self::Nitro),
            "auto" => Ok(Self::Auto),
            other => Err(AgentError::validation(
                ErrorCode::InvalidConfig,
                format!("invalid tee mode: {other} (expected disabled|local|nitro|auto)"),
            )),
        }
    }
}

/// CLI flags layered over the environment, mirroring the daemon's bind/debug
/// surface.
#[derive(clap::Parser, Debug)]
#[command(name = "zka-daemon", version, about = "Autonomous proof-generation agent")]
pub struct Args {
    /// Bind address, overriding `PORT`.
    #[arg(long)]
    pub bind: Option<String>,

    /// Enable verbose (debug) logging.
    #[arg(long)]
    pub debug: bool,
}

/// Immutable, process-wide runtime configuration.
///
/// Constructed once at startup via [`Config::from_env`] and shared read-only
/// (typically behind an `Arc`) with every component.
#[derive(Clone)]
pub struct Config {
    /// Payment enforcement mode.
    pub payment_mode: PaymentMode,
    /// Connection string for the key-value store backend.
    pub kv_store_url: String,
    /// JSON-RPC endpoint of the chain hosting the verifier/identity/reputation contracts.
    pub chain_rpc_url: String,
    /// GraphQL endpoint of the attestation backend.
    pub attestation_endpoint: String,
    /// Address of the nullifier registry contract.
    pub nullifier_registry_address: String,
    /// Signing key used to submit on-chain transactions. Redacted from `Debug`.
    pub prover_private_key: String,
    /// Publicly reachable base URL of this agent, embedded in signing/payment links.
    pub public_base_url: String,
    /// HTTP bind port.
    pub port: u16,
    /// TEE delegation mode.
    pub tee_mode: TeeMode,
    /// Enclave context id, when TEE mode may use `nitro`.
    pub enclave_cid: Option<u32>,
    /// Enclave vsock port.
    pub enclave_port: u16,
    /// TTL, in seconds, of a signing/payment `Request`.
    pub signing_ttl_secs: u64,
    /// URL of the off-chain payment facilitator, if configured.
    pub facilitator_url: Option<String>,
    /// Address payments settle to.
    pub payment_pay_to: Option<String>,
    /// Decimal USD price of one proof, e.g. `"$0.10"`.
    pub proof_price: String,
    /// Identity registry contract address, if identity auto-registration is enabled.
    pub identity_registry_address: Option<String>,
    /// Reputation registry contract address, if the reputation hook is enabled.
    pub reputation_registry_address: Option<String>,
    /// Operator wallet address the settlement worker sweeps payments to.
    pub settlement_operator_address: Option<String>,
    /// USDC token contract address used for settlement transfers.
    pub settlement_usdc_address: Option<String>,
    /// Agent version string surfaced in `/health` and discovery documents.
    pub agent_version: String,
    /// Path to the witness-generation binary invoked by the local prover
    /// driver when `tee_mode` resolves to `local`. Resolved against `PATH`
    /// when not absolute.
    pub prover_witness_gen_bin: String,
    /// Path to the proving binary invoked by the local prover driver.
    pub prover_bin: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("payment_mode", &self.payment_mode)
            .field("kv_store_url", &self.kv_store_url)
            .field("chain_rpc_url", &self.chain_rpc_url)
            .field("attestation_endpoint", &self.attestation_endpoint)
            .field("nullifier_registry_address", &self.nullifier_registry_address)
            .field("prover_private_key", &"<redacted>")
            .field("public_base_url", &self.public_base_url)
            .field("port", &self.port)
            .field("tee_mode", &self.tee_mode)
            .field("enclave_cid", &self.enclave_cid)
            .field("enclave_port", &self.enclave_port)
            .field("signing_ttl_secs", &self.signing_ttl_secs)
            .field("facilitator_url", &self.facilitator_url)
            .field("payment_pay_to", &self.payment_pay_to)
            .field("proof_price", &self.proof_price)
            .field("identity_registry_address", &self.identity_registry_address)
            .field("reputation_registry_address", &self.reputation_registry_address)
            .field("settlement_operator_address", &self.settlement_operator_address)
            .field("settlement_usdc_address", &self.settlement_usdc_address)
            .field("agent_version", &self.agent_version)
            .field("prover_witness_gen_bin", &self.prover_witness_gen_bin)
            .field("prover_bin", &self.prover_bin)
            .finish()
    }
}

fn required_env(name: &str) -> Result<String, AgentError> {
    std::env::var(name)
        .map_err(|_| AgentError::validation(ErrorCode::InvalidConfig, format!("missing required env var {name}")))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

impl Config {
    /// Load configuration from the process environment, applying the
    /// documented defaults (§6) and failing with a [`zka_error::ErrorCode::InvalidConfig`]
    /// error if a required variable is absent or `PAYMENT_MODE`/`TEE_MODE` is invalid.
    pub fn from_env() -> Result<Self, AgentError> {
        let payment_mode: PaymentMode = required_env("PAYMENT_MODE")?.parse()?;
        let tee_mode = match optional_env("TEE_MODE") {
            Some(raw) => raw.parse()?,
            None => TeeMode::Disabled,
        };

        let port = optional_env("PORT")
            .map(|raw| {
                raw.parse::<u16>()
                    .map_err(|_| AgentError::validation(ErrorCode::InvalidConfig, format!("invalid PORT: {raw}")))
            })
            .transpose()?
            .unwrap_or(4002);

        let enclave_port = optional_env("ENCLAVE_PORT")
            .map(|raw| {
                raw.parse::<u16>()
                    .map_err(|_| AgentError::validation(ErrorCode::InvalidConfig, format!("invalid ENCLAVE_PORT: {raw}")))
            })
            .transpose()?
            .unwrap_or(5000);

        let enclave_cid = optional_env("ENCLAVE_CID")
            .map(|raw| {
                raw.parse::<u32>()
                    .map_err(|_| AgentError::validation(ErrorCode::InvalidConfig, format!("invalid ENCLAVE_CID: {raw}")))
            })
            .transpose()?;

        let signing_ttl_secs = optional_env("SIGNING_TTL_SECS")
            .map(|raw| {
                raw.parse::<u64>().map_err(|_| {
                    AgentError::validation(ErrorCode::InvalidConfig, format!("invalid SIGNING_TTL_SECS: {raw}"))
                })
            })
            .transpose()?
            .unwrap_or(300);

        Ok(Self {
            payment_mode,
            kv_store_url: required_env("KV_STORE_URL")?,
            chain_rpc_url: required_env("CHAIN_RPC_URL")?,
            attestation_endpoint: required_env("ATTESTATION_ENDPOINT")?,
            nullifier_registry_address: required_env("NULLIFIER_REGISTRY_ADDRESS")?,
            prover_private_key: required_env("PROVER_PRIVATE_KEY")?,
            public_base_url: required_env("PUBLIC_BASE_URL")?,
            port,
            tee_mode,
            enclave_cid,
            enclave_port,
            signing_ttl_secs,
            facilitator_url: optional_env("FACILITATOR_URL"),
            payment_pay_to: optional_env("PAYMENT_PAY_TO"),
            proof_price: optional_env("PROOF_PRICE").unwrap_or_else(|| "$0.10".to_string()),
            identity_registry_address: optional_env("IDENTITY_REGISTRY_ADDRESS"),
            reputation_registry_address: optional_env("REPUTATION_REGISTRY_ADDRESS"),
            settlement_operator_address: optional_env("SETTLEMENT_OPERATOR_ADDRESS"),
            settlement_usdc_address: optional_env("SETTLEMENT_USDC_ADDRESS"),
            agent_version: optional_env("AGENT_VERSION").unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            prover_witness_gen_bin: optional_env("PROVER_WITNESS_GEN_BIN").unwrap_or_else(|| "witness-gen".to_string()),
            prover_bin: optional_env("PROVER_BIN").unwrap_or_else(|| "prove".to_string()),
        })
    }
}
