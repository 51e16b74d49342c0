// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fixed-width serialization of circuit parameters into a `Prover.toml`.

use serde_json::Value;
use zka_error::{AgentError, ErrorCode};

/// Required byte length of the padded raw transaction field.
pub const RAW_TRANSACTION_LEN: usize = 300;
/// Required number of merkle proof entries (tree depth).
pub const MERKLE_PROOF_DEPTH: usize = 8;
/// Required number of country-list entries.
pub const COUNTRY_LIST_LEN: usize = 10;
/// Required length, in bytes, of the r||s signature (v dropped).
pub const SIGNATURE_LEN: usize = 64;

fn hex_field(inputs: &Value, field: &str) -> Result<Vec<u8>, AgentError> {
    let raw = inputs
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::validation(ErrorCode::MissingParam, format!("missing required input: {field}")))?;
    hex::decode(raw.trim_start_matches("0x"))
        .map_err(|e| AgentError::validation(ErrorCode::InvalidParam, format!("{field} is not valid hex: {e}")))
}

fn pad_right(mut bytes: Vec<u8>, target: usize, field: &str) -> Result<Vec<u8>, AgentError> {
    if bytes.len() > target {
        return Err(AgentError::validation(ErrorCode::InvalidParam, format!("{field} exceeds {target} bytes")));
    }
    bytes.resize(target, 0);
    Ok(bytes)
}

fn to_hex_literal(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Split a 64- or 65-byte signature into the raw 64-byte `r||s` pair,
/// dropping the recovery byte `v` if present.
fn split_signature_drop_v(bytes: Vec<u8>, field: &str) -> Result<Vec<u8>, AgentError> {
    match bytes.len() {
        SIGNATURE_LEN => Ok(bytes),
        65 => Ok(bytes[..SIGNATURE_LEN].to_vec()),
        other => Err(AgentError::validation(
            ErrorCode::InvalidParam,
            format!("{field} must be 64 or 65 bytes (r||s[||v]), got {other}"),
        )),
    }
}

fn merkle_proof_field(inputs: &Value) -> Result<Vec<String>, AgentError> {
    let Some(entries) = inputs.get("merkle_proof").and_then(Value::as_array) else {
        return Err(AgentError::validation(ErrorCode::MissingParam, "missing required input: merkle_proof"));
    };
    if entries.len() > MERKLE_PROOF_DEPTH {
        return Err(AgentError::validation(
            ErrorCode::InvalidParam,
            format!("merkle_proof has more than {MERKLE_PROOF_DEPTH} entries"),
        ));
    }
    let mut literals = Vec::with_capacity(MERKLE_PROOF_DEPTH);
    for entry in entries {
        let raw = entry
            .as_str()
            .ok_or_else(|| AgentError::validation(ErrorCode::InvalidParam, "merkle_proof entry is not a string"))?;
        let bytes = hex::decode(raw.trim_start_matches("0x"))
            .map_err(|e| AgentError::validation(ErrorCode::InvalidParam, format!("merkle_proof entry is not valid hex: {e}")))?;
        literals.push(to_hex_literal(&pad_right(bytes, 32, "merkle_proof entry")?));
    }
    while literals.len() < MERKLE_PROOF_DEPTH {
        literals.push(to_hex_literal(&[0u8; 32]));
    }
    Ok(literals)
}

fn country_list_field(inputs: &Value) -> Vec<String> {
    let mut codes: Vec<String> = inputs
        .get("country_list")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(|v| v.as_str().map(str::to_uppercase)).collect())
        .unwrap_or_default();
    codes.truncate(COUNTRY_LIST_LEN);
    while codes.len() < COUNTRY_LIST_LEN {
        codes.push("\0\0".to_string());
    }
    codes
}

fn toml_string_literal(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn toml_string_array(values: &[String]) -> String {
    let quoted: Vec<String> = values.iter().map(|v| toml_string_literal(v)).collect();
    format!("[{}]", quoted.join(", "))
}

/// Serialize `inputs` into the fixed-width `Prover.toml` body the witness-gen
/// subprocess expects, per the circuit's required-input schema.
pub fn to_circuit_toml(inputs: &Value) -> Result<String, AgentError> {
    let raw_transaction = pad_right(hex_field(inputs, "raw_transaction")?, RAW_TRANSACTION_LEN, "raw_transaction")?;
    let signature = split_signature_drop_v(hex_field(inputs, "signature")?, "signature")?;
    let merkle_proof = merkle_proof_field(inputs)?;

    let address = inputs
        .get("address")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::validation(ErrorCode::MissingParam, "missing required input: address"))?;
    let scope = inputs
        .get("scope")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::validation(ErrorCode::MissingParam, "missing required input: scope"))?;

    let mut toml = String::new();
    toml.push_str(&format!("raw_transaction = {}\n", toml_string_literal(&to_hex_literal(&raw_transaction))));
    toml.push_str(&format!("signature = {}\n", toml_string_literal(&to_hex_literal(&signature))));
    toml.push_str(&format!("merkle_proof = {}\n", toml_string_array(&merkle_proof)));
    toml.push_str(&format!("address = {}\n", toml_string_literal(address)));
    toml.push_str(&format!("scope = {}\n", toml_string_literal(scope)));

    if inputs.get("country_list").is_some() || inputs.get("is_included").is_some() {
        let country_list = country_list_field(inputs);
        let is_included = inputs.get("is_included").and_then(Value::as_bool).unwrap_or(false);
        toml.push_str(&format!("country_list = {}\n", toml_string_array(&country_list)));
        toml.push_str(&format!("is_included = {is_included}\n"));
    }

    Ok(toml)
}
