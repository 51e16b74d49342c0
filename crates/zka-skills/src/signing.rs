// SPDX-License-Identifier: MIT OR Apache-2.0
//! `request_signing`: open a new signing session for a circuit, returning a
//! hosted signing URL the caller's wallet completes out of band.

use serde_json::{json, Value};
use zka_core::circuit;
use zka_error::{AgentError, ErrorCode};
use zka_runtime::deps::Deps;

fn required_str<'a>(params: &'a Value, field: &str) -> Result<&'a str, AgentError> {
    params
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AgentError::validation(ErrorCode::MissingParam, format!("missing required param: {field}")))
}

fn optional_string_array(params: &Value, field: &str) -> Option<Vec<String>> {
    params
        .get(field)
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
}

/// Build the externally reachable signing URL for `request_id`.
pub(crate) fn signing_url(deps: &Deps, request_id: impl std::fmt::Display) -> String {
    format!("{}/sign/{}", deps.config.public_base_url.trim_end_matches('/'), request_id)
}

/// `{circuitId, scope, countryList?, isIncluded?}` -> `{requestId, signingUrl, expiresAt, circuitId, scope}`.
pub async fn request_signing(deps: &Deps, params: &Value) -> Result<Value, AgentError> {
    let circuit_id = required_str(params, "circuitId")?;
    circuit::lookup(circuit_id)?;
    let scope = required_str(params, "scope")?;
    let country_list = optional_string_array(params, "countryList");
    let is_included = params.get("isIncluded").and_then(Value::as_bool);

    let request = deps.flows.create_request(circuit_id, scope, country_list, is_included, deps.now()).await?;

    Ok(json!({
        "requestId": request.request_id.to_string(),
        "signingUrl": signing_url(deps, request.request_id),
        "expiresAt": request.expires_at,
        "circuitId": circuit_id,
        "scope": scope,
    }))
}
