// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`AttestationDocument`] and its CBOR decode/encode.

use ciborium::Value;
use std::collections::BTreeMap;
use zka_error::{AgentError, ErrorCode};

/// A parsed enclave attestation document (AWS-Nitro shape).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationDocument {
    /// Identifier of the enclave module that produced this document.
    pub module_id: String,
    /// Name of the PCR digest algorithm, e.g. `"SHA384"`.
    pub digest: String,
    /// Milliseconds since the Unix epoch when the document was signed.
    pub timestamp: u64,
    /// Platform configuration register values, keyed by register index.
    pub pcrs: BTreeMap<i64, Vec<u8>>,
    /// DER-encoded leaf certificate.
    pub certificate: Vec<u8>,
    /// DER-encoded certificate chain, root first, leaf's issuer last.
    pub cabundle: Vec<Vec<u8>>,
    /// Optional ephemeral public key bound into the document.
    pub public_key: Option<Vec<u8>>,
    /// Optional caller-supplied user data.
    pub user_data: Option<Vec<u8>>,
    /// Optional caller-supplied nonce.
    pub nonce: Option<Vec<u8>>,
}

fn expect_bytes(value: &Value, field: &str) -> Result<Vec<u8>, AgentError> {
    value
        .as_bytes()
        .map(|b| b.to_vec())
        .ok_or_else(|| AgentError::permanent(ErrorCode::AttestationInvalid, format!("field {field} is not a byte string")))
}

fn expect_text(value: &Value, field: &str) -> Result<String, AgentError> {
    value
        .as_text()
        .map(str::to_owned)
        .ok_or_else(|| AgentError::permanent(ErrorCode::AttestationInvalid, format!("field {field} is not a text string")))
}

fn expect_u64(value: &Value, field: &str) -> Result<u64, AgentError> {
    value
        .as_integer()
        .and_then(|i| i64::try_from(i).ok())
        .and_then(|i| u64::try_from(i).ok())
        .ok_or_else(|| AgentError::permanent(ErrorCode::AttestationInvalid, format!("field {field} is not a non-negative integer")))
}

impl AttestationDocument {
    /// Decode an attestation document from its CBOR map representation.
    pub fn from_cbor_value(value: &Value) -> Result<Self, AgentError> {
        let Value::Map(entries) = value else {
            return Err(AgentError::permanent(ErrorCode::AttestationInvalid, "attestation payload is not a CBOR map"));
        };
        let field = |name: &str| -> Option<&Value> {
            entries.iter().find_map(|(k, v)| (k.as_text() == Some(name)).then_some(v))
        };

        let module_id = field("module_id")
            .ok_or_else(|| AgentError::permanent(ErrorCode::AttestationInvalid, "missing module_id"))
            .and_then(|v| expect_text(v, "module_id"))?;
        let digest = field("digest")
            .ok_or_else(|| AgentError::permanent(ErrorCode::AttestationInvalid, "missing digest"))
            .and_then(|v| expect_text(v, "digest"))?;
        let timestamp = field("timestamp")
            .ok_or_else(|| AgentError::permanent(ErrorCode::AttestationInvalid, "missing timestamp"))
            .and_then(|v| expect_u64(v, "timestamp"))?;
        let certificate = field("certificate")
            .ok_or_else(|| AgentError::permanent(ErrorCode::AttestationInvalid, "missing certificate"))
            .and_then(|v| expect_bytes(v, "certificate"))?;

        let pcrs = match field("pcrs") {
            Some(Value::Map(pcr_entries)) => {
                let mut map = BTreeMap::new();
                for (k, v) in pcr_entries {
                    let index = k
                        .as_integer()
                        .and_then(|i| i64::try_from(i).ok())
                        .ok_or_else(|| AgentError::permanent(ErrorCode::AttestationInvalid, "non-integer PCR index"))?;
                    map.insert(index, expect_bytes(v, "pcrs[*]")?);
                }
                map
            }
            Some(_) => return Err(AgentError::permanent(ErrorCode::AttestationInvalid, "pcrs is not a map")),
            None => return Err(AgentError::permanent(ErrorCode::AttestationInvalid, "missing pcrs")),
        };

        let cabundle = match field("cabundle") {
            Some(Value::Array(items)) => {
                items.iter().map(|v| expect_bytes(v, "cabundle[*]")).collect::<Result<Vec<_>, _>>()?
            }
            Some(_) => return Err(AgentError::permanent(ErrorCode::AttestationInvalid, "cabundle is not an array")),
            None => return Err(AgentError::permanent(ErrorCode::AttestationInvalid, "missing cabundle")),
        };

        let public_key = field("public_key").filter(|v| !matches!(v, Value::Null)).map(|v| expect_bytes(v, "public_key")).transpose()?;
        let user_data = field("user_data").filter(|v| !matches!(v, Value::Null)).map(|v| expect_bytes(v, "user_data")).transpose()?;
        let nonce = field("nonce").filter(|v| !matches!(v, Value::Null)).map(|v| expect_bytes(v, "nonce")).transpose()?;

        Ok(Self { module_id, digest, timestamp, pcrs, certificate, cabundle, public_key, user_data, nonce })
    }

    /// Encode this document back into its CBOR map representation, the
    /// inverse of [`Self::from_cbor_value`].
    #[must_use]
    pub fn to_cbor_value(&self) -> Value {
        let mut entries = vec![
            (Value::Text("module_id".to_string()), Value::Text(self.module_id.clone())),
            (Value::Text("digest".to_string()), Value::Text(self.digest.clone())),
            (Value::Text("timestamp".to_string()), Value::Integer(self.timestamp.into())),
            (
                Value::Text("pcrs".to_string()),
                Value::Map(self.pcrs.iter().map(|(k, v)| (Value::Integer((*k).into()), Value::Bytes(v.clone()))).collect()),
            ),
            (Value::Text("certificate".to_string()), Value::Bytes(self.certificate.clone())),
            (
                Value::Text("cabundle".to_string()),
                Value::Array(self.cabundle.iter().map(|c| Value::Bytes(c.clone())).collect()),
            ),
        ];
        entries.push((Value::Text("public_key".to_string()), self.public_key.clone().map_or(Value::Null, Value::Bytes)));
        entries.push((Value::Text("user_data".to_string()), self.user_data.clone().map_or(Value::Null, Value::Bytes)));
        entries.push((Value::Text("nonce".to_string()), self.nonce.clone().map_or(Value::Null, Value::Bytes)));
        Value::Map(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AttestationDocument {
        let mut pcrs = BTreeMap::new();
        pcrs.insert(0, vec![0xaa; 48]);
        pcrs.insert(1, vec![0xbb; 48]);
        AttestationDocument {
            module_id: "i-0123456789-enc0123456789".to_string(),
            digest: "SHA384".to_string(),
            timestamp: 1_700_000_000_000,
            pcrs,
            certificate: vec![0x30, 0x82],
            cabundle: vec![vec![0x30, 0x01], vec![0x30, 0x02]],
            public_key: None,
            user_data: Some(vec![1, 2, 3]),
            nonce: None,
        }
    }

    #[test]
    fn round_trips_through_cbor() {
        let doc = sample();
        let value = doc.to_cbor_value();
        let back = AttestationDocument::from_cbor_value(&value).unwrap();
        assert_eq!(doc, back);
    }

    #[test]
    fn missing_cabundle_is_rejected() {
        let mut value_entries = match sample().to_cbor_value() {
            Value::Map(entries) => entries,
            _ => unreachable!(),
        };
        value_entries.retain(|(k, _)| k.as_text() != Some("cabundle"));
        let err = AttestationDocument::from_cbor_value(&Value::Map(value_entries)).unwrap_err();
        assert_eq!(err.code, ErrorCode::AttestationInvalid);
    }
}
