//! Execution report signing.
//!
//! Reports are signed with secp256k1 ECDSA over the SHA-256 digest of a
//! canonical serialization:
//!
//! ```text
//! [assignment_id, intent_id, agent_id, status, timestamp]
//! ```
//!
//! encoded as a compact JSON array. ECDSA nonces are derived per RFC 6979, so
//! signing is a pure function of (key, report): a retried submission is
//! byte-identical to the first attempt.
//!
//! The private key never appears in `Debug` output or in error messages.

use crate::error::{AgentError, Result};
use crate::protocol::{ExecutionReport, SignedExecutionReport};
use secp256k1::ecdsa::Signature;
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of a hex-encoded 32-byte private key.
const PRIVATE_KEY_HEX_LEN: usize = 64;

/// Holds exactly one private key and signs reports with it.
#[derive(Clone)]
pub struct SigningContext {
    secp: Secp256k1<All>,
    secret: SecretKey,
    public: PublicKey,
}

impl SigningContext {
    /// Build a signing context from a hex-encoded 32-byte scalar.
    ///
    /// An optional `0x` prefix is accepted.
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let trimmed = key_hex.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != PRIVATE_KEY_HEX_LEN {
            return Err(AgentError::Configuration(format!(
                "private key must be {} hex characters (got {})",
                PRIVATE_KEY_HEX_LEN,
                digits.len()
            )));
        }

        let bytes = hex::decode(digits).map_err(|_| {
            AgentError::Configuration("private key is not valid hex".to_string())
        })?;
        let secret = SecretKey::from_slice(&bytes).map_err(|_| {
            AgentError::Configuration("private key is not a valid secp256k1 scalar".to_string())
        })?;

        let secp = Secp256k1::new();
        let public = PublicKey::from_secret_key(&secp, &secret);
        Ok(Self {
            secp,
            secret,
            public,
        })
    }

    /// Hex-encoded compressed public key (33 bytes).
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public.serialize())
    }

    /// Sign a report, returning the hex-encoded compact signature.
    pub fn sign(&self, report: &ExecutionReport) -> Result<String> {
        let message = report_message(report)?;
        let signature = self.secp.sign_ecdsa(&message, &self.secret);
        Ok(hex::encode(signature.serialize_compact()))
    }

    /// Sign a report and attach the signature and public key.
    pub fn sign_report(&self, report: ExecutionReport) -> Result<SignedExecutionReport> {
        let signature = self.sign(&report)?;
        Ok(SignedExecutionReport {
            report,
            signature,
            public_key: self.public_key_hex(),
        })
    }
}

impl fmt::Debug for SigningContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningContext")
            .field("public_key", &self.public_key_hex())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Canonical bytes a report signature covers.
pub fn canonical_payload(report: &ExecutionReport) -> Result<Vec<u8>> {
    serde_json::to_vec(&(
        &report.assignment_id,
        &report.intent_id,
        &report.agent_id,
        report.status.as_str(),
        report.timestamp,
    ))
    .map_err(|e| AgentError::Validation(format!("failed to serialize report: {}", e)))
}

fn report_message(report: &ExecutionReport) -> Result<Message> {
    let payload = canonical_payload(report)?;
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&Sha256::digest(&payload));
    Ok(Message::from_digest(digest))
}

/// Verify a signed report against the public key it carries.
///
/// Returns `Ok(false)` for a well-formed but non-matching signature and an
/// error when the signature or key cannot be decoded.
pub fn verify(signed: &SignedExecutionReport) -> Result<bool> {
    let secp = Secp256k1::verification_only();
    let message = report_message(&signed.report)?;

    let sig_bytes = hex::decode(&signed.signature)
        .map_err(|e| AgentError::Validation(format!("invalid signature hex: {}", e)))?;
    let signature = Signature::from_compact(&sig_bytes)
        .map_err(|e| AgentError::Validation(format!("invalid signature: {}", e)))?;

    let key_bytes = hex::decode(&signed.public_key)
        .map_err(|e| AgentError::Validation(format!("invalid public key hex: {}", e)))?;
    let public = PublicKey::from_slice(&key_bytes)
        .map_err(|e| AgentError::Validation(format!("invalid public key: {}", e)))?;

    Ok(secp.verify_ecdsa(&message, &signature, &public).is_ok())
}
