//! QR payload encoder for issued invoices.
//!
//! The authority mandates a scannable payload built from the fiscal fields of
//! an issued invoice: a verification URL carrying the canonical JSON document
//! encoded as URL-safe base64. The encoder is a pure transform; identical
//! input produces byte-identical output.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::json;
use thiserror::Error;

use crate::fiscal::FiscalResponse;

/// Verification endpoint the payload points at.
const VERIFICATION_URL: &str = "https://fiscal.example/fe/qr/?p=";

/// Payload schema version, per the authority's format.
const PAYLOAD_VERSION: u32 = 1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QrEncodeError {
    /// A required fiscal field is missing or empty. The encoder never
    /// substitutes partial data.
    #[error("missing required fiscal field: {0}")]
    MissingField(&'static str),
}

/// Encode the authority-mandated QR payload for an issued invoice.
///
/// Deterministic: no randomness and no clock reads; every date comes from
/// the fiscal response itself. `serde_json` maps are sorted by key, so the
/// canonical document serializes identically on every call.
pub fn encode_qr(fiscal: &FiscalResponse) -> Result<String, QrEncodeError> {
    if fiscal.invoice_number.is_empty() {
        return Err(QrEncodeError::MissingField("invoice_number"));
    }
    if fiscal.authorization_code.is_empty() {
        return Err(QrEncodeError::MissingField("authorization_code"));
    }
    if fiscal.issuer_tax_id.is_empty() {
        return Err(QrEncodeError::MissingField("issuer_tax_id"));
    }

    let document = json!({
        "ver": PAYLOAD_VERSION,
        "nro": fiscal.invoice_number,
        "cod_aut": fiscal.authorization_code,
        "vto_aut": fiscal.authorization_expires.format("%Y-%m-%d").to_string(),
        "cuit": fiscal.issuer_tax_id,
        "fecha": fiscal.issued_on.format("%Y-%m-%d").to_string(),
        "importe": fiscal.total,
    });

    let encoded = URL_SAFE_NO_PAD.encode(document.to_string().as_bytes());
    Ok(format!("{VERIFICATION_URL}{encoded}"))
}
