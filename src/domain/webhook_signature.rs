//! Stripe-compatible webhook signatures: `t=<unix seconds>,v1=<hex hmac-sha256>` where
//! the MAC covers `"{t}.{payload}"`.

use crate::error::{MarketplaceError, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

fn mac_for(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| MarketplaceError::Validation(format!("invalid webhook secret: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Produces a signature header for `payload` as the gateway would send it.
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String> {
    let signature = mac_for(secret, timestamp, payload)?.finalize().into_bytes();
    Ok(format!("t={timestamp},v1={}", hex::encode(signature)))
}

/// Checks `header` against `payload`. Any `v1` entry may match; the timestamp must be
/// within `tolerance` of `now` to stop replays.
pub fn verify(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance: Duration,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        MarketplaceError::Forbidden("webhook signature header has no timestamp".to_string())
    })?;
    if signatures.is_empty() {
        return Err(MarketplaceError::Forbidden(
            "webhook signature header has no v1 signature".to_string(),
        ));
    }

    let age = now.timestamp().abs_diff(timestamp);
    if age > tolerance.as_secs() {
        return Err(MarketplaceError::Forbidden(format!(
            "webhook timestamp is {age}s away from now"
        )));
    }

    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate).is_ok_and(|bytes| {
            mac_for(secret, timestamp, payload).is_ok_and(|mac| mac.verify_slice(&bytes).is_ok())
        })
    });
    if !matched {
        return Err(MarketplaceError::Forbidden(
            "webhook signature mismatch".to_string(),
        ));
    }
    Ok(())
}
