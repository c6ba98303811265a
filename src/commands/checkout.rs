//! Checkout commands: split preview and settlement.

use serde::Deserialize;
use serde_json::Value;

use crate::checkout::{self, CheckoutError, TenderAmounts};
use crate::{api, store};

// ---------------------------------------------------------------------------
// Payload parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CheckoutPayload {
    #[serde(default, alias = "appointment_ids", alias = "ids")]
    appointment_ids: Vec<String>,
    /// Numbers or free-text strings; the tender box is a text input.
    #[serde(default)]
    cash: Option<Value>,
    #[serde(default)]
    card: Option<Value>,
    #[serde(default, alias = "card_enabled", alias = "useCard", alias = "use_card")]
    card_enabled: bool,
}

fn tender_value(v: Option<&Value>) -> f64 {
    match v {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0).max(0.0),
        Some(Value::String(s)) => checkout::parse_tender_amount(s),
        _ => 0.0,
    }
}

fn parse_checkout_payload(arg0: Option<Value>) -> Result<(Vec<String>, TenderAmounts), String> {
    let payload: CheckoutPayload = serde_json::from_value(
        arg0.ok_or("Missing checkout payload")?,
    )
    .map_err(|e| format!("Invalid checkout payload: {e}"))?;

    let mut seen = std::collections::HashSet::new();
    let mut ids = Vec::new();
    for id in payload.appointment_ids {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            ids.push(trimmed.to_string());
        }
    }
    if ids.is_empty() {
        return Err("Missing appointmentIds".into());
    }

    let tender = TenderAmounts {
        cash: tender_value(payload.cash.as_ref()),
        card: tender_value(payload.card.as_ref()),
        card_enabled: payload.card_enabled,
    };
    Ok((ids, tender))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Dry-run the split for the tender dialog. A shortfall is a normal
/// outcome here (the cashier is still typing), so it comes back as
/// `success: false` with the deficit instead of an error.
#[tauri::command]
pub async fn checkout_preview(
    arg0: Option<Value>,
    store: tauri::State<'_, store::AppointmentStore>,
) -> Result<Value, String> {
    let (ids, tender) = parse_checkout_payload(arg0)?;
    let snapshot = store.snapshot()?;
    let selected = ids
        .iter()
        .filter_map(|id| snapshot.iter().find(|a| &a.id == id));
    let items = checkout::payable_line_items(selected);

    match checkout::allocate(&items, &tender) {
        Ok(split) => Ok(serde_json::json!({
            "success": true,
            "total": split.total,
            "paidTotal": split.paid_total,
            "change": split.change,
            "allocations": split.allocations,
        })),
        Err(CheckoutError::Shortfall { deficit }) => Ok(serde_json::json!({
            "success": false,
            "shortfall": true,
            "deficit": deficit,
        })),
        Err(e) => Err(e.to_string()),
    }
}

/// Settle the checkout: allocate, post the payment records, flip the
/// paid appointments to completed locally.
#[tauri::command]
pub async fn checkout_settle(
    arg0: Option<Value>,
    store: tauri::State<'_, store::AppointmentStore>,
) -> Result<Value, String> {
    let (ids, tender) = parse_checkout_payload(arg0)?;
    let client = api::BackendClient::from_stored_credentials()?;
    store::settle_checkout(&store, &client, &ids, &tender).await
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod dto_tests {
    use super::*;

    #[test]
    fn parse_checkout_payload_dedups_and_trims_ids() {
        let (ids, tender) = parse_checkout_payload(Some(serde_json::json!({
            "appointmentIds": ["apt-1", " apt-2 ", "", "apt-1"],
            "cash": 50.0,
            "card": "30",
            "cardEnabled": true
        })))
        .expect("payload should parse");
        assert_eq!(ids, vec!["apt-1".to_string(), "apt-2".to_string()]);
        assert_eq!(tender.cash, 50.0);
        assert_eq!(tender.card, 30.0);
        assert!(tender.card_enabled);
    }

    #[test]
    fn parse_checkout_payload_sanitizes_free_text_amounts() {
        let (_, tender) = parse_checkout_payload(Some(serde_json::json!({
            "appointment_ids": ["apt-1"],
            "cash": " 19,90 EUR",
            "card": "abc"
        })))
        .expect("payload should parse");
        assert_eq!(tender.cash, 19.9);
        assert_eq!(tender.card, 0.0);
        assert!(!tender.card_enabled);
    }

    #[test]
    fn parse_checkout_payload_requires_ids() {
        let err = parse_checkout_payload(Some(serde_json::json!({
            "appointmentIds": ["  "],
            "cash": 10.0
        })))
        .expect_err("no usable ids");
        assert!(err.contains("appointmentIds"));
        assert!(parse_checkout_payload(None).is_err());
    }

    #[test]
    fn negative_number_amounts_clamp_to_zero() {
        let (_, tender) = parse_checkout_payload(Some(serde_json::json!({
            "ids": ["apt-1"],
            "cash": -5.0
        })))
        .expect("payload should parse");
        assert_eq!(tender.cash, 0.0);
    }
}
