//! Split-tender checkout math for Salon POS.
//!
//! Allocates a customer's tendered cash/card amounts across the
//! checked-out appointments being settled, card first, then cash. The
//! allocation is a pure function: the backend payment calls happen in
//! `store::settle_checkout`, only after the whole split is known to
//! cover the total.

use serde::Serialize;

use crate::appointments::{Appointment, AppointmentStatus};

/// Residual tolerance in currency units. Anything below this is
/// rounding noise from f64 arithmetic, not real money.
pub const AMOUNT_TOLERANCE: f64 = 0.0001;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Payment methods accepted by the admin dashboard's payment endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::CreditCard => "credit_card",
        }
    }
}

/// Amounts the customer presented. Card only counts when the "use card"
/// toggle is on.
#[derive(Debug, Clone, Copy)]
pub struct TenderAmounts {
    pub cash: f64,
    pub card: f64,
    pub card_enabled: bool,
}

impl TenderAmounts {
    pub fn paid_total(&self) -> f64 {
        self.cash + if self.card_enabled { self.card } else { 0.0 }
    }

    fn available_card(&self) -> f64 {
        if self.card_enabled {
            self.card
        } else {
            0.0
        }
    }
}

/// One payable unit in a checkout (an appointment's service charge).
#[derive(Debug, Clone)]
pub struct PaymentLineItem {
    pub id: String,
    pub total: f64,
}

/// Pull the payable line items out of a snapshot selection, keeping the
/// caller's order. Only `checked_out` appointments are eligible;
/// everything else (including `rescheduled`) contributes nothing.
pub fn payable_line_items<'a>(
    events: impl IntoIterator<Item = &'a Appointment>,
) -> Vec<PaymentLineItem> {
    events
        .into_iter()
        .filter(|e| e.status.is_ready_for_payment())
        .map(|e| PaymentLineItem {
            id: e.id.clone(),
            total: e.price,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    /// Tendered amount does not cover the total due. Recoverable: the
    /// cashier corrects the input and retries. No backend call is made.
    #[error("insufficient tender: short by {deficit:.2}")]
    Shortfall { deficit: f64 },

    /// A line item was left partially covered even though the tender
    /// covered the total. Internal invariant violation, not a user
    /// condition; nothing is dispatched when this fires.
    #[error("allocation inconsistency on appointment {appointment_id}: {residual:.4} left uncovered")]
    AllocationInconsistency {
        appointment_id: String,
        residual: f64,
    },

    #[error("no appointments are ready for payment")]
    NothingToSettle,
}

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

/// How one line item gets paid.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineAllocation {
    pub appointment_id: String,
    pub card: f64,
    pub cash: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitAllocation {
    pub allocations: Vec<LineAllocation>,
    pub total: f64,
    pub paid_total: f64,
    pub change: f64,
}

/// Deterministic card-first split of the tender across `line_items`,
/// walked in their given order. Card is fully consumed before cash is
/// applied, so a mixed-tender payment over several items always yields
/// one canonical allocation.
pub fn allocate(
    line_items: &[PaymentLineItem],
    tender: &TenderAmounts,
) -> Result<SplitAllocation, CheckoutError> {
    if line_items.is_empty() {
        return Err(CheckoutError::NothingToSettle);
    }

    let total: f64 = line_items.iter().map(|item| item.total).sum();
    let paid_total = tender.paid_total();
    if paid_total + AMOUNT_TOLERANCE < total {
        return Err(CheckoutError::Shortfall {
            deficit: total - paid_total,
        });
    }

    let mut remaining_card = tender.available_card();
    let mut remaining_cash = tender.cash;
    let mut allocations = Vec::with_capacity(line_items.len());

    for item in line_items {
        let mut due = item.total;

        let card_pay = remaining_card.min(due);
        remaining_card -= card_pay;
        due -= card_pay;

        let cash_pay = remaining_cash.min(due);
        remaining_cash -= cash_pay;
        due -= cash_pay;

        if due > AMOUNT_TOLERANCE {
            return Err(CheckoutError::AllocationInconsistency {
                appointment_id: item.id.clone(),
                residual: due,
            });
        }

        allocations.push(LineAllocation {
            appointment_id: item.id.clone(),
            card: card_pay,
            cash: cash_pay,
        });
    }

    Ok(SplitAllocation {
        allocations,
        total,
        paid_total,
        change: (paid_total - total).max(0.0),
    })
}

// ---------------------------------------------------------------------------
// Tender input parsing
// ---------------------------------------------------------------------------

/// Sanitize a free-text tender amount: keep digits and the first
/// decimal separator (`.` or `,`), drop everything else. Unparseable or
/// negative input counts as zero.
pub fn parse_tender_amount(raw: &str) -> f64 {
    let mut cleaned = String::with_capacity(raw.len());
    let mut seen_separator = false;
    for c in raw.chars() {
        if c.is_ascii_digit() {
            cleaned.push(c);
        } else if (c == '.' || c == ',') && !seen_separator {
            cleaned.push('.');
            seen_separator = true;
        }
    }
    cleaned.parse::<f64>().unwrap_or(0.0).max(0.0)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, total: f64) -> PaymentLineItem {
        PaymentLineItem {
            id: id.to_string(),
            total,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn card_is_applied_before_cash() {
        let split = allocate(
            &[item("a", 100.0)],
            &TenderAmounts {
                cash: 30.0,
                card: 80.0,
                card_enabled: true,
            },
        )
        .expect("covered");
        assert_eq!(split.allocations.len(), 1);
        assert!(approx(split.allocations[0].card, 80.0));
        assert!(approx(split.allocations[0].cash, 20.0));
        assert!(approx(split.change, 10.0));
    }

    #[test]
    fn multi_item_cash_split_walks_in_order() {
        let split = allocate(
            &[item("a", 60.0), item("b", 40.0)],
            &TenderAmounts {
                cash: 100.0,
                card: 0.0,
                card_enabled: false,
            },
        )
        .expect("covered");
        assert!(approx(split.allocations[0].cash, 60.0));
        assert!(approx(split.allocations[0].card, 0.0));
        assert!(approx(split.allocations[1].cash, 40.0));
        assert!(approx(split.change, 0.0));
    }

    #[test]
    fn card_spans_item_boundaries_then_cash_takes_over() {
        let split = allocate(
            &[item("a", 50.0), item("b", 50.0)],
            &TenderAmounts {
                cash: 40.0,
                card: 60.0,
                card_enabled: true,
            },
        )
        .expect("covered");
        assert!(approx(split.allocations[0].card, 50.0));
        assert!(approx(split.allocations[0].cash, 0.0));
        assert!(approx(split.allocations[1].card, 10.0));
        assert!(approx(split.allocations[1].cash, 40.0));
        assert!(approx(split.change, 0.0));
    }

    #[test]
    fn shortfall_reports_the_deficit() {
        let err = allocate(
            &[item("a", 100.0)],
            &TenderAmounts {
                cash: 99.99,
                card: 0.0,
                card_enabled: false,
            },
        )
        .expect_err("short");
        match err {
            CheckoutError::Shortfall { deficit } => assert!(approx(deficit, 0.01)),
            other => panic!("expected shortfall, got {other:?}"),
        }
    }

    #[test]
    fn disabled_card_does_not_count_toward_the_total() {
        let err = allocate(
            &[item("a", 100.0)],
            &TenderAmounts {
                cash: 50.0,
                card: 80.0,
                card_enabled: false,
            },
        )
        .expect_err("card toggle off");
        assert!(matches!(err, CheckoutError::Shortfall { .. }));
    }

    #[test]
    fn exact_tender_yields_zero_change() {
        let split = allocate(
            &[item("a", 50.0)],
            &TenderAmounts {
                cash: 50.0,
                card: 0.0,
                card_enabled: false,
            },
        )
        .expect("exact");
        assert!(approx(split.allocations[0].cash, 50.0));
        assert!(approx(split.change, 0.0));
    }

    #[test]
    fn empty_selection_is_rejected() {
        let err = allocate(
            &[],
            &TenderAmounts {
                cash: 10.0,
                card: 0.0,
                card_enabled: false,
            },
        )
        .expect_err("nothing selected");
        assert!(matches!(err, CheckoutError::NothingToSettle));
    }

    #[test]
    fn payable_line_items_keep_order_and_filter_status() {
        use crate::appointments::Appointment;
        use chrono::{TimeZone, Utc};

        let base = |id: &str, status: AppointmentStatus, price: f64| Appointment {
            id: id.to_string(),
            client_id: Some("c1".to_string()),
            client_first_name: None,
            client_last_name: None,
            service_name: None,
            stylist_first_name: None,
            start_time: Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap(),
            price,
            status,
        };
        let events = vec![
            base("ready-2", AppointmentStatus::CheckedOut, 40.0),
            base("scheduled", AppointmentStatus::Scheduled, 99.0),
            base("rescheduled", AppointmentStatus::Rescheduled, 99.0),
            base("ready-1", AppointmentStatus::CheckedOut, 60.0),
        ];
        let items = payable_line_items(&events);
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["ready-2", "ready-1"]);
        assert_eq!(items[0].total, 40.0);
    }

    #[test]
    fn tender_parsing_strips_free_text() {
        assert_eq!(parse_tender_amount("50"), 50.0);
        assert_eq!(parse_tender_amount(" 19.90 EUR"), 19.9);
        assert_eq!(parse_tender_amount("1,50"), 1.5);
        // Second separator is dropped, not a parse error.
        assert_eq!(parse_tender_amount("1.2.3"), 1.23);
        assert_eq!(parse_tender_amount("abc"), 0.0);
        assert_eq!(parse_tender_amount(""), 0.0);
    }
}
