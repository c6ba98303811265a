//! In-memory appointment snapshot for Salon POS.
//!
//! The admin dashboard owns all appointment state. This store mirrors
//! one date range of it behind a mutex, refreshed by full refetch after
//! every mutating action (no partial cache patching). Status mutations
//! are optimistic: the local copy flips first, the backend call is
//! issued, and on failure the local copy rolls back to the captured
//! previous status.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::BackendClient;
use crate::appointments::{
    check_transition, Appointment, AppointmentAction, AppointmentStatus,
};
use crate::checkout::{self, PaymentMethod, TenderAmounts};

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct AppointmentStore {
    snapshot: Mutex<Vec<Appointment>>,
    last_refreshed: Mutex<Option<DateTime<Utc>>>,
}

impl AppointmentStore {
    pub fn new() -> AppointmentStore {
        AppointmentStore::default()
    }

    /// Replace the whole snapshot with a fresh fetch result.
    pub fn replace_all(&self, events: Vec<Appointment>) -> Result<(), String> {
        let mut guard = self.snapshot.lock().map_err(|e| e.to_string())?;
        *guard = events;
        drop(guard);
        let mut ts = self.last_refreshed.lock().map_err(|e| e.to_string())?;
        *ts = Some(Utc::now());
        Ok(())
    }

    /// Clone out the current snapshot. The queue and checkout logic
    /// work on this copy, never on the shared state directly.
    pub fn snapshot(&self) -> Result<Vec<Appointment>, String> {
        let guard = self.snapshot.lock().map_err(|e| e.to_string())?;
        Ok(guard.clone())
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed.lock().ok().and_then(|g| *g)
    }

    pub fn status_of(&self, appointment_id: &str) -> Result<AppointmentStatus, String> {
        let guard = self.snapshot.lock().map_err(|e| e.to_string())?;
        guard
            .iter()
            .find(|a| a.id == appointment_id)
            .map(|a| a.status)
            .ok_or_else(|| format!("Appointment not found: {appointment_id}"))
    }

    /// Flip one appointment's local status, returning the previous one
    /// so the caller can roll back.
    pub fn set_status_local(
        &self,
        appointment_id: &str,
        status: AppointmentStatus,
    ) -> Result<AppointmentStatus, String> {
        let mut guard = self.snapshot.lock().map_err(|e| e.to_string())?;
        let event = guard
            .iter_mut()
            .find(|a| a.id == appointment_id)
            .ok_or_else(|| format!("Appointment not found: {appointment_id}"))?;
        let previous = event.status;
        event.status = status;
        Ok(previous)
    }
}

/// Refetch the date range from the dashboard and swap the snapshot.
pub async fn refresh(
    store: &AppointmentStore,
    client: &BackendClient,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<usize, String> {
    let events = client.fetch_appointments(from, to).await?;
    let count = events.len();
    store.replace_all(events)?;
    info!(count, %from, %to, "appointment snapshot refreshed");
    Ok(count)
}

// ---------------------------------------------------------------------------
// Optimistic transitions
// ---------------------------------------------------------------------------

/// Apply a lifecycle action to one appointment.
///
/// The transition is validated against the local status, applied
/// optimistically, then pushed to the dashboard. A backend failure
/// rolls the local status back and surfaces the error; there is no
/// automatic retry, the cashier re-triggers the action.
pub async fn apply_transition(
    store: &AppointmentStore,
    client: &BackendClient,
    appointment_id: &str,
    action: AppointmentAction,
    new_start: Option<DateTime<Utc>>,
) -> Result<Value, String> {
    let current = store.status_of(appointment_id)?;
    check_transition(current, action).map_err(|e| e.to_string())?;

    if action == AppointmentAction::Reschedule && new_start.is_none() {
        return Err("Missing new start time for reschedule".to_string());
    }

    let previous = store.set_status_local(appointment_id, action.target_status())?;

    let result = match action {
        AppointmentAction::CheckIn => client.check_in(appointment_id).await,
        AppointmentAction::CheckOut => client.check_out(appointment_id).await,
        AppointmentAction::Cancel => {
            client
                .set_status(appointment_id, AppointmentStatus::Cancelled)
                .await
        }
        AppointmentAction::Reschedule => {
            // Presence checked above.
            match new_start {
                Some(start) => client.reschedule(appointment_id, start).await,
                None => Err("Missing new start time for reschedule".to_string()),
            }
        }
    };

    match result {
        Ok(response) => {
            info!(appointment_id, action = action.as_str(), "appointment transition applied");
            Ok(serde_json::json!({
                "success": true,
                "appointmentId": appointment_id,
                "status": action.target_status().as_str(),
                "response": response,
            }))
        }
        Err(e) => {
            if let Err(rollback_err) = store.set_status_local(appointment_id, previous) {
                warn!(appointment_id, error = %rollback_err, "rollback after failed transition also failed");
            }
            warn!(appointment_id, action = action.as_str(), error = %e, "appointment transition failed, local status rolled back");
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Checkout settlement
// ---------------------------------------------------------------------------

/// Settle a checkout for the selected appointments.
///
/// Only `checked_out` appointments among `appointment_ids` are payable;
/// the split is computed up front (shortfall fails here, before any
/// backend call), then payment records are posted sequentially, one per
/// non-zero tender type per item, and each fully-paid item is marked
/// `completed` locally. A failure partway through stops the loop and
/// reports how many items already settled; earlier payments are not
/// compensated.
pub async fn settle_checkout(
    store: &AppointmentStore,
    client: &BackendClient,
    appointment_ids: &[String],
    tender: &TenderAmounts,
) -> Result<Value, String> {
    let snapshot = store.snapshot()?;
    let selected: Vec<&Appointment> = appointment_ids
        .iter()
        .filter_map(|id| snapshot.iter().find(|a| &a.id == id))
        .collect();
    let items = checkout::payable_line_items(selected.into_iter());

    let split = checkout::allocate(&items, tender).map_err(|e| e.to_string())?;

    // One reference ties the whole checkout together on the dashboard.
    let reference = format!("chk-{}", Uuid::new_v4());
    let total_items = split.allocations.len();
    let mut settled = 0usize;

    for alloc in &split.allocations {
        let parts: [(PaymentMethod, f64); 2] = [
            (PaymentMethod::CreditCard, alloc.card),
            (PaymentMethod::Cash, alloc.cash),
        ];
        for (method, amount) in parts {
            if amount <= 0.0 {
                continue;
            }
            if let Err(e) = client
                .record_payment(&alloc.appointment_id, amount, method, &reference)
                .await
            {
                warn!(
                    appointment_id = %alloc.appointment_id,
                    settled,
                    total_items,
                    error = %e,
                    "payment recording failed mid-checkout"
                );
                return Err(format!(
                    "Payment failed after {settled} of {total_items} appointments settled: {e}"
                ));
            }
        }
        store.set_status_local(&alloc.appointment_id, AppointmentStatus::Completed)?;
        settled += 1;
    }

    info!(
        reference = %reference,
        settled,
        total = split.total,
        change = split.change,
        "checkout settled"
    );

    Ok(serde_json::json!({
        "success": true,
        "reference": reference,
        "settled": settled,
        "total": split.total,
        "paidTotal": split.paid_total,
        "change": split.change,
        "allocations": split.allocations,
    }))
}

// ===========================================================================
// Tests
// ===========================================================================
