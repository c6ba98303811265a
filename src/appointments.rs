//! Appointment model and lifecycle for Salon POS.
//!
//! The admin dashboard sends appointments with inconsistent key casing
//! (`client_id` vs `clientId`, `start_time` vs `startTime` vs `start`).
//! Everything is normalized into the canonical [`Appointment`] struct
//! here, at the adapter boundary, so the queue and checkout logic only
//! ever sees one shape.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{value_f64, value_str};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of an appointment.
///
/// `Scheduled` is the sole initial state (assigned at creation, on the
/// admin side). `Completed` and `Cancelled` admit no further action.
/// `Rescheduled` stays visible in the daily queue but is excluded from
/// every payment flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    CheckedIn,
    CheckedOut,
    Completed,
    #[serde(alias = "canceled")]
    Cancelled,
    Rescheduled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::CheckedIn => "checked_in",
            AppointmentStatus::CheckedOut => "checked_out",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Rescheduled => "rescheduled",
        }
    }

    /// Parse a status string as sent by the admin dashboard. Accepts
    /// snake_case, camelCase, kebab-case, and the US spelling of
    /// "canceled".
    pub fn parse(raw: &str) -> Option<AppointmentStatus> {
        let trimmed = raw.trim();
        // Only split on case boundaries for mixed-case input; all-caps
        // is just shouting, not camelCase.
        let has_lower = trimmed.chars().any(|c| c.is_ascii_lowercase());
        let mut normalized = String::with_capacity(trimmed.len() + 2);
        for c in trimmed.chars() {
            if c.is_ascii_uppercase() {
                if has_lower && !normalized.is_empty() && !normalized.ends_with('_') {
                    normalized.push('_');
                }
                normalized.push(c.to_ascii_lowercase());
            } else if c == '-' || c == ' ' {
                if !normalized.ends_with('_') {
                    normalized.push('_');
                }
            } else {
                normalized.push(c);
            }
        }
        match normalized.as_str() {
            "scheduled" | "booked" => Some(AppointmentStatus::Scheduled),
            "checked_in" => Some(AppointmentStatus::CheckedIn),
            "checked_out" => Some(AppointmentStatus::CheckedOut),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" | "canceled" => Some(AppointmentStatus::Cancelled),
            "rescheduled" => Some(AppointmentStatus::Rescheduled),
            _ => None,
        }
    }

    /// `Completed` and `Cancelled` never appear in the daily queue.
    pub fn is_queue_visible(&self) -> bool {
        !matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled
        )
    }

    /// Only `checked_out` appointments are eligible for payment.
    pub fn is_ready_for_payment(&self) -> bool {
        matches!(self, AppointmentStatus::CheckedOut)
    }
}

// ---------------------------------------------------------------------------
// Actions / transitions
// ---------------------------------------------------------------------------

/// User-triggered lifecycle actions. Completion is not listed: it only
/// happens as a side effect of a fully-settled checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentAction {
    CheckIn,
    CheckOut,
    Cancel,
    Reschedule,
}

impl AppointmentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentAction::CheckIn => "check_in",
            AppointmentAction::CheckOut => "check_out",
            AppointmentAction::Cancel => "cancel",
            AppointmentAction::Reschedule => "reschedule",
        }
    }

    /// The status an appointment lands in when this action succeeds.
    pub fn target_status(&self) -> AppointmentStatus {
        match self {
            AppointmentAction::CheckIn => AppointmentStatus::CheckedIn,
            AppointmentAction::CheckOut => AppointmentStatus::CheckedOut,
            AppointmentAction::Cancel => AppointmentStatus::Cancelled,
            AppointmentAction::Reschedule => AppointmentStatus::Rescheduled,
        }
    }
}

/// Error raised when an action is requested from a status that does not
/// admit it. The command layer rejects these before any backend call.
#[derive(Debug, thiserror::Error)]
#[error("cannot {action} a {status} appointment")]
pub struct TransitionRejected {
    pub status: &'static str,
    pub action: &'static str,
}

/// Check whether `action` is legal from `status`.
pub fn check_transition(
    status: AppointmentStatus,
    action: AppointmentAction,
) -> Result<(), TransitionRejected> {
    let allowed = match action {
        AppointmentAction::CheckIn => matches!(status, AppointmentStatus::Scheduled),
        AppointmentAction::CheckOut => matches!(status, AppointmentStatus::CheckedIn),
        AppointmentAction::Cancel | AppointmentAction::Reschedule => matches!(
            status,
            AppointmentStatus::Scheduled
                | AppointmentStatus::CheckedIn
                | AppointmentStatus::CheckedOut
        ),
    };
    if allowed {
        Ok(())
    } else {
        Err(TransitionRejected {
            status: status.as_str(),
            action: action.as_str(),
        })
    }
}

/// Actions the frontend may expose for an appointment in `status`.
/// Anything not returned here must render as disabled.
pub fn available_actions(status: AppointmentStatus) -> Vec<AppointmentAction> {
    const ALL: [AppointmentAction; 4] = [
        AppointmentAction::CheckIn,
        AppointmentAction::CheckOut,
        AppointmentAction::Cancel,
        AppointmentAction::Reschedule,
    ];
    ALL.into_iter()
        .filter(|a| check_transition(status, *a).is_ok())
        .collect()
}

// ---------------------------------------------------------------------------
// Canonical appointment
// ---------------------------------------------------------------------------

/// Canonical appointment record, as the core logic sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    /// Grouping key for the daily queue. Appointments without one are
    /// dropped from the queue (not an error).
    pub client_id: Option<String>,
    pub client_first_name: Option<String>,
    pub client_last_name: Option<String>,
    pub service_name: Option<String>,
    pub stylist_first_name: Option<String>,
    pub start_time: DateTime<Utc>,
    pub price: f64,
    pub status: AppointmentStatus,
}

impl Appointment {
    /// Normalize one appointment row from the admin dashboard.
    ///
    /// Returns `Err` only when the row is unusable (missing id or start
    /// time); a missing client id is preserved as `None` so the queue
    /// grouper can drop it silently.
    pub fn from_backend(row: &Value) -> Result<Appointment, String> {
        let id = value_str(row, &["id", "appointmentId", "appointment_id"])
            .ok_or("appointment row missing id")?;

        let raw_start = value_str(
            row,
            &["startTime", "start_time", "start", "scheduledAt", "scheduled_at"],
        )
        .ok_or_else(|| format!("appointment {id} missing start time"))?;
        let start_time = parse_timestamp(&raw_start)
            .ok_or_else(|| format!("appointment {id} has unparseable start time: {raw_start}"))?;

        let status = value_str(row, &["status", "appointmentStatus", "appointment_status"])
            .and_then(|s| AppointmentStatus::parse(&s))
            .unwrap_or(AppointmentStatus::Scheduled);

        let price = value_f64(row, &["price", "servicePrice", "service_price", "amount"])
            .unwrap_or(0.0)
            .max(0.0);

        Ok(Appointment {
            id,
            client_id: value_str(row, &["clientId", "client_id", "customerId", "customer_id"]),
            client_first_name: value_str(
                row,
                &["clientFirstName", "client_first_name", "firstName", "first_name"],
            ),
            client_last_name: value_str(
                row,
                &["clientLastName", "client_last_name", "lastName", "last_name"],
            ),
            service_name: value_str(row, &["serviceName", "service_name", "service"]),
            stylist_first_name: value_str(
                row,
                &["stylistFirstName", "stylist_first_name", "stylistName", "staffFirstName"],
            ),
            start_time,
            price,
            status,
        })
    }

    /// "First Last" display name, empty when neither part is known.
    pub fn client_display_name(&self) -> String {
        let mut name = String::new();
        if let Some(first) = self.client_first_name.as_deref() {
            name.push_str(first.trim());
        }
        if let Some(last) = self.client_last_name.as_deref() {
            if !name.is_empty() {
                name.push(' ');
            }
            name.push_str(last.trim());
        }
        name
    }
}

/// Parse an ISO-8601 timestamp, accepting a missing timezone offset
/// (interpreted as UTC, matching what the admin dashboard stores).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_accepts_backend_variants() {
        assert_eq!(
            AppointmentStatus::parse("checkedIn"),
            Some(AppointmentStatus::CheckedIn)
        );
        assert_eq!(
            AppointmentStatus::parse("checked-out"),
            Some(AppointmentStatus::CheckedOut)
        );
        assert_eq!(
            AppointmentStatus::parse("CANCELED"),
            Some(AppointmentStatus::Cancelled)
        );
        assert_eq!(
            AppointmentStatus::parse(" rescheduled "),
            Some(AppointmentStatus::Rescheduled)
        );
        assert_eq!(AppointmentStatus::parse("no-show"), None);
    }

    #[test]
    fn forward_transitions_follow_the_lifecycle() {
        assert!(check_transition(
            AppointmentStatus::Scheduled,
            AppointmentAction::CheckIn
        )
        .is_ok());
        assert!(check_transition(
            AppointmentStatus::CheckedIn,
            AppointmentAction::CheckOut
        )
        .is_ok());
        // No skipping straight to checkout.
        assert!(check_transition(
            AppointmentStatus::Scheduled,
            AppointmentAction::CheckOut
        )
        .is_err());
        // No double check-in.
        assert!(check_transition(
            AppointmentStatus::CheckedIn,
            AppointmentAction::CheckIn
        )
        .is_err());
    }

    #[test]
    fn terminal_states_expose_no_actions() {
        assert!(available_actions(AppointmentStatus::Completed).is_empty());
        assert!(available_actions(AppointmentStatus::Cancelled).is_empty());
        assert!(available_actions(AppointmentStatus::Rescheduled).is_empty());
    }

    #[test]
    fn cancel_and_reschedule_reachable_from_active_states() {
        for status in [
            AppointmentStatus::Scheduled,
            AppointmentStatus::CheckedIn,
            AppointmentStatus::CheckedOut,
        ] {
            let actions = available_actions(status);
            assert!(actions.contains(&AppointmentAction::Cancel), "{status:?}");
            assert!(
                actions.contains(&AppointmentAction::Reschedule),
                "{status:?}"
            );
        }
    }

    #[test]
    fn from_backend_normalizes_key_variants() {
        let camel = serde_json::json!({
            "id": "apt-1",
            "clientId": "c1",
            "clientFirstName": "Laura",
            "serviceName": "Balayage",
            "stylistFirstName": "Marta",
            "startTime": "2024-03-10T09:00:00Z",
            "price": 80.0,
            "status": "checked_in"
        });
        let snake = serde_json::json!({
            "appointment_id": "apt-2",
            "client_id": "c1",
            "client_last_name": "Vega",
            "service": "Cut",
            "start_time": "2024-03-10T10:30:00",
            "service_price": 25.5,
            "status": "checkedOut"
        });

        let a = Appointment::from_backend(&camel).expect("camelCase row");
        assert_eq!(a.client_id.as_deref(), Some("c1"));
        assert_eq!(a.status, AppointmentStatus::CheckedIn);
        assert_eq!(a.price, 80.0);

        let b = Appointment::from_backend(&snake).expect("snake_case row");
        assert_eq!(b.id, "apt-2");
        assert_eq!(b.status, AppointmentStatus::CheckedOut);
        assert_eq!(b.price, 25.5);
        assert_eq!(b.start_time.to_rfc3339(), "2024-03-10T10:30:00+00:00");
    }

    #[test]
    fn from_backend_tolerates_missing_client_and_status() {
        let row = serde_json::json!({
            "id": "apt-3",
            "startTime": "2024-03-10T09:00:00Z"
        });
        let a = Appointment::from_backend(&row).expect("minimal row");
        assert!(a.client_id.is_none());
        assert_eq!(a.status, AppointmentStatus::Scheduled);
        assert_eq!(a.price, 0.0);
    }

    #[test]
    fn from_backend_rejects_rows_without_id_or_start() {
        assert!(Appointment::from_backend(&serde_json::json!({ "id": "x" })).is_err());
        assert!(
            Appointment::from_backend(&serde_json::json!({ "startTime": "2024-03-10T09:00:00Z" }))
                .is_err()
        );
    }

    #[test]
    fn negative_prices_are_clamped() {
        let row = serde_json::json!({
            "id": "apt-4",
            "startTime": "2024-03-10T09:00:00Z",
            "price": -5.0
        });
        let a = Appointment::from_backend(&row).expect("row");
        assert_eq!(a.price, 0.0);
    }

    #[test]
    fn client_display_name_joins_present_parts() {
        let mut a = Appointment::from_backend(&serde_json::json!({
            "id": "apt-5",
            "startTime": "2024-03-10T09:00:00Z",
            "clientFirstName": "Ana"
        }))
        .unwrap();
        assert_eq!(a.client_display_name(), "Ana");
        a.client_last_name = Some("Ruiz".into());
        assert_eq!(a.client_display_name(), "Ana Ruiz");
    }
}
