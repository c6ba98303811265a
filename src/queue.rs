//! Daily checkout queue for Salon POS.
//!
//! Groups the day's appointments per client ("who is waiting for
//! checkout today") for the dashboard sidebar, and derives the per-day
//! status/revenue totals shown in the header. Everything here is a pure
//! function over an appointment snapshot: no caching, no mutation. The
//! queue is recomputed on every date change and every search keystroke.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use crate::appointments::{Appointment, AppointmentStatus};

// ---------------------------------------------------------------------------
// Day window
// ---------------------------------------------------------------------------

/// Resolve a wall-clock time in the local timezone. Ambiguous times
/// (DST fall-back) take the earlier instant; nonexistent times (DST
/// spring-forward) are pushed forward an hour.
fn resolve_local(naive: chrono::NaiveDateTime) -> DateTime<Local> {
    match Local.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => dt,
        chrono::LocalResult::Ambiguous(earlier, _) => earlier,
        chrono::LocalResult::None => Local
            .from_local_datetime(&(naive + chrono::Duration::hours(1)))
            .earliest()
            .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH.with_timezone(&Local)),
    }
}

/// Inclusive local-time window `[00:00:00.000, 23:59:59.999]` for `date`.
pub fn local_day_window(date: NaiveDate) -> (DateTime<Local>, DateTime<Local>) {
    let start = resolve_local(date.and_time(NaiveTime::MIN));
    let end = resolve_local(
        date.and_hms_milli_opt(23, 59, 59, 999)
            .unwrap_or_else(|| date.and_time(NaiveTime::MIN)),
    );
    (start, end)
}

fn in_day_window(ts: DateTime<Utc>, window: &(DateTime<Local>, DateTime<Local>)) -> bool {
    let local = ts.with_timezone(&Local);
    local >= window.0 && local <= window.1
}

// ---------------------------------------------------------------------------
// Queue grouping
// ---------------------------------------------------------------------------

/// One appointment line inside a client's queue group, in the order it
/// appeared in the snapshot (never re-sorted).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub id: String,
    pub service_name: Option<String>,
    pub stylist_first_name: Option<String>,
    pub start_time: DateTime<Utc>,
}

/// One client's rolled-up queue position for the selected day.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDailyGroup {
    pub client_id: String,
    pub client_first_name: Option<String>,
    pub client_last_name: Option<String>,
    /// Minimum start time among the group's appointments; the queue is
    /// ordered by this.
    pub earliest_start: DateTime<Utc>,
    pub count: usize,
    pub appointments: Vec<QueueEntry>,
}

fn matches_search(event: &Appointment, needle_lower: &str) -> bool {
    [
        event.client_first_name.as_deref(),
        event.client_last_name.as_deref(),
        event.stylist_first_name.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(needle_lower))
}

/// Build the per-client daily queue.
///
/// Keeps appointments that fall inside the local day window of
/// `selected_date`, are still actionable (not `cancelled`, not
/// `completed`; `rescheduled` stays visible), and match `search`
/// case-insensitively against the client first/last name or stylist
/// first name. Survivors are grouped by client id (rows without one are
/// silently dropped) and the groups come back sorted by earliest start,
/// ties keeping first-appearance order.
pub fn group_daily_queue(
    events: &[Appointment],
    selected_date: NaiveDate,
    search: &str,
) -> Vec<ClientDailyGroup> {
    let window = local_day_window(selected_date);
    let needle = search.trim().to_lowercase();

    let mut groups: Vec<ClientDailyGroup> = Vec::new();
    let mut index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for event in events {
        if !in_day_window(event.start_time, &window) {
            continue;
        }
        if !event.status.is_queue_visible() {
            continue;
        }
        if !needle.is_empty() && !matches_search(event, &needle) {
            continue;
        }
        let Some(client_id) = event.client_id.as_deref() else {
            continue;
        };

        let entry = QueueEntry {
            id: event.id.clone(),
            service_name: event.service_name.clone(),
            stylist_first_name: event.stylist_first_name.clone(),
            start_time: event.start_time,
        };

        match index.get(client_id) {
            Some(&i) => {
                let group = &mut groups[i];
                group.earliest_start = group.earliest_start.min(event.start_time);
                group.count += 1;
                group.appointments.push(entry);
                // Backfill name parts a later row may carry.
                if group.client_first_name.is_none() {
                    group.client_first_name = event.client_first_name.clone();
                }
                if group.client_last_name.is_none() {
                    group.client_last_name = event.client_last_name.clone();
                }
            }
            None => {
                index.insert(client_id.to_string(), groups.len());
                groups.push(ClientDailyGroup {
                    client_id: client_id.to_string(),
                    client_first_name: event.client_first_name.clone(),
                    client_last_name: event.client_last_name.clone(),
                    earliest_start: event.start_time,
                    count: 1,
                    appointments: vec![entry],
                });
            }
        }
    }

    // Stable: equal earliest_start keeps group-creation order.
    groups.sort_by(|a, b| a.earliest_start.cmp(&b.earliest_start));
    groups
}

// ---------------------------------------------------------------------------
// Daily totals
// ---------------------------------------------------------------------------

/// Per-day status counts and revenue figures for the dashboard header.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTotals {
    pub scheduled: usize,
    pub checked_in: usize,
    pub checked_out: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub rescheduled: usize,
    /// Sum owed across `checked_out` appointments. Rescheduled items
    /// contribute nothing here even though they stay in the queue.
    pub payable_total: f64,
    /// Revenue already settled today (completed appointments).
    pub completed_revenue: f64,
}

/// Roll up status counts and revenue for `date` from the snapshot.
pub fn daily_totals(events: &[Appointment], date: NaiveDate) -> DailyTotals {
    let window = local_day_window(date);
    let mut totals = DailyTotals::default();
    for event in events {
        if !in_day_window(event.start_time, &window) {
            continue;
        }
        match event.status {
            AppointmentStatus::Scheduled => totals.scheduled += 1,
            AppointmentStatus::CheckedIn => totals.checked_in += 1,
            AppointmentStatus::CheckedOut => {
                totals.checked_out += 1;
                totals.payable_total += event.price;
            }
            AppointmentStatus::Completed => {
                totals.completed += 1;
                totals.completed_revenue += event.price;
            }
            AppointmentStatus::Cancelled => totals.cancelled += 1,
            AppointmentStatus::Rescheduled => totals.rescheduled += 1,
        }
    }
    totals
}

// ===========================================================================
// Tests
// ===========================================================================
