//! Appointment and daily-queue commands.
//!
//! The frontend invokes these with loosely-shaped payloads (plain id
//! strings, camelCase or snake_case objects, legacy positional args);
//! each command normalizes its payload before touching the store.

use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::Value;

use crate::appointments::{available_actions, parse_timestamp, AppointmentAction};
use crate::{api, payload_arg0_as_string, queue, store, value_str};

// ---------------------------------------------------------------------------
// Payload parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct QueueQueryPayload {
    #[serde(default, alias = "selectedDate", alias = "selected_date", alias = "day")]
    date: Option<String>,
    #[serde(default, alias = "searchTerm", alias = "search_term", alias = "query")]
    search: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RefreshRangePayload {
    #[serde(default, alias = "fromDate", alias = "from_date", alias = "start")]
    from: Option<String>,
    #[serde(default, alias = "toDate", alias = "to_date", alias = "end")]
    to: Option<String>,
}

fn parse_date(raw: Option<&str>) -> Result<NaiveDate, String> {
    match raw {
        None => Ok(Local::now().date_naive()),
        Some(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(Local::now().date_naive());
            }
            // Accept a bare date or a full timestamp.
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .or_else(|| parse_timestamp(trimmed).map(|ts| ts.with_timezone(&Local).date_naive()))
                .ok_or_else(|| format!("Invalid date: {trimmed}"))
        }
    }
}

fn parse_queue_query(arg0: Option<Value>) -> Result<(NaiveDate, String), String> {
    let payload: QueueQueryPayload = match arg0 {
        Some(Value::String(date)) => QueueQueryPayload {
            date: Some(date),
            search: None,
        },
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid queue query: {e}"))?,
        None => QueueQueryPayload::default(),
    };
    let date = parse_date(payload.date.as_deref())?;
    Ok((date, payload.search.unwrap_or_default()))
}

fn parse_refresh_range(arg0: Option<Value>) -> Result<(NaiveDate, NaiveDate), String> {
    let payload: RefreshRangePayload = match arg0 {
        Some(Value::String(date)) => RefreshRangePayload {
            from: Some(date.clone()),
            to: Some(date),
        },
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid refresh range: {e}"))?,
        None => RefreshRangePayload::default(),
    };
    let from = parse_date(payload.from.as_deref())?;
    let to = parse_date(payload.to.as_deref())?;
    if to < from {
        return Err(format!("Invalid range: {to} is before {from}"));
    }
    Ok((from, to))
}

fn parse_appointment_id(arg0: Option<Value>) -> Result<String, String> {
    payload_arg0_as_string(arg0, &["appointmentId", "appointment_id", "id"])
        .ok_or("Missing appointmentId".into())
}

fn parse_reschedule_payload(
    arg0: Option<Value>,
    arg1: Option<String>,
) -> Result<(String, chrono::DateTime<chrono::Utc>), String> {
    let payload = match arg0 {
        Some(Value::String(id)) => serde_json::json!({
            "appointmentId": id,
            "newStartTime": arg1,
        }),
        Some(v) => v,
        None => serde_json::json!({ "newStartTime": arg1 }),
    };
    let id = payload_arg0_as_string(
        Some(payload.clone()),
        &["appointmentId", "appointment_id", "id"],
    )
    .ok_or("Missing appointmentId")?;
    let raw_start = value_str(
        &payload,
        &["newStartTime", "new_start_time", "startTime", "start_time"],
    )
    .ok_or("Missing newStartTime")?;
    let new_start =
        parse_timestamp(&raw_start).ok_or_else(|| format!("Invalid newStartTime: {raw_start}"))?;
    Ok((id, new_start))
}

// ---------------------------------------------------------------------------
// Snapshot / queue
// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn appointments_refresh(
    arg0: Option<Value>,
    store: tauri::State<'_, store::AppointmentStore>,
) -> Result<Value, String> {
    let (from, to) = parse_refresh_range(arg0)?;
    let client = api::BackendClient::from_stored_credentials()?;
    let count = store::refresh(&store, &client, from, to).await?;
    Ok(serde_json::json!({
        "success": true,
        "count": count,
        "from": from.to_string(),
        "to": to.to_string(),
    }))
}

#[tauri::command]
pub async fn appointments_get_all(
    store: tauri::State<'_, store::AppointmentStore>,
) -> Result<Value, String> {
    let snapshot = store.snapshot()?;
    Ok(serde_json::json!({
        "appointments": snapshot,
        "lastRefreshed": store.last_refreshed().map(|ts| ts.to_rfc3339()),
    }))
}

#[tauri::command]
pub async fn queue_get_daily(
    arg0: Option<Value>,
    store: tauri::State<'_, store::AppointmentStore>,
) -> Result<Value, String> {
    let (date, search) = parse_queue_query(arg0)?;
    let snapshot = store.snapshot()?;
    let groups = queue::group_daily_queue(&snapshot, date, &search);
    Ok(serde_json::json!({
        "date": date.to_string(),
        "groups": groups,
    }))
}

#[tauri::command]
pub async fn appointments_get_today_metrics(
    arg0: Option<Value>,
    store: tauri::State<'_, store::AppointmentStore>,
) -> Result<Value, String> {
    let (date, _) = parse_queue_query(arg0)?;
    let snapshot = store.snapshot()?;
    let totals = queue::daily_totals(&snapshot, date);
    let mut body = serde_json::to_value(&totals).map_err(|e| e.to_string())?;
    if let Some(obj) = body.as_object_mut() {
        obj.insert("success".to_string(), Value::Bool(true));
        obj.insert("date".to_string(), Value::String(date.to_string()));
    }
    Ok(body)
}

// ---------------------------------------------------------------------------
// Lifecycle transitions
// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn appointment_check_in(
    arg0: Option<Value>,
    store: tauri::State<'_, store::AppointmentStore>,
) -> Result<Value, String> {
    let id = parse_appointment_id(arg0)?;
    let client = api::BackendClient::from_stored_credentials()?;
    store::apply_transition(&store, &client, &id, AppointmentAction::CheckIn, None).await
}

#[tauri::command]
pub async fn appointment_check_out(
    arg0: Option<Value>,
    store: tauri::State<'_, store::AppointmentStore>,
) -> Result<Value, String> {
    let id = parse_appointment_id(arg0)?;
    let client = api::BackendClient::from_stored_credentials()?;
    store::apply_transition(&store, &client, &id, AppointmentAction::CheckOut, None).await
}

#[tauri::command]
pub async fn appointment_cancel(
    arg0: Option<Value>,
    store: tauri::State<'_, store::AppointmentStore>,
) -> Result<Value, String> {
    let id = parse_appointment_id(arg0)?;
    let client = api::BackendClient::from_stored_credentials()?;
    store::apply_transition(&store, &client, &id, AppointmentAction::Cancel, None).await
}

#[tauri::command]
pub async fn appointment_reschedule(
    arg0: Option<Value>,
    arg1: Option<String>,
    store: tauri::State<'_, store::AppointmentStore>,
) -> Result<Value, String> {
    let (id, new_start) = parse_reschedule_payload(arg0, arg1)?;
    let client = api::BackendClient::from_stored_credentials()?;
    store::apply_transition(
        &store,
        &client,
        &id,
        AppointmentAction::Reschedule,
        Some(new_start),
    )
    .await
}

/// Which lifecycle buttons the frontend may enable for one appointment.
#[tauri::command]
pub async fn appointment_get_available_actions(
    arg0: Option<Value>,
    store: tauri::State<'_, store::AppointmentStore>,
) -> Result<Value, String> {
    let id = parse_appointment_id(arg0)?;
    let status = store.status_of(&id)?;
    let actions: Vec<&str> = available_actions(status)
        .into_iter()
        .map(|a| a.as_str())
        .collect();
    Ok(serde_json::json!({
        "appointmentId": id,
        "status": status.as_str(),
        "actions": actions,
    }))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod dto_tests {
    use super::*;

    #[test]
    fn parse_queue_query_supports_string_object_and_empty() {
        let (date, search) =
            parse_queue_query(Some(serde_json::json!("2024-03-12"))).expect("string date");
        assert_eq!(date.to_string(), "2024-03-12");
        assert!(search.is_empty());

        let (date, search) = parse_queue_query(Some(serde_json::json!({
            "date": "2024-03-12",
            "search": "lau"
        })))
        .expect("object payload");
        assert_eq!(date.to_string(), "2024-03-12");
        assert_eq!(search, "lau");

        // No payload falls back to today.
        let (today, _) = parse_queue_query(None).expect("default");
        assert_eq!(today, Local::now().date_naive());
    }

    #[test]
    fn parse_queue_query_accepts_full_timestamps() {
        let (date, _) = parse_queue_query(Some(serde_json::json!({
            "selectedDate": "2024-03-12T15:30:00Z"
        })))
        .expect("timestamp date");
        // Interpreted in local time, so just check it parsed at all.
        assert!(date.to_string().starts_with("2024-03-1"));
    }

    #[test]
    fn parse_refresh_range_rejects_inverted_ranges() {
        let err = parse_refresh_range(Some(serde_json::json!({
            "from": "2024-03-12",
            "to": "2024-03-10"
        })))
        .expect_err("inverted range");
        assert!(err.contains("before"));
    }

    #[test]
    fn parse_appointment_id_supports_object_and_string() {
        let from_obj = parse_appointment_id(Some(serde_json::json!({
            "appointmentId": "apt-1"
        })))
        .expect("object id");
        let from_str =
            parse_appointment_id(Some(serde_json::json!("apt-2"))).expect("string id");
        assert_eq!(from_obj, "apt-1");
        assert_eq!(from_str, "apt-2");
        assert!(parse_appointment_id(None).is_err());
    }

    #[test]
    fn parse_reschedule_supports_legacy_args() {
        let (id, start) = parse_reschedule_payload(
            Some(serde_json::json!("apt-1")),
            Some("2024-04-01T10:00:00Z".to_string()),
        )
        .expect("legacy args");
        assert_eq!(id, "apt-1");
        assert_eq!(start.to_rfc3339(), "2024-04-01T10:00:00+00:00");

        let (id, _) = parse_reschedule_payload(
            Some(serde_json::json!({
                "appointment_id": "apt-2",
                "new_start_time": "2024-04-01T10:00:00Z"
            })),
            None,
        )
        .expect("snake_case payload");
        assert_eq!(id, "apt-2");
    }

    #[test]
    fn parse_reschedule_requires_a_start_time() {
        let err = parse_reschedule_payload(Some(serde_json::json!({ "id": "apt-1" })), None)
            .expect_err("missing start");
        assert!(err.contains("newStartTime"));
    }
}
