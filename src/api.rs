//! Salon admin dashboard API client.
//!
//! Authenticated HTTP access to the admin dashboard: appointment
//! fetches, lifecycle transitions, and payment recording. The dashboard
//! is the system of record; this terminal never persists anything, it
//! mirrors and refetches.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::appointments::{Appointment, AppointmentStatus};
use crate::checkout::PaymentMethod;

/// Default timeout for API requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout used specifically for the lightweight connectivity test.
const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the admin dashboard URL:
/// - strip trailing slashes
/// - strip a trailing `/api` segment
/// - ensure a scheme is present (https, or http for localhost)
pub fn normalize_admin_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }
    if url.ends_with("/api") {
        url.truncate(url.len() - 4);
    }
    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Connection-string onboarding
// ---------------------------------------------------------------------------

/// Onboarding QR codes carry a base64url JSON payload
/// `{"url": ..., "key": ..., "tid": ...}`; pasting the raw JSON works
/// too.
fn decode_connection_string_payload(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        return serde_json::from_str::<Value>(trimmed).ok();
    }

    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.starts_with('{') {
        return serde_json::from_str::<Value>(&compact).ok();
    }
    if compact.len() < 20 {
        return None;
    }

    let base64 = compact.replace('-', "+").replace('_', "/");
    let padded = format!(
        "{}{}",
        base64,
        "=".repeat((4usize.wrapping_sub(base64.len() % 4)) % 4)
    );
    let decoded = BASE64_STANDARD.decode(padded).ok()?;
    serde_json::from_slice::<Value>(&decoded).ok()
}

pub fn extract_api_key_from_connection_string(raw: &str) -> Option<String> {
    decode_connection_string_payload(raw)
        .and_then(|v| {
            v.get("key")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty())
}

pub fn extract_admin_url_from_connection_string(raw: &str) -> Option<String> {
    decode_connection_string_payload(raw)
        .and_then(|v| {
            v.get("url")
                .and_then(Value::as_str)
                .map(normalize_admin_url)
        })
        .filter(|s| !s.is_empty())
}

pub fn extract_terminal_id_from_connection_string(raw: &str) -> Option<String> {
    decode_connection_string_payload(raw)
        .and_then(|v| {
            v.get("tid")
                .or_else(|| v.get("terminalId"))
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach salon dashboard at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid salon dashboard URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Convert an HTTP status code into a user-friendly message.
fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        401 => "API key is invalid or expired".to_string(),
        403 => "Terminal not authorized for this salon".to_string(),
        404 => "Salon dashboard endpoint not found".to_string(),
        409 => "Appointment was changed on the dashboard, refresh and retry".to_string(),
        s if s >= 500 => format!("Salon dashboard server error (HTTP {s})"),
        s => format!("Unexpected response from salon dashboard (HTTP {s})"),
    }
}

// ---------------------------------------------------------------------------
// Connectivity test
// ---------------------------------------------------------------------------

/// Result of a connectivity test.
#[derive(serde::Serialize)]
pub struct ConnectivityResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Test connectivity to the salon dashboard with a lightweight health-check.
pub async fn test_connectivity(admin_url: &str, api_key: &str) -> ConnectivityResult {
    let url = normalize_admin_url(admin_url);
    let resolved_api_key =
        extract_api_key_from_connection_string(api_key).unwrap_or_else(|| api_key.to_string());
    let health_url = format!("{url}/api/health");

    let client = match Client::builder().timeout(CONNECTIVITY_TIMEOUT).build() {
        Ok(c) => c,
        Err(e) => {
            return ConnectivityResult {
                success: false,
                latency_ms: None,
                error: Some(format!("Failed to create HTTP client: {e}")),
            };
        }
    };

    let start = Instant::now();
    let resp = match client
        .get(&health_url)
        .header("X-Salon-API-Key", resolved_api_key)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            return ConnectivityResult {
                success: false,
                latency_ms: None,
                error: Some(friendly_error(&url, &e)),
            };
        }
    };

    let latency = start.elapsed().as_millis() as u64;
    let status = resp.status();

    if status.is_success() {
        info!(latency_ms = latency, "connectivity test passed");
        ConnectivityResult {
            success: true,
            latency_ms: Some(latency),
            error: None,
        }
    } else {
        ConnectivityResult {
            success: false,
            latency_ms: Some(latency),
            error: Some(status_error(status)),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Authenticated client bound to one salon dashboard.
pub struct BackendClient {
    base_url: String,
    api_key: String,
    terminal_id: String,
    http: Client,
}

impl BackendClient {
    pub fn new(admin_url: &str, api_key: &str, terminal_id: &str) -> Result<BackendClient, String> {
        let base_url = normalize_admin_url(admin_url);
        if base_url.trim().is_empty() {
            return Err("Terminal not configured: missing dashboard URL".to_string());
        }
        let api_key = extract_api_key_from_connection_string(api_key)
            .unwrap_or_else(|| api_key.trim().to_string());
        if api_key.is_empty() {
            return Err("Terminal not configured: missing API key".to_string());
        }
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;
        Ok(BackendClient {
            base_url,
            api_key,
            terminal_id: terminal_id.trim().to_string(),
            http,
        })
    }

    /// Build a client from the credentials in the OS keyring.
    pub fn from_stored_credentials() -> Result<BackendClient, String> {
        let raw_key = crate::storage::get_credential("pos_api_key")
            .ok_or("Terminal not configured: missing API key")?;
        let admin_url = crate::storage::get_credential("admin_dashboard_url")
            .or_else(|| extract_admin_url_from_connection_string(&raw_key))
            .ok_or("Terminal not configured: missing dashboard URL")?;
        let terminal_id = crate::storage::get_credential("terminal_id")
            .or_else(|| extract_terminal_id_from_connection_string(&raw_key))
            .unwrap_or_default();
        BackendClient::new(&admin_url, &raw_key, &terminal_id)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, String> {
        let full_url = format!("{}{path}", self.base_url);

        let mut req = self
            .http
            .request(method, &full_url)
            .header("X-Salon-API-Key", &self.api_key)
            .header("x-terminal-id", &self.terminal_id)
            .header("Content-Type", "application/json");
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;
        let status = resp.status();

        if !status.is_success() {
            // Preserve validation details so the toast says what the
            // dashboard rejected, not just the status code.
            let body_text = resp.text().await.unwrap_or_default();
            let detail = if let Ok(json) = serde_json::from_str::<Value>(&body_text) {
                let message = json
                    .get("error")
                    .or_else(|| json.get("message"))
                    .and_then(Value::as_str)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| status_error(status));
                format!("{message} (HTTP {})", status.as_u16())
            } else if !body_text.trim().is_empty() {
                format!(
                    "{} (HTTP {}): {}",
                    status_error(status),
                    status.as_u16(),
                    body_text.trim()
                )
            } else {
                format!("{} (HTTP {})", status_error(status), status.as_u16())
            };
            return Err(detail);
        }

        let body_text = resp.text().await.unwrap_or_default();
        if body_text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body_text)
            .map_err(|e| format!("Invalid JSON from salon dashboard: {e}"))
    }

    // -- Appointments --------------------------------------------------------

    /// Fetch appointments in `[from, to]` and normalize each row into
    /// the canonical shape. Malformed rows are skipped with a warning
    /// rather than failing the whole fetch.
    pub async fn fetch_appointments(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, String> {
        let path = format!("/api/pos/appointments?from={from}&to={to}");
        let resp = self.request(Method::GET, &path, None).await?;

        let rows = resp
            .get("appointments")
            .or_else(|| resp.get("data"))
            .and_then(Value::as_array)
            .cloned()
            .or_else(|| resp.as_array().cloned())
            .unwrap_or_default();

        let mut events = Vec::with_capacity(rows.len());
        for row in &rows {
            match Appointment::from_backend(row) {
                Ok(a) => events.push(a),
                Err(e) => warn!("skipping malformed appointment row: {e}"),
            }
        }
        Ok(events)
    }

    pub async fn check_in(&self, appointment_id: &str) -> Result<Value, String> {
        let path = format!("/api/pos/appointments/{appointment_id}/check-in");
        self.request(Method::PATCH, &path, None).await
    }

    pub async fn check_out(&self, appointment_id: &str) -> Result<Value, String> {
        let path = format!("/api/pos/appointments/{appointment_id}/check-out");
        self.request(Method::PATCH, &path, None).await
    }

    /// Generic status PATCH; used for cancellation and as the last
    /// fallback tier of a reschedule.
    pub async fn set_status(
        &self,
        appointment_id: &str,
        status: AppointmentStatus,
    ) -> Result<Value, String> {
        let path = format!("/api/pos/appointments/{appointment_id}/status");
        let body = serde_json::json!({ "status": status.as_str() });
        self.request(Method::PATCH, &path, Some(&body)).await
    }

    /// Reschedule an appointment to `new_start`.
    ///
    /// Dashboard deployments differ in which endpoints they expose, so
    /// this walks a three-tier fallback chain: the dedicated reschedule
    /// endpoint, then a generic appointment PATCH carrying the new
    /// start time, then a status-only PATCH. Only the last failure is
    /// returned; earlier tiers log at debug.
    pub async fn reschedule(
        &self,
        appointment_id: &str,
        new_start: DateTime<Utc>,
    ) -> Result<Value, String> {
        let body = serde_json::json!({
            "newStartTime": new_start.to_rfc3339(),
            "status": AppointmentStatus::Rescheduled.as_str(),
        });

        let dedicated = format!("/api/pos/appointments/{appointment_id}/reschedule");
        match self.request(Method::PATCH, &dedicated, Some(&body)).await {
            Ok(v) => return Ok(v),
            Err(e) => {
                debug!(appointment_id, error = %e, "dedicated reschedule endpoint failed, trying generic PATCH")
            }
        }

        let generic = format!("/api/pos/appointments/{appointment_id}");
        match self.request(Method::PATCH, &generic, Some(&body)).await {
            Ok(v) => return Ok(v),
            Err(e) => {
                debug!(appointment_id, error = %e, "generic appointment PATCH failed, trying status-only PATCH")
            }
        }

        self.set_status(appointment_id, AppointmentStatus::Rescheduled)
            .await
    }

    // -- Payments ------------------------------------------------------------

    /// Record one payment against one appointment. A mixed-tender line
    /// item produces two of these calls, one per method.
    pub async fn record_payment(
        &self,
        appointment_id: &str,
        amount: f64,
        method: PaymentMethod,
        reference: &str,
    ) -> Result<Value, String> {
        let body = serde_json::json!({
            "appointmentId": appointment_id,
            "amount": amount,
            "paymentMethod": method.as_str(),
            "reference": reference,
        });
        self.request(Method::POST, "/api/pos/payments", Some(&body))
            .await
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_admin_url_adds_scheme_and_strips_api() {
        assert_eq!(
            normalize_admin_url("salon.example.com/api/"),
            "https://salon.example.com"
        );
        assert_eq!(
            normalize_admin_url("localhost:3000"),
            "http://localhost:3000"
        );
        assert_eq!(
            normalize_admin_url("https://dash.example.com///"),
            "https://dash.example.com"
        );
    }

    #[test]
    fn connection_string_roundtrip() {
        let payload = serde_json::json!({
            "url": "https://dash.example.com",
            "key": "sk-test-123",
            "tid": "front-desk-1"
        });
        let encoded = BASE64_STANDARD.encode(payload.to_string());

        assert_eq!(
            extract_api_key_from_connection_string(&encoded).as_deref(),
            Some("sk-test-123")
        );
        assert_eq!(
            extract_admin_url_from_connection_string(&encoded).as_deref(),
            Some("https://dash.example.com")
        );
        assert_eq!(
            extract_terminal_id_from_connection_string(&encoded).as_deref(),
            Some("front-desk-1")
        );
    }

    #[test]
    fn connection_string_accepts_raw_json() {
        let raw = r#"{ "url": "dash.example.com", "key": "k1" }"#;
        assert_eq!(
            extract_api_key_from_connection_string(raw).as_deref(),
            Some("k1")
        );
        assert_eq!(
            extract_admin_url_from_connection_string(raw).as_deref(),
            Some("https://dash.example.com")
        );
        assert!(extract_terminal_id_from_connection_string(raw).is_none());
    }

    #[test]
    fn plain_api_keys_are_not_connection_strings() {
        assert!(extract_api_key_from_connection_string("sk-plain-key").is_none());
    }
}
