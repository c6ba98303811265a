#![recursion_limit = "256"]

//! Salon POS - Tauri v2 Backend
//!
//! Registers the IPC command handlers the webview frontend calls via
//! `@tauri-apps/api/core::invoke()`: appointment snapshot refresh, the
//! daily checkout queue, lifecycle transitions, split-tender checkout,
//! and terminal onboarding. All durable state lives on the salon admin
//! dashboard; this process only mirrors it.

use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod appointments;
mod checkout;
mod commands;
mod logs;
mod queue;
mod storage;
mod store;

// ---------------------------------------------------------------------------
// Payload helpers
//
// The frontend sends loosely-shaped payloads; these walk a list of
// candidate keys so each command can accept every casing the views use.
// ---------------------------------------------------------------------------

pub(crate) fn value_str(v: &serde_json::Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = v.get(*key).and_then(|x| x.as_str()) {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

pub(crate) fn value_f64(v: &serde_json::Value, keys: &[&str]) -> Option<f64> {
    for key in keys {
        if let Some(n) = v.get(*key).and_then(|x| x.as_f64()) {
            return Some(n);
        }
    }
    None
}

/// Accept either a bare string argument or an object carrying the value
/// under one of `keys`.
pub(crate) fn payload_arg0_as_string(
    arg0: Option<serde_json::Value>,
    keys: &[&str],
) -> Option<String> {
    match arg0 {
        Some(serde_json::Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Some(v) => value_str(&v, keys),
        None => None,
    }
}

// ---------------------------------------------------------------------------
// Background snapshot refresh
// ---------------------------------------------------------------------------

/// Poll the dashboard for today's appointments so the queue stays
/// current even when the cashier isn't acting. Explicit refreshes after
/// writes still happen in the commands; this just bounds staleness.
fn start_refresh_loop(app: tauri::AppHandle, interval_secs: u64) {
    use tauri::{Emitter, Manager};

    tauri::async_runtime::spawn(async move {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(15)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if !storage::is_configured() {
                continue;
            }
            let client = match api::BackendClient::from_stored_credentials() {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "refresh loop: cannot build dashboard client");
                    continue;
                }
            };
            let today = chrono::Local::now().date_naive();
            let state = app.state::<store::AppointmentStore>();
            match store::refresh(&state, &client, today, today).await {
                Ok(count) => {
                    let _ = app.emit(
                        "appointments_refreshed",
                        serde_json::json!({ "count": count, "date": today.to_string() }),
                    );
                }
                Err(e) => warn!(error = %e, "refresh loop: snapshot refresh failed"),
            }
        }
    });
}

// ============================================================================
// App entry point
// ============================================================================

pub fn run() {
    // Initialize structured logging (console + rolling file)
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,salon_pos_lib=debug"));

    logs::prune_old_logs();
    let log_dir = logs::get_log_dir();
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&log_dir, "pos");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let console_layer = fmt::layer().with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    // Keep the guard alive for the lifetime of the app; dropping it
    // flushes logs. Leaked intentionally since the app runs until
    // process exit.
    std::mem::forget(_guard);

    info!("Starting Salon POS v{}", env!("CARGO_PKG_VERSION"));

    tauri::Builder::default()
        .setup(|app| {
            use tauri::Manager;

            app.manage(store::AppointmentStore::new());

            // Poll today's appointments every minute once configured.
            start_refresh_loop(app.handle().clone(), 60);

            info!("appointment store and refresh loop registered");
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // App lifecycle
            commands::runtime::app_get_version,
            commands::runtime::app_get_about,
            // Settings / onboarding
            commands::settings::settings_update_terminal_credentials,
            commands::settings::settings_is_configured,
            commands::settings::settings_get_full_config,
            commands::settings::settings_get_admin_url,
            commands::settings::settings_factory_reset,
            commands::settings::settings_test_connection,
            // Appointments / queue
            commands::appointments::appointments_refresh,
            commands::appointments::appointments_get_all,
            commands::appointments::queue_get_daily,
            commands::appointments::appointments_get_today_metrics,
            commands::appointments::appointment_check_in,
            commands::appointments::appointment_check_out,
            commands::appointments::appointment_cancel,
            commands::appointments::appointment_reschedule,
            commands::appointments::appointment_get_available_actions,
            // Checkout
            commands::checkout::checkout_preview,
            commands::checkout::checkout_settle,
        ])
        .run(tauri::generate_context!())
        .expect("error while running Salon POS");
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_str_walks_candidate_keys_and_skips_blanks() {
        let v = serde_json::json!({ "clientId": "  ", "client_id": "c1" });
        assert_eq!(
            value_str(&v, &["clientId", "client_id"]).as_deref(),
            Some("c1")
        );
        assert!(value_str(&v, &["missing"]).is_none());
    }

    #[test]
    fn payload_arg0_as_string_accepts_both_shapes() {
        assert_eq!(
            payload_arg0_as_string(Some(serde_json::json!("apt-1")), &["id"]).as_deref(),
            Some("apt-1")
        );
        assert_eq!(
            payload_arg0_as_string(Some(serde_json::json!({ "id": "apt-2" })), &["id"]).as_deref(),
            Some("apt-2")
        );
        assert!(payload_arg0_as_string(Some(serde_json::json!("   ")), &["id"]).is_none());
        assert!(payload_arg0_as_string(None, &["id"]).is_none());
    }

    #[test]
    fn value_f64_reads_numbers_only() {
        let v = serde_json::json!({ "price": 12.5, "amount": "13" });
        assert_eq!(value_f64(&v, &["price"]), Some(12.5));
        assert_eq!(value_f64(&v, &["amount", "price"]), Some(12.5));
    }
}
