//! Terminal onboarding and settings commands.

use serde_json::Value;

use crate::{api, storage, value_str};

#[tauri::command]
pub async fn settings_update_terminal_credentials(
    arg0: Option<Value>,
) -> Result<Value, String> {
    let payload = arg0.ok_or("Missing credentials payload")?;
    storage::update_terminal_credentials(&payload)
}

#[tauri::command]
pub async fn settings_is_configured() -> Result<Value, String> {
    Ok(serde_json::json!({ "configured": storage::is_configured() }))
}

#[tauri::command]
pub async fn settings_get_full_config() -> Result<Value, String> {
    Ok(storage::get_full_config())
}

#[tauri::command]
pub async fn settings_get_admin_url() -> Result<Value, String> {
    Ok(serde_json::json!({
        "adminUrl": storage::get_credential("admin_dashboard_url"),
    }))
}

#[tauri::command]
pub async fn settings_factory_reset() -> Result<Value, String> {
    storage::factory_reset()
}

/// Health-check the dashboard with either explicit credentials (during
/// onboarding, before anything is stored) or the stored ones.
#[tauri::command]
pub async fn settings_test_connection(arg0: Option<Value>) -> Result<Value, String> {
    let (admin_url, api_key) = match arg0 {
        Some(ref payload) => {
            let url = value_str(payload, &["adminUrl", "admin_dashboard_url", "url"]);
            let key = value_str(payload, &["apiKey", "pos_api_key", "key", "connectionString"]);
            match (url, key) {
                (Some(u), Some(k)) => (u, k),
                (None, Some(k)) => {
                    let u = api::extract_admin_url_from_connection_string(&k)
                        .ok_or("Missing adminUrl")?;
                    (u, k)
                }
                _ => stored_credentials()?,
            }
        }
        None => stored_credentials()?,
    };

    let result = api::test_connectivity(&admin_url, &api_key).await;
    serde_json::to_value(result).map_err(|e| e.to_string())
}

fn stored_credentials() -> Result<(String, String), String> {
    let key = storage::get_credential("pos_api_key")
        .ok_or("Terminal not configured: missing API key")?;
    let url = storage::get_credential("admin_dashboard_url")
        .or_else(|| api::extract_admin_url_from_connection_string(&key))
        .ok_or("Terminal not configured: missing dashboard URL")?;
    Ok((url, key))
}
