//! App lifecycle and about-info commands.

use serde_json::Value;

#[tauri::command]
pub async fn app_get_version() -> Result<Value, String> {
    Ok(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }))
}

/// Version, build metadata, and platform info for the about screen.
#[tauri::command]
pub async fn app_get_about() -> Result<Value, String> {
    Ok(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "buildTimestamp": env!("BUILD_TIMESTAMP"),
        "gitSha": env!("BUILD_GIT_SHA"),
        "platform": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
    }))
}
