//! IPC command handlers, grouped by domain.

pub mod appointments;
pub mod checkout;
pub mod runtime;
pub mod settings;
