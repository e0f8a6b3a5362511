// =============================================================================
// Defo Console - Main Library Entry Point
// =============================================================================
// Table of Contents:
// 1. Module Declarations
// 2. Re-exports
// 3. WASM Entry Point
// =============================================================================

// -----------------------------------------------------------------------------
// 1. Module Declarations
// -----------------------------------------------------------------------------

pub mod api;
pub mod config;
pub mod console;
pub mod error;
pub mod session;
pub mod store;
pub mod utils;

// -----------------------------------------------------------------------------
// 2. Re-exports
// -----------------------------------------------------------------------------

pub use api::{ApiClient, Project, ProjectDraft, ProjectId, ProjectPatch, ProjectStatus};
pub use config::ConsoleConfig;
pub use console::Console;
pub use error::{ApiError, ErrorKind, StoreError, StoreResult};
pub use session::{CredentialStore, Session, SessionEvent};
pub use store::{ProjectStore, ProjectsState, StoreSignal, Subscription};

// -----------------------------------------------------------------------------
// 3. WASM Entry Point
// -----------------------------------------------------------------------------

use wasm_bindgen::prelude::*;

/// Install panic hook and console logger (for external callers).
#[wasm_bindgen]
pub fn start() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Debug);
    log::info!("Defo console client loaded");
}
