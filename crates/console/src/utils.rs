// =============================================================================
// Defo Console - Utility Functions
// =============================================================================
// Table of Contents:
// 1. Format Utilities
// 2. Validation Utilities
// =============================================================================

// -----------------------------------------------------------------------------
// 1. Format Utilities
// -----------------------------------------------------------------------------

/// Render a byte count the way dataset cards show it ("1.50 KB", "2.00 GB").
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit + 1 < UNITS.len() {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

// -----------------------------------------------------------------------------
// 2. Validation Utilities
// -----------------------------------------------------------------------------

/// Validate a project name: anything but empty or whitespace.
pub fn is_valid_project_name(name: &str) -> bool {
    !name.trim().is_empty()
}
