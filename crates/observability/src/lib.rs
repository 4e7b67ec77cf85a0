//! Process-wide tracing setup shared by the server and the operator CLI.

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::Json);
}

/// Initialize with human-readable output (operator CLI).
pub fn init_pretty() {
    tracing::init(LogFormat::Pretty);
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line (server).
    Json,
    /// Compact text (interactive CLI).
    Pretty,
}

/// Tracing configuration (filters, layers).
pub mod tracing;
