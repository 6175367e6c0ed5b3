//! Structured logging field name constants for pixshelf.
//!
//! All crates use these names for structured `tracing` fields so log
//! aggregation can query by the same keys across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, per-pid failure inside a batch |
//! | INFO  | Lifecycle events, batch start/completion |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-row iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "upstream", "sync"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "client", "reconciler", "refresh", "search"
pub const COMPONENT: &str = "component";

/// Logical operation name.
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// External artwork identifier.
pub const PID: &str = "pid";

/// Refresh job UUID.
pub const JOB_ID: &str = "job_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows returned by a query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of pids in a refresh working set.
pub const PID_COUNT: &str = "pid_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
