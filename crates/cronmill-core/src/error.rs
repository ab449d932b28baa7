//! Engine-level errors.
//!
//! Only failures that abort a whole scheduler invocation surface here.
//! Failures of an individual job (the body raising, or its code missing
//! from the registry) are recorded on the instance and never propagate;
//! losing the locking race is a silent no-op.

use crate::expr::ExprError;

/// Fatal failure of one scheduler invocation.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// A registered recurrence expression is malformed. This is a
    /// configuration bug and must be visible immediately.
    #[error("invalid recurrence for job \"{code}\": {source}")]
    Expression {
        code: String,
        #[source]
        source: ExprError,
    },
    /// The store rejected a read or write. Not retried internally; the next
    /// invocation re-attempts via the same idempotent checks.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
