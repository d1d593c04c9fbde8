//! Error types for engine operations.
//!
//! Only contract violations and infrastructure failures are errors. Domain
//! outcomes (invalid records, capability violations, unassignable jobs,
//! time-window conflicts, drive-time degradation) are collected into the
//! run's report instead.

use std::fmt;

/// Result type for engine operations
pub type OptimizerResult<T> = Result<T, OptimizerError>;

/// Structured context for optimizer errors.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation being performed (e.g., "assign", "sequence_route")
    pub operation: Option<String>,
    /// The entity type involved (e.g., "job", "technician", "run")
    pub entity: Option<String>,
    /// The entity ID if applicable
    pub entity_id: Option<String>,
    /// Additional details about the error
    pub details: Option<String>,
    /// Whether the caller may retry later
    pub retryable: bool,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn with_entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(ref entity) = self.entity {
            parts.push(format!("entity={}", entity));
        }
        if let Some(ref id) = self.entity_id {
            parts.push(format!("id={}", id));
        }
        if let Some(ref details) = self.details {
            parts.push(format!("details={}", details));
        }
        if self.retryable {
            parts.push("retryable=true".to_string());
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OptimizerError {
    /// A caller broke an engine contract, e.g. sequencing jobs that are not
    /// in the technician's assignment.
    #[error("Precondition failed: {message} {context}")]
    Precondition {
        message: String,
        context: ErrorContext,
    },

    /// Referenced job or technician does not exist in the snapshot.
    #[error("Not found: {message} {context}")]
    NotFound {
        message: String,
        context: ErrorContext,
    },

    /// Mutation would leave the assignment inconsistent (wrong pair arity,
    /// duplicate technician, job already assigned).
    #[error("Invalid assignment: {message} {context}")]
    InvalidAssignment {
        message: String,
        context: ErrorContext,
    },

    /// Another run owns the scheduling day.
    #[error("Run in progress: {message} {context}")]
    RunInProgress {
        message: String,
        context: ErrorContext,
    },

    #[error("Internal error: {message} {context}")]
    Internal {
        message: String,
        context: ErrorContext,
    },
}

impl OptimizerError {
    pub fn precondition(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Precondition {
            message: message.into(),
            context,
        }
    }

    pub fn not_found(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::NotFound {
            message: message.into(),
            context,
        }
    }

    pub fn invalid_assignment(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::InvalidAssignment {
            message: message.into(),
            context,
        }
    }

    pub fn run_in_progress(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::RunInProgress {
            message: message.into(),
            context: context.retryable(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Precondition { context, .. }
            | Self::NotFound { context, .. }
            | Self::InvalidAssignment { context, .. }
            | Self::RunInProgress { context, .. }
            | Self::Internal { context, .. } => context,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.context().retryable
    }
}
