//! Canonical error taxonomy for entigraph-core.
//!
//! Two complementary error shapes live here, mirroring the split the rest of
//! the ecosystem uses: a `thiserror` enum (`EntigraphError`) for `?`-based
//! propagation and exhaustive `match`, and a structured `ExError` carrying
//! operation/entity/request context for logging. `log_op_error!`
//! (`logging_facility::macros`) converts any `EntigraphError` into an
//! `ExError` before emitting it.

use entigraph_core_types::{RequestId, TraceId};
use thiserror::Error;
use uuid::Uuid;

/// Result type alias using [`EntigraphError`].
pub type Result<T> = std::result::Result<T, EntigraphError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy.
///
/// Each kind maps to a stable error code usable for programmatic handling,
/// testing, and diagnostics independent of the `Display` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    /// Address string has a bad `@` prefix or an invalid UUID.
    MalformedAddress,
    /// An address or id does not resolve to anything in the registry.
    UnknownEntity,
    /// A segment lookup failed partway through an address path.
    BadPath,
    /// A broken ownership/containment invariant, or an unresolvable fork cycle.
    InvariantViolation,
    /// `get_cold`/fork referenced a version not present in the snapshot store.
    UnknownVersion,
    /// `execute`/`aexecute` named a function that was never registered.
    UnknownFunction,
    /// Kwarg classification/resolution produced an inconsistent input shape.
    InputAssemblyError,
    /// The user-supplied callable raised during execution.
    UserFunctionError,
    /// Accepted from an external collaborator (e.g. a coarse-descriptor
    /// resolver) when multiple entities match; never raised by this crate.
    AmbiguousEntity,
    /// Internal invariant the crate itself is responsible for, not the caller.
    Internal,
}

impl ExErrorKind {
    /// The stable error code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::MalformedAddress => "ERR_MALFORMED_ADDRESS",
            ExErrorKind::UnknownEntity => "ERR_UNKNOWN_ENTITY",
            ExErrorKind::BadPath => "ERR_BAD_PATH",
            ExErrorKind::InvariantViolation => "ERR_INVARIANT_VIOLATION",
            ExErrorKind::UnknownVersion => "ERR_UNKNOWN_VERSION",
            ExErrorKind::UnknownFunction => "ERR_UNKNOWN_FUNCTION",
            ExErrorKind::InputAssemblyError => "ERR_INPUT_ASSEMBLY",
            ExErrorKind::UserFunctionError => "ERR_USER_FUNCTION",
            ExErrorKind::AmbiguousEntity => "ERR_AMBIGUOUS_ENTITY",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type.
///
/// Carries classification fields for programmatic handling plus rich
/// context for debugging and structured logging.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_id: Option<Uuid>,
    address: Option<String>,
    request_id: Option<RequestId>,
    trace_id: Option<TraceId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind.
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            address: None,
            request_id: None,
            trace_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Attach operation context (the function/method name raising this error).
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Attach the `ecs_id` this error concerns.
    pub fn with_entity_id(mut self, id: Uuid) -> Self {
        self.entity_id = Some(id);
        self
    }

    /// Attach the raw address string this error concerns.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Attach request-correlation context.
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Attach trace-correlation context.
    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    /// Attach a human-readable message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach the error this one was raised in response to.
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// The error kind.
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// The stable error code.
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// The operation context, if any.
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// The entity id context, if any.
    pub fn entity_id(&self) -> Option<Uuid> {
        self.entity_id
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The source error, if any.
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        if let Some(address) = &self.address {
            write!(f, " (address: {})", address)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

// ========== End Error Facility ==========

/// Comprehensive error taxonomy for entigraph-core operations.
///
/// Exactly the kinds named in spec §7, plus `UnknownVersion` (named only in
/// the fork error semantics of §4.C).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EntigraphError {
    /// Address string has a bad `@` prefix or fails to parse as a UUID.
    #[error("malformed address: {address}")]
    MalformedAddress { address: String },

    /// An address or id does not resolve to anything registered.
    #[error("unknown entity: {ecs_id}")]
    UnknownEntity { ecs_id: Uuid },

    /// Segment lookup failed partway through an address path.
    #[error("bad path at segment {consumed}: {reason}")]
    BadPath { consumed: usize, reason: String },

    /// A broken ownership/containment invariant, or an unresolvable cycle
    /// encountered while forking.
    #[error("invariant violation: {reason}")]
    InvariantViolation { reason: String },

    /// A referenced `ecs_id` has no cold snapshot in the registry.
    #[error("unknown version: {ecs_id}")]
    UnknownVersion { ecs_id: Uuid },

    /// `execute`/`aexecute` named a function that was never registered.
    #[error("unknown function: {name}")]
    UnknownFunction { name: String },

    /// Kwarg classification or resolution produced an inconsistent shape
    /// (e.g. a field expected to be an entity resolved to a primitive).
    #[error("input assembly error for '{field}': {reason}")]
    InputAssemblyError { field: String, reason: String },

    /// The user-supplied callable raised. The execution entity that
    /// recorded the failure is carried alongside for correlation.
    #[error("user function '{function}' failed: {message}")]
    UserFunctionError {
        function: String,
        message: String,
        execution_id: Uuid,
    },

    /// Multiple entities matched a coarse descriptor from an external
    /// collaborator (e.g. the game/grid example). Never constructed by
    /// this crate; the taxonomy only needs to carry it unchanged.
    #[error("ambiguous entity: {reason}")]
    AmbiguousEntity { reason: String },
}

impl EntigraphError {
    /// Map to the coarse [`ExErrorKind`] used for logging/classification.
    pub fn kind(&self) -> ExErrorKind {
        match self {
            EntigraphError::MalformedAddress { .. } => ExErrorKind::MalformedAddress,
            EntigraphError::UnknownEntity { .. } => ExErrorKind::UnknownEntity,
            EntigraphError::BadPath { .. } => ExErrorKind::BadPath,
            EntigraphError::InvariantViolation { .. } => ExErrorKind::InvariantViolation,
            EntigraphError::UnknownVersion { .. } => ExErrorKind::UnknownVersion,
            EntigraphError::UnknownFunction { .. } => ExErrorKind::UnknownFunction,
            EntigraphError::InputAssemblyError { .. } => ExErrorKind::InputAssemblyError,
            EntigraphError::UserFunctionError { .. } => ExErrorKind::UserFunctionError,
            EntigraphError::AmbiguousEntity { .. } => ExErrorKind::AmbiguousEntity,
        }
    }
}

impl From<EntigraphError> for ExError {
    fn from(err: EntigraphError) -> Self {
        let kind = err.kind();
        let mut ex = ExError::new(kind).with_message(err.to_string());
        ex = match &err {
            EntigraphError::MalformedAddress { address } => ex.with_address(address.clone()),
            EntigraphError::UnknownEntity { ecs_id } => ex.with_entity_id(*ecs_id),
            EntigraphError::UnknownVersion { ecs_id } => ex.with_entity_id(*ecs_id),
            EntigraphError::UserFunctionError { execution_id, .. } => {
                ex.with_entity_id(*execution_id)
            }
            _ => ex,
        };
        ex
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ex_error_kind_codes_are_stable() {
        assert_eq!(ExErrorKind::MalformedAddress.code(), "ERR_MALFORMED_ADDRESS");
        assert_eq!(ExErrorKind::UnknownFunction.code(), "ERR_UNKNOWN_FUNCTION");
    }

    #[test]
    fn ex_error_display_includes_context() {
        let id = Uuid::nil();
        let err = ExError::new(ExErrorKind::UnknownEntity)
            .with_op("resolve")
            .with_entity_id(id)
            .with_message("not found");
        let rendered = err.to_string();
        assert!(rendered.contains("ERR_UNKNOWN_ENTITY"));
        assert!(rendered.contains("resolve"));
        assert!(rendered.contains("not found"));
    }

    #[test]
    fn entigraph_error_converts_to_ex_error_with_matching_kind() {
        let err = EntigraphError::BadPath {
            consumed: 2,
            reason: "not a field".to_string(),
        };
        let ex: ExError = err.into();
        assert_eq!(ex.kind(), ExErrorKind::BadPath);
        assert!(ex.message().contains("not a field"));
    }
}
