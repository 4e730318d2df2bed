//! Error types for the analytics pipeline.
//!
//! Every failure the normalizer, extractor, analyzers and forecast evaluator
//! can raise is an [`AnalyticsError`]. Variants carry the same structured
//! [`ErrorContext`] used by repository errors.

use crate::db::repository::{ErrorContext, RepositoryError};

/// Result type for analytics operations
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    /// A required field was absent from every source that could supply it.
    #[error("Missing field: {field} {context}")]
    MissingField { field: String, context: ErrorContext },

    /// Too few points (or gaps/missing values) for the requested computation.
    #[error("Insufficient data: {message} {context}")]
    InsufficientData {
        message: String,
        context: ErrorContext,
    },

    /// Parameters that can never produce a result (window of zero, kernel wider than a step, ...).
    #[error("Invalid configuration: {message} {context}")]
    InvalidConfig {
        message: String,
        context: ErrorContext,
    },

    /// Live feed could not be fetched or decoded.
    #[error("External fetch error: {message} {context}")]
    ExternalFetchError {
        message: String,
        context: ErrorContext,
    },

    /// A model produced NaN or infinity.
    #[error("Non-finite value: {message} {context}")]
    NonFinite {
        message: String,
        context: ErrorContext,
    },

    /// One run of a repeated evaluation failed; `run` is zero-based.
    #[error("Evaluation run {run} failed: {source}")]
    RunFailed {
        run: usize,
        source: Box<AnalyticsError>,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AnalyticsError {
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn insufficient_data(message: impl Into<String>) -> Self {
        Self::InsufficientData {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Fetch failures are transient by nature and marked retryable.
    pub fn external_fetch(message: impl Into<String>) -> Self {
        Self::ExternalFetchError {
            message: message.into(),
            context: ErrorContext::default().retryable(),
        }
    }

    pub fn non_finite(message: impl Into<String>) -> Self {
        Self::NonFinite {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn run_failed(run: usize, source: AnalyticsError) -> Self {
        Self::RunFailed {
            run,
            source: Box::new(source),
        }
    }

    /// Get the error context, if this variant carries one.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::MissingField { context, .. }
            | Self::InsufficientData { context, .. }
            | Self::InvalidConfig { context, .. }
            | Self::ExternalFetchError { context, .. }
            | Self::NonFinite { context, .. } => Some(context),
            Self::RunFailed { source, .. } => source.context(),
            Self::Repository(e) => Some(e.context()),
        }
    }

    fn context_mut(&mut self) -> Option<&mut ErrorContext> {
        match self {
            Self::MissingField { context, .. }
            | Self::InsufficientData { context, .. }
            | Self::InvalidConfig { context, .. }
            | Self::ExternalFetchError { context, .. }
            | Self::NonFinite { context, .. } => Some(context),
            Self::RunFailed { .. } | Self::Repository(_) => None,
        }
    }

    /// Add or update the operation in the error context.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        if let Some(context) = self.context_mut() {
            context.operation = Some(operation.into());
        }
        self
    }

    /// Attach the station the failure relates to.
    pub fn with_station(mut self, station_id: impl ToString) -> Self {
        if let Some(context) = self.context_mut() {
            context.entity = Some("station".to_string());
            context.entity_id = Some(station_id.to_string());
        }
        self
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Repository(e) => e.is_retryable(),
            other => other.context().map(|c| c.retryable).unwrap_or(false),
        }
    }
}
