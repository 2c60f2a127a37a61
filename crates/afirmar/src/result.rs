//! Result and error types for Afirmar.

use thiserror::Error;

/// Result type for Afirmar operations
pub type AfirmarResult<T> = Result<T, AfirmarError>;

/// Errors that can occur while building or executing a statement
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AfirmarError {
    /// A predicate or assertion needed a target that resolved to nothing
    #[error("Target {target} wasn't found")]
    TargetNotFound {
        /// Label of the target
        target: String,
    },

    /// A resolved target has no component instance attached
    #[error("Target {target} is not a component")]
    NotAComponent {
        /// Label of the target
        target: String,
    },

    /// Injector has no provider for the token
    #[error("No provider for {token}")]
    DependencyNotFound {
        /// Injection token
        token: String,
    },

    /// One or more spies never found their host
    #[error("Spies were never placed: {}", unplaced.join(", "))]
    SpyPlacementFailed {
        /// Every unplaced `host.method` pair
        unplaced: Vec<String>,
    },

    /// Expectation did not hold
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Required configuration missing
    #[error("Misconfiguration: {message}")]
    Misconfiguration {
        /// Error message, including how to fix it
        message: String,
    },

    /// Method does not exist on the host
    #[error("{host} has no method '{method}'")]
    MethodNotFound {
        /// Host description
        host: String,
        /// Method name
        method: String,
    },

    /// Output does not exist on the component
    #[error("{component} has no output '{output}'")]
    OutputNotFound {
        /// Component type
        component: String,
        /// Output name
        output: String,
    },

    /// Selector string could not be parsed
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector {
        /// Selector as written
        selector: String,
        /// Parser message
        message: String,
    },
}

impl AfirmarError {
    /// Build an assertion failure
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            message: message.into(),
        }
    }

    /// Build a target-not-found error
    #[must_use]
    pub fn not_found(target: impl Into<String>) -> Self {
        Self::TargetNotFound {
            target: target.into(),
        }
    }

    /// Whether this error means "the thing does not exist yet".
    ///
    /// Spy placement defers on these and propagates everything else.
    #[must_use]
    pub const fn is_unresolved(&self) -> bool {
        matches!(
            self,
            Self::TargetNotFound { .. } | Self::NotAComponent { .. } | Self::DependencyNotFound { .. }
        )
    }

    /// Whether this is an expectation failure (as opposed to a setup problem)
    #[must_use]
    pub const fn is_assertion(&self) -> bool {
        matches!(self, Self::AssertionFailed { .. })
    }
}
