//! # Error taxonomy of the furnace engine
//!
//! | Variant | Code | Fatal |
//! |---------|------|-------|
//! | `Validation` | E001 | rejected before the run starts |
//! | `MeshInitialization` | E002 | aborts configuration |
//! | `NumericalInstability` | E003 | run goes to `Failed` |
//! | `Convergence` | E004 | recoverable once, then `Failed` |
//! | `FormulaEvaluation` | E008 | local fallback when a base value exists |
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FurnaceError {
    #[error("invalid parameter `{field}`: {message}")]
    Validation { field: String, message: String },

    #[error("mesh initialization failed: {0}")]
    MeshInitialization(String),

    #[error("numerical instability at step {step} (t = {time:.4} s): {message}")]
    NumericalInstability {
        step: usize,
        time: f64,
        message: String,
    },

    #[error("SOR did not converge in {iterations} iterations (residual {residual:.3e}, tolerance {tolerance:.3e})")]
    Convergence {
        iterations: usize,
        residual: f64,
        tolerance: f64,
    },

    #[error("formula `{formula}`: {message}")]
    FormulaEvaluation { formula: String, message: String },

    #[error("operation `{operation}` is not allowed in state {state}")]
    InvalidTransition { operation: String, state: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FurnaceError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        FurnaceError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn formula(formula: &str, message: impl Into<String>) -> Self {
        FurnaceError::FormulaEvaluation {
            formula: formula.to_string(),
            message: message.into(),
        }
    }

    /// code reported at the boundary of the engine
    pub fn code(&self) -> Option<&'static str> {
        match self {
            FurnaceError::Validation { .. } => Some("E001"),
            FurnaceError::MeshInitialization(_) => Some("E002"),
            FurnaceError::NumericalInstability { .. } => Some("E003"),
            FurnaceError::Convergence { .. } => Some("E004"),
            FurnaceError::FormulaEvaluation { .. } => Some("E008"),
            FurnaceError::InvalidTransition { .. }
            | FurnaceError::Io(_)
            | FurnaceError::Json(_) => None,
        }
    }
}

pub type FurnaceResult<T> = Result<T, FurnaceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_the_boundary_table() {
        assert_eq!(FurnaceError::validation("nr", "too small").code(), Some("E001"));
        assert_eq!(
            FurnaceError::MeshInitialization("nz < 2".into()).code(),
            Some("E002")
        );
        let err = FurnaceError::Convergence {
            iterations: 10,
            residual: 1.0,
            tolerance: 1e-6,
        };
        assert_eq!(err.code(), Some("E004"));
        assert_eq!(FurnaceError::formula("k*", "eof").code(), Some("E008"));
        let msg = FurnaceError::validation("torchPosition", "outside furnace").to_string();
        assert!(msg.contains("torchPosition"));
    }
}
