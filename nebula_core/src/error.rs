// nebula_core/src/error.rs

use thiserror::Error;

/// Everything that can stop a filter run.
///
/// `InvalidInput` is raised before the recursion starts. The two numerical
/// variants carry the index of the step at which the recursion aborted; all
/// steps before it are valid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("covariance is not positive definite at step {step}")]
    NumericalInstability { step: usize },

    #[error("innovation covariance is singular at step {step}")]
    SingularInnovationCovariance { step: usize },
}

impl FilterError {
    /// The step at which a numerical failure occurred, if any.
    pub fn step(&self) -> Option<usize> {
        match self {
            FilterError::InvalidInput(_) => None,
            FilterError::NumericalInstability { step }
            | FilterError::SingularInnovationCovariance { step } => Some(*step),
        }
    }

    /// A stable, machine-readable name for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            FilterError::InvalidInput(_) => "invalid_input",
            FilterError::NumericalInstability { .. } => "numerical_instability",
            FilterError::SingularInnovationCovariance { .. } => "singular_innovation_covariance",
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        FilterError::InvalidInput(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numerical_errors_report_their_step() {
        assert_eq!(FilterError::NumericalInstability { step: 4 }.step(), Some(4));
        assert_eq!(
            FilterError::SingularInnovationCovariance { step: 0 }.step(),
            Some(0)
        );
        assert_eq!(FilterError::invalid("bad").step(), None);
    }

    #[test]
    fn display_includes_step_index() {
        let err = FilterError::SingularInnovationCovariance { step: 17 };
        assert_eq!(err.to_string(), "innovation covariance is singular at step 17");
        assert_eq!(err.kind(), "singular_innovation_covariance");
    }
}
