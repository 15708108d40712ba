use std::fmt;

use crate::dataset::Label;

/// Represents the different types of errors that can occur in the text classifier.
#[derive(Debug)]
pub enum ClassifierError {
    /// A label class has no examples in the training split
    InsufficientData { missing: Label, train_size: usize },
    /// Prediction was requested before a pipeline was trained or loaded
    NotTrained,
    /// Error occurred due to invalid input parameters
    ValidationError(String),
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientData { missing, train_size } => write!(
                f,
                "Insufficient data: no '{}' examples among {} training pairs",
                missing, train_size
            ),
            Self::NotTrained => write!(f, "Not trained: no pipeline has been trained or loaded"),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {}
