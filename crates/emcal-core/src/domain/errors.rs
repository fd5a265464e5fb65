use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CalibResult<T> = Result<T, CalibError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalibErrorCategory {
    Success,
    MissingData,
    UnknownConfiguration,
    ComputationError,
    InternalError,
}

impl CalibErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::MissingData => 2,
            Self::UnknownConfiguration => 3,
            Self::ComputationError => 4,
            Self::InternalError => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::MissingData => "MissingData",
            Self::UnknownConfiguration => "UnknownConfiguration",
            Self::ComputationError => "ComputationError",
            Self::InternalError => "InternalError",
        }
    }

    /// Whether a per-run sweep may continue after this error.
    ///
    /// Missing data and unknown configurations are skip-with-log conditions;
    /// computation and internal errors abort the offending run but the batch
    /// loop decides whether to keep going.
    pub const fn is_skippable(self) -> bool {
        matches!(self, Self::MissingData | Self::UnknownConfiguration)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibError {
    category: CalibErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl CalibError {
    pub fn new(
        category: CalibErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn missing_data(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(CalibErrorCategory::MissingData, placeholder, message)
    }

    pub fn unknown_configuration(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(
            CalibErrorCategory::UnknownConfiguration,
            placeholder,
            message,
        )
    }

    pub fn computation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(CalibErrorCategory::ComputationError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(CalibErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> CalibErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }
}

impl Display for CalibError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.as_str(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for CalibError {}

#[cfg(test)]
mod tests {
    use super::{CalibError, CalibErrorCategory};

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (CalibErrorCategory::Success, 0),
            (CalibErrorCategory::MissingData, 2),
            (CalibErrorCategory::UnknownConfiguration, 3),
            (CalibErrorCategory::ComputationError, 4),
            (CalibErrorCategory::InternalError, 5),
        ];
        for (category, exit_code) in cases {
            assert_eq!(category.exit_code(), exit_code);
        }
    }

    #[test]
    fn skippable_categories_cover_per_run_conditions() {
        assert!(CalibErrorCategory::MissingData.is_skippable());
        assert!(CalibErrorCategory::UnknownConfiguration.is_skippable());
        assert!(!CalibErrorCategory::ComputationError.is_skippable());
        assert!(!CalibErrorCategory::InternalError.is_skippable());
    }

    #[test]
    fn diagnostic_line_names_the_placeholder() {
        let error = CalibError::missing_data("IO.EVENT_FILE", "Run 412 has no event file");
        assert_eq!(error.exit_code(), 2);
        assert_eq!(
            error.diagnostic_line(),
            "ERROR: [IO.EVENT_FILE] Run 412 has no event file"
        );
    }
}
