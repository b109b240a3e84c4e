use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TidyError {
    #[error("plan configuration invalid: {0}")]
    InvalidConfig(String),
    #[error("classifier response is not valid JSON: {0}")]
    MalformedClassifierResponse(String),
    #[error("invalid date string `{value}`: expected YYYY-MM-DD")]
    InvalidDate { value: String },
    #[error("revert aborted: plan copy not found at {0}")]
    RevertPlanMissing(PathBuf),
    #[error("required input not found: {0}")]
    MissingInput(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TidyErrorCode {
    E001ConfigInvalid,
    E002ClassifierMalformed,
    E003DateCorrupt,
    E004RevertUnsafe,
    E005InputMissing,
}

impl TidyErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E001ConfigInvalid => "E001_CONFIG_INVALID",
            Self::E002ClassifierMalformed => "E002_CLASSIFIER_MALFORMED",
            Self::E003DateCorrupt => "E003_DATE_CORRUPT",
            Self::E004RevertUnsafe => "E004_REVERT_UNSAFE",
            Self::E005InputMissing => "E005_INPUT_MISSING",
        }
    }
}

impl TidyError {
    pub fn code(&self) -> TidyErrorCode {
        match self {
            Self::InvalidConfig(_) => TidyErrorCode::E001ConfigInvalid,
            Self::MalformedClassifierResponse(_) => TidyErrorCode::E002ClassifierMalformed,
            Self::InvalidDate { .. } => TidyErrorCode::E003DateCorrupt,
            Self::RevertPlanMissing(_) => TidyErrorCode::E004RevertUnsafe,
            Self::MissingInput(_) => TidyErrorCode::E005InputMissing,
        }
    }
}

/// Prefix an error chain with its taxonomy code when one is attached.
pub fn describe(err: &anyhow::Error) -> String {
    match err.downcast_ref::<TidyError>() {
        Some(tidy) => format!("[{}] {err:#}", tidy.code().as_str()),
        None => format!("{err:#}"),
    }
}
