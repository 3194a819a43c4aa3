use std::fmt;

use stride_platform::PlatformError;

/// Errors that abort an activation.
///
/// Persistence and scheduler failures never appear here; they are logged and
/// absorbed where they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Motion permission was not granted.
    PermissionDenied {
        /// Prompts shown before giving up.
        prompts: u32,
        /// Whether the platform would still allow another prompt.
        can_ask_again: bool,
    },
    /// A sensor call the activation depends on failed.
    Platform(PlatformError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::PermissionDenied {
                prompts,
                can_ask_again: false,
            } => write!(f, "could not get permission (re-prompt disallowed after {prompts} prompt(s))"),
            EngineError::PermissionDenied {
                prompts,
                can_ask_again: true,
            } => write!(f, "could not get permission (gave up after {prompts} prompt(s))"),
            EngineError::Platform(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Platform(e) => Some(e),
            EngineError::PermissionDenied { .. } => None,
        }
    }
}

impl From<PlatformError> for EngineError {
    fn from(e: PlatformError) -> Self {
        EngineError::Platform(e)
    }
}

impl EngineError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, EngineError::PermissionDenied { .. })
    }
}
