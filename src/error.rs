/// A problem found while loading or unloading a unit. Never fatal: the loader
/// collects these into its reports.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("Unit '{0}' does not exist")]
    UnitNotFound(String),
    #[error("Unit '{0}' is not loaded")]
    NotLoaded(String),
    #[error("'{0}' is not a valid unit name")]
    InvalidUnitName(String),
    #[error("failed to scan '{unit}': {message}")]
    Scan { unit: String, message: String },
    #[error("{file}: {message}")]
    Module { file: String, message: String },
    #[error("{file}: missing name/execute")]
    MissingContract { file: String },
}

/// Why a control command refused to run.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("This command is restricted to the bot owners")]
    Unauthorized,
    #[error("Unit '{unit}' not found.\nAvailable units: {}", .available.join(", "))]
    UnknownUnit { unit: String, available: Vec<String> },
    #[error("Usage: {usage}\nAvailable units: {}", .available.join(", "))]
    Usage {
        usage: &'static str,
        available: Vec<String>,
    },
    #[error("Cannot unload the {0} unit")]
    ProtectedUnit(String),
    #[error(transparent)]
    Platform(#[from] anyhow::Error),
}

/// A failure raised by a command handler while it ran.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("{0}")]
    Script(String),
    #[error(transparent)]
    Platform(#[from] anyhow::Error),
}
