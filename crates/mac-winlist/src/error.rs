use thiserror::Error;

/// Errors that can occur during window-list operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The window list query returned nothing usable.
    #[error("window list unavailable")]
    WindowList,

    /// No running application matches the pid.
    #[error("application not found for pid {0}")]
    AppNotFound(i32),

    /// The application refused activation.
    #[error("activation failed for pid {0}")]
    ActivationFailed(i32),
}

pub type Result<T> = std::result::Result<T, Error>;
