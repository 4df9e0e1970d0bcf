use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Network interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("Failed to list interfaces: {0}")]
    InterfaceList(String),

    #[error("Insufficient privileges: {0}")]
    PermissionDenied(String),

    #[error("Invalid capture filter '{expression}': {message}")]
    FilterSyntax { expression: String, message: String },

    #[error("Capture driver error: {0}")]
    Driver(String),

    #[error("Packet read error: {0}")]
    Read(String),
}
