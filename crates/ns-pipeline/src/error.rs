use ns_capture::CaptureError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Invalid interface name: '{0}'")]
    InterfaceInvalid(String),

    #[error("Invalid MAC address: '{0}'")]
    InvalidMac(String),

    #[error("Invalid sampling parameter: {0}")]
    InvalidSampling(String),

    #[error("Operation not allowed in state {0}")]
    InvalidState(&'static str),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}
