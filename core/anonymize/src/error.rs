use thiserror::Error;

/// Error type returned by every fallible anonymize operation.
///
/// Each variant corresponds to one status of the SDK's numeric taxonomy;
/// [`Error::code`] recovers the stable numeric code and
/// [`error_message`] the static description for a given code.
#[derive(Debug, Error)]
pub enum Error {
    /// The model file exists but is not a usable model.
    #[error("input model format error")]
    ModelFormat,

    /// The resolved model file does not exist under the model directory.
    #[error("input model file does not exist")]
    ModelNotExist,

    /// An image file could not be read or decoded.
    #[error("failed to load image file: {0}")]
    LoadImage(String),

    /// An image file could not be encoded or written, or an in-memory
    /// target buffer cannot hold the result.
    #[error("failed to save image file: {0}")]
    SaveImage(String),

    /// A video file could not be opened or yielded no readable frames.
    #[error("failed to load video file: {0}")]
    LoadVideo(String),

    /// The video output could not be opened or written.
    #[error("failed to save video file: {0}")]
    SaveVideo(String),

    /// The pixel or container format is not one of the supported layouts.
    #[error("unsupported format")]
    UnsupportedFormat,

    /// A caller-contract violation: empty plane, zero dimension,
    /// insufficient stride.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A buffer allocation failed.
    #[error("memory allocation error")]
    MemoryAllocation,

    /// The log file could not be opened.
    #[error("failed to open log file: {0}")]
    LoadLog(String),

    /// An unexpected internal fault, caught at the API boundary.
    #[error("an internal error occurred: {0}")]
    Internal(String),

    /// The handle is stale, foreign, or already released.
    #[error("the provided handle is invalid")]
    HandleInvalid,
}

/// Numeric status code for a successful call.
pub const STATUS_OK: u32 = 0;

impl Error {
    /// The stable numeric status code of this error.
    pub fn code(&self) -> u32 {
        match self {
            Error::ModelFormat => 100,
            Error::ModelNotExist => 101,
            Error::LoadImage(_) => 102,
            Error::SaveImage(_) => 103,
            Error::LoadVideo(_) => 104,
            Error::SaveVideo(_) => 105,
            Error::UnsupportedFormat => 106,
            Error::InvalidParameter(_) => 107,
            Error::MemoryAllocation => 108,
            Error::LoadLog(_) => 109,
            Error::Internal(_) => 110,
            Error::HandleInvalid => 111,
        }
    }
}

/// Static human-readable description for a numeric status code.
///
/// Unknown codes map to a fixed fallback string rather than panicking.
pub fn error_message(code: u32) -> &'static str {
    match code {
        STATUS_OK => "Operation successful",
        100 => "Input model format error",
        101 => "Input model file does not exist",
        102 => "Failed to load image file",
        103 => "Failed to save image file",
        104 => "Failed to load video file",
        105 => "Failed to save video file",
        106 => "Unsupported format",
        107 => "Invalid parameter",
        108 => "Memory allocation error",
        109 => "Failed to open log file",
        110 => "An internal error occurred",
        111 => "The provided handle is invalid",
        _ => "Unknown error code",
    }
}
