use serde::Serialize;
use thiserror::Error;

/// Error taxonomy shared by every platform operation.
///
/// Each variant maps onto an HRESULT-shaped code through [`PlatformError::code`],
/// so status values can be compared with what the native platform reports.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PlatformError {
    #[error("required value is not present")]
    InvalidPointer,

    #[error("invalid argument")]
    InvalidArgument,

    #[error("index out of range")]
    OutOfRange,

    #[error("invalid index")]
    InvalidIndex,

    #[error("not found")]
    NotFound,

    #[error("element slot is empty")]
    Unexpected,

    #[error("platform is shut down")]
    Shutdown,

    #[error("not supported on this platform revision")]
    Unsupported,

    #[error("unsupported platform version")]
    BadVersion,

    #[error("out of memory")]
    OutOfMemory,

    #[error("unspecified failure")]
    Fail,
}

pub type Result<T, E = PlatformError> = std::result::Result<T, E>;

const E_POINTER: u32 = 0x8000_4003;
const E_INVALIDARG: u32 = 0x8007_0057;
const E_UNEXPECTED: u32 = 0x8000_FFFF;
const E_NOTIMPL: u32 = 0x8000_4001;
const E_FAIL: u32 = 0x8000_4005;
const E_OUTOFMEMORY: u32 = 0x8007_000E;
const MF_E_INVALIDINDEX: u32 = 0xC00D_36BF;
const MF_E_NOT_FOUND: u32 = 0xC00D_36D5;
const MF_E_BAD_STARTUP_VERSION: u32 = 0xC00D_36E3;
const MF_E_SHUTDOWN: u32 = 0xC00D_3E85;

impl PlatformError {
    /// HRESULT-shaped code for this error.
    ///
    /// Collections report an out-of-range index as a plain invalid argument,
    /// so `OutOfRange` and `InvalidArgument` share a code.
    pub fn code(self) -> u32 {
        match self {
            PlatformError::InvalidPointer => E_POINTER,
            PlatformError::InvalidArgument | PlatformError::OutOfRange => E_INVALIDARG,
            PlatformError::InvalidIndex => MF_E_INVALIDINDEX,
            PlatformError::NotFound => MF_E_NOT_FOUND,
            PlatformError::Unexpected => E_UNEXPECTED,
            PlatformError::Shutdown => MF_E_SHUTDOWN,
            PlatformError::Unsupported => E_NOTIMPL,
            PlatformError::BadVersion => MF_E_BAD_STARTUP_VERSION,
            PlatformError::OutOfMemory => E_OUTOFMEMORY,
            PlatformError::Fail => E_FAIL,
        }
    }
}

/// HRESULT-shaped code for a status value (`0` is success).
pub fn status_code(status: Result<()>) -> u32 {
    match status {
        Ok(()) => 0,
        Err(e) => e.code(),
    }
}
