use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Module not found in target process: {0}")]
    ModuleNotFound(String),

    #[error("Failed to open process {pid}: {message}")]
    ProcessOpenFailed { pid: u32, message: String },

    #[error("Failed to read process memory at address {address:#x}: {message}")]
    MemoryReadFailed { address: u64, message: String },

    #[error("Failed to write process memory at address {address:#x}: {message}")]
    MemoryWriteFailed { address: u64, message: String },

    #[error("Null pointer in chain at step {step}")]
    NullPointer { step: usize },

    #[error("Monitoring session is already initialized")]
    AlreadyInitialized,

    #[error("Process memory access is only supported on Windows")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether a monitor should treat this error as transient and retry
    /// after its fault backoff. Everything that can happen on the polling
    /// path qualifies; only setup errors do not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::MemoryReadFailed { .. } | Error::NullPointer { .. }
        )
    }
}
