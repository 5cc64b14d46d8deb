#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// The run completed. Operation failures are reported, not signalled.
    Success = 0,

    /// Invalid CLI/config (bad flags, invalid durations, unsupported base url, etc.).
    InvalidInput = 30,

    /// The harness itself failed (runtime or collector errors).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
