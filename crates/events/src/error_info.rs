//! Uniform error code / message pair carried by command results.

/// Well-known error codes.
pub mod codes {
    pub const SUCCEEDED: &str = "Ok";
    pub const NOT_FOUND: &str = "NotFound";
    pub const BAD_REQUEST: &str = "BadRequest";
    pub const ILLEGAL_STATE: &str = "IllegalState";
    pub const REQUEST_TIMEOUT: &str = "RequestTimeout";
    pub const EVENT_VERSION_CONFLICT: &str = "EventVersionConflict";
    pub const COMMAND_DISPATCH_FAILED: &str = "CommandDispatchFailed";
}

/// Anything that can be reported as an `(error_code, error_msg)` pair.
///
/// Failures are converted into [`CommandResult`](crate::CommandResult)s through
/// this trait, so every error surfaced by the gateway has a stable code.
pub trait ErrorInfo {
    fn error_code(&self) -> &str;

    fn error_msg(&self) -> String;

    fn succeeded(&self) -> bool {
        self.error_code() == codes::SUCCEEDED
    }
}
