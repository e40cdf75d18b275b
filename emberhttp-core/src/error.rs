//! Crate-wide error aliases.
//!
//! Leans on `anyhow` at the boundary between typed, per-component errors
//! (`thiserror` enums defined alongside their component) and the catch-all
//! error surface handed back to callers that don't care about the specific
//! failure mode (e.g. the demo CLI).

/// A type alias for `anyhow::Error`, representing any error type.
pub type AnyError = anyhow::Error;

/// A type alias for `Result<T, E>` where `E` defaults to [`AnyError`].
pub type AnyResult<T, E = AnyError> = std::result::Result<T, E>;

#[macro_export]
macro_rules! bail_into {
    ($msg:literal $(,)?) => {
        return Err(::anyhow::anyhow!($msg).into())
    };
    ($err:expr $(,)?) => {
        return Err(::anyhow::anyhow!($err).into())
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err(::anyhow::anyhow!($fmt, $($arg)*).into())
    };
}
