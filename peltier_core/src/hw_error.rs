//! Maps boxed errors from the port trait boundaries to typed `EngineError`.
//!
//! The traits in `peltier_traits` use `Box<dyn Error + Send + Sync>` for
//! maximum flexibility; this module converts those to our typed error enum,
//! with a feature-gated path that recovers `peltier_hardware::LinkError`
//! detail by downcast.

use crate::error::EngineError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Map a trait-boundary read error to a typed `EngineError`.
pub fn map_read_error(e: BoxError) -> EngineError {
    #[cfg(feature = "link-errors")]
    {
        if let Some(link) = e.downcast_ref::<peltier_hardware::error::LinkError>() {
            return EngineError::Connection(link.to_string());
        }
    }
    EngineError::Connection(e.to_string())
}

/// Map a trait-boundary write error to a typed `EngineError`.
pub fn map_write_error(e: BoxError) -> EngineError {
    #[cfg(feature = "link-errors")]
    {
        if let Some(link) = e.downcast_ref::<peltier_hardware::error::LinkError>() {
            return EngineError::Write(link.to_string());
        }
    }
    EngineError::Write(e.to_string())
}
