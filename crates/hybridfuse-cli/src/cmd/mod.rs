pub mod fuse;
pub mod search;

use hybridfuse_core::FusionError;

/// Clamp a user-supplied limit to the configured ceiling, rejecting zero.
pub fn effective_limit(requested: usize, max_limit: usize) -> Result<usize, FusionError> {
    if requested == 0 {
        return Err(FusionError::InvalidLimit);
    }
    Ok(requested.min(max_limit))
}
