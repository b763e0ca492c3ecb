//! Size and capacity limits

use crate::error::ValidationError;

/// Maximum message body length in bytes
pub const MAX_BODY_LEN: usize = 512;

/// Maximum display name length in bytes
pub const MAX_DISPLAY_NAME_LEN: usize = 50;

/// Default number of messages kept in the hot-path view
pub const DEFAULT_MESSAGE_CAPACITY: usize = 100;

/// Default number of simultaneously active senders
pub const DEFAULT_SENDER_CAPACITY: usize = 10;

/// Check that a message body fits within [`MAX_BODY_LEN`]
///
/// Empty bodies are accepted.
pub fn validate_body(body: &str) -> Result<(), ValidationError> {
    if body.len() > MAX_BODY_LEN {
        return Err(ValidationError::BodyTooLong {
            len: body.len(),
            max: MAX_BODY_LEN,
        });
    }
    Ok(())
}

/// Check that a display name is non-empty and fits within [`MAX_DISPLAY_NAME_LEN`]
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.len() > MAX_DISPLAY_NAME_LEN {
        return Err(ValidationError::NameTooLong {
            len: name.len(),
            max: MAX_DISPLAY_NAME_LEN,
        });
    }
    Ok(())
}
