//! Which fetched values get masked.

use crate::store::Parameter;

/// Returns `true` when `parameter` must be masked.
///
/// This is the store's own secure flag and nothing else; values are never
/// inspected.
pub fn classify(parameter: &Parameter) -> bool {
    parameter.is_secure
}
