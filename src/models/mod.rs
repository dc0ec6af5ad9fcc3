//! Repository layer: one module per table. Every function takes the pool
//! explicitly and returns a typed projection or an [`crate::error::ApiError`].

pub mod article;
pub mod author;
pub mod comment;
pub mod issue;
pub mod keyword;
pub mod user;

/// How many characters of article text or author bio a read projection
/// carries before the shaper cuts it down to a teaser.
pub const TEASER_LEN: usize = 200;

/// Shorten long text to [`TEASER_LEN`] characters plus an ellipsis. A value
/// of exactly [`TEASER_LEN`] characters comes back untouched.
pub fn teaser(text: &str) -> String {
    if text.chars().count() > TEASER_LEN {
        let mut cut: String = text.chars().take(TEASER_LEN).collect();
        cut.push_str("...");
        cut
    } else {
        text.to_string()
    }
}

// Update fallbacks shared by every PATCH path. A supplied value wins unless
// it is "falsy" (absent, empty, zero, false), in which case the stored value
// is kept. Clearing a field to the empty string is therefore the same as
// omitting it; clients and the test suite rely on this.

pub fn patch_str(new: Option<String>, existing: String) -> String {
    match new {
        Some(value) if !value.is_empty() => value,
        _ => existing,
    }
}

/// Fallback for nullable foreign keys; zero counts as unset.
pub fn patch_id(new: Option<i32>, existing: Option<i32>) -> Option<i32> {
    match new {
        Some(value) if value != 0 => Some(value),
        _ => existing,
    }
}

/// Fallback for non-null integer columns; zero counts as unset.
pub fn patch_int(new: Option<i32>, existing: i32) -> i32 {
    match new {
        Some(value) if value != 0 => value,
        _ => existing,
    }
}

/// Fallback for boolean flags; `false` falls back to the stored flag.
pub fn patch_flag(new: Option<bool>, existing: bool) -> bool {
    match new {
        Some(true) => true,
        _ => existing,
    }
}

/// Fallback for values with no falsy form (timestamps).
pub fn patch_or<T>(new: Option<T>, existing: T) -> T {
    new.unwrap_or(existing)
}
