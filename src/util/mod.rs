//! Helpers for printing catalog text to a terminal.

mod text;

pub use text::{display_width, pad_to_width, strip_control_chars, truncate_to_width};

/// Longest search term accepted from the command line.
pub const MAX_SEARCH_TERM_LENGTH: usize = 256;
