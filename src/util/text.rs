use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Width of `s` in terminal columns. CJK and emoji count as two.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Longest prefix of `s` that fits in `max_width` columns.
fn fitting_prefix(s: &str, max_width: usize) -> &str {
    let mut width = 0;
    for (idx, c) in s.char_indices() {
        width += UnicodeWidthChar::width(c).unwrap_or(0);
        if width > max_width {
            return &s[..idx];
        }
    }
    s
}

/// Cut `s` to at most `max_width` columns, ending in "..." when shortened.
///
/// Widths of three columns or less have no room for the ellipsis and get a
/// plain prefix instead. Borrows when nothing is cut.
///
/// ```
/// use softvault::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("DevToolkit Pro", 20), "DevToolkit Pro");
/// assert_eq!(truncate_to_width("DevToolkit Pro", 8), "DevTo...");
/// assert_eq!(truncate_to_width("DevToolkit Pro", 2), "De");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }
    if max_width <= ELLIPSIS_WIDTH {
        return Cow::Borrowed(fitting_prefix(s, max_width));
    }
    let head = fitting_prefix(s, max_width - ELLIPSIS_WIDTH);
    Cow::Owned(format!("{}{}", head, ELLIPSIS))
}

/// Right-pad `s` with spaces to exactly `width` columns, truncating first if
/// it is too wide.
pub fn pad_to_width(s: &str, width: usize) -> String {
    let cut = truncate_to_width(s, width);
    let fill = width.saturating_sub(display_width(&cut));
    format!("{}{}", cut, " ".repeat(fill))
}

/// Make catalog text safe to print as a single terminal line.
///
/// Item titles and descriptions can come from the remote table store, so ANSI
/// escape sequences and other control characters are dropped and line breaks
/// and tabs become single spaces.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(|c| c.is_control()) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\x1b' => match chars.peek() {
                // CSI: parameters until a final byte in @..~
                Some('[') => {
                    chars.next();
                    for n in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&n) {
                            break;
                        }
                    }
                }
                // OSC: until BEL or ESC \
                Some(']') => {
                    chars.next();
                    while let Some(n) = chars.next() {
                        if n == '\x07' {
                            break;
                        }
                        if n == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            },
            '\n' | '\r' | '\t' => {
                if !out.ends_with(' ') {
                    out.push(' ');
                }
            }
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}
