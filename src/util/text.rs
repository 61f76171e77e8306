use std::borrow::Cow;

/// Marker appended to every non-empty snippet.
pub const ELLIPSIS: char = '…';

fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{7f}') || (c < ' ' && !matches!(c, '\t' | '\n' | '\r'))
}

/// SEC-001: Strip control characters and ANSI escape sequences from feed text.
///
/// Feed titles and descriptions are attacker-controlled and end up on a
/// terminal. Removes C0 controls (except tab, newline and carriage return),
/// DEL, CSI sequences (`ESC [` ... final byte `0x40..=0x7E`), OSC sequences
/// (`ESC ]` ... BEL or `ESC \`) and bare ESC bytes.
///
/// Returns `Cow::Borrowed` when nothing needs stripping.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(|c| c == '\x1b' || is_stripped_control(c)) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            if !is_stripped_control(c) {
                out.push(c);
            }
            continue;
        }

        match chars.peek() {
            Some('[') => {
                chars.next();
                for c in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&c) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                while let Some(c) = chars.next() {
                    if c == '\x07' {
                        break;
                    }
                    if c == '\x1b' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    Cow::Owned(out)
}

/// Collapses every run of whitespace into a single space and trims the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cuts `s` to at most `budget` characters and appends [`ELLIPSIS`] when the
/// result is non-empty.
///
/// Counts `char`s, never bytes, so multi-byte text is never split inside a
/// code point.
///
/// # Examples
///
/// ```
/// use feedboard::util::snippet_of;
///
/// assert_eq!(snippet_of("Hello world", 5), "Hello…");
/// assert_eq!(snippet_of("Short", 200), "Short…");
/// assert_eq!(snippet_of("", 200), "");
/// ```
pub fn snippet_of(s: &str, budget: usize) -> String {
    let mut out: String = s.chars().take(budget).collect();
    if !out.is_empty() {
        out.push(ELLIPSIS);
    }
    out
}
