//! Terminal queries and text layout for help output.

use std::io::{self, Write};

/// Size of the terminal as `(rows, columns)`.
///
/// Queries the terminal attached to standard output. A dimension the terminal
/// does not report is taken from the `LINES` or `COLUMNS` environment
/// variable, and is 0 if that is not set either.
pub fn terminal_size() -> (usize, usize) {
    size_or_env(query_size(), |name| std::env::var(name).ok())
}

/// Number of rows of the terminal, 0 if unknown.
pub fn terminal_lines() -> usize {
    terminal_size().0
}

/// Number of columns of the terminal, 0 if unknown.
pub fn terminal_columns() -> usize {
    terminal_size().1
}

fn size_or_env(probed: (usize, usize), var: impl Fn(&str) -> Option<String>) -> (usize, usize) {
    let from_env = |name: &str| {
        var(name)
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0)
    };
    let (mut rows, mut cols) = probed;
    if cols == 0 {
        cols = from_env("COLUMNS");
    }
    if rows == 0 {
        rows = from_env("LINES");
    }
    (rows, cols)
}

#[cfg(unix)]
fn query_size() -> (usize, usize) {
    // SAFETY: `winsize` is plain old data, all-zero is a valid value.
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    // SAFETY: TIOCGWINSZ writes a `winsize` into the pointed-to struct.
    let rc = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut ws) };
    if rc == 0 {
        (ws.ws_row as usize, ws.ws_col as usize)
    } else {
        (0, 0)
    }
}

#[cfg(windows)]
fn query_size() -> (usize, usize) {
    use windows_sys::Win32::System::Console::{
        CONSOLE_SCREEN_BUFFER_INFO, GetConsoleScreenBufferInfo, GetStdHandle, STD_OUTPUT_HANDLE,
    };

    // SAFETY: the struct is plain old data and only read after the call
    // reports success.
    unsafe {
        let mut info: CONSOLE_SCREEN_BUFFER_INFO = std::mem::zeroed();
        if GetConsoleScreenBufferInfo(GetStdHandle(STD_OUTPUT_HANDLE), &mut info) == 0 {
            return (0, 0);
        }
        let window = info.srWindow;
        let rows = (window.Bottom - window.Top + 1).max(0) as usize;
        let cols = (window.Right - window.Left + 1).max(0) as usize;
        (rows, cols)
    }
}

#[cfg(not(any(unix, windows)))]
fn query_size() -> (usize, usize) {
    (0, 0)
}

/// Print `text` wrapped to lines of at most `width` characters.
///
/// Every line is indented by `indent` spaces, lines after the first by
/// `indent + offset`. Lines are broken before a space or after a comma or
/// `|` where possible, and hard at the width otherwise. Newlines in `text`
/// start a new line. Spaces at the start of a continuation line are dropped.
///
/// # Panics
///
/// If `indent + offset` leaves no room for text within `width`.
pub fn print_wrapped(
    out: &mut dyn Write,
    text: &str,
    width: usize,
    indent: usize,
    offset: usize,
) -> io::Result<()> {
    assert!(indent + offset < width, "indentation exceeds the line width");

    let chars: Vec<char> = text.chars().collect();
    let mut indent = indent;
    let mut allowed = width - indent;
    let mut start = 0;
    let mut first = true;

    while start < chars.len() {
        let rest = &chars[start..];
        let window = rest.len().min(allowed);
        let (len, consumed) = match rest[..window].iter().position(|&c| c == '\n') {
            Some(newline) => (newline, newline + 1),
            None if rest.len() > allowed => {
                let len = break_position(rest, allowed);
                (len, len)
            }
            None => (rest.len(), rest.len()),
        };

        let line: String = rest[..len].iter().collect();
        writeln!(out, "{:indent$}{}", "", line.trim_end_matches(' '))?;

        if first {
            first = false;
            indent += offset;
            allowed -= offset;
        }
        start += consumed;
        while chars.get(start) == Some(&' ') {
            start += 1;
        }
    }
    Ok(())
}

/// Length of the longest prefix of `rest` of at most `allowed` characters
/// that ends at a break opportunity, or `allowed` if there is none.
fn break_position(rest: &[char], allowed: usize) -> usize {
    (1..=allowed)
        .rev()
        .find(|&i| rest[i] == ' ' || matches!(rest[i - 1], ',' | '|'))
        .unwrap_or(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrapped(text: &str, width: usize, indent: usize, offset: usize) -> String {
        let mut out = Vec::new();
        print_wrapped(&mut out, text, width, indent, offset).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn short_text_is_one_indented_line() {
        assert_eq!(wrapped("hello world", 40, 2, 4), "  hello world\n");
        assert_eq!(wrapped("", 40, 2, 4), "");
    }

    #[test]
    fn breaks_before_spaces() {
        let text = "the quick brown fox jumps over the lazy dog";
        assert_eq!(
            wrapped(text, 16, 0, 0),
            "the quick brown\nfox jumps over\nthe lazy dog\n"
        );
    }

    #[test]
    fn continuation_lines_use_offset() {
        let text = "one two three four five six";
        assert_eq!(
            wrapped(text, 14, 2, 2),
            "  one two\n    three four\n    five six\n"
        );
    }

    #[test]
    fn breaks_after_comma_and_bar() {
        assert_eq!(wrapped("alpha,beta,gamma", 12, 0, 0), "alpha,beta,\ngamma\n");
        assert_eq!(wrapped("on|off|auto", 8, 0, 0), "on|off|\nauto\n");
    }

    #[test]
    fn long_words_are_cut_at_width() {
        assert_eq!(wrapped("abcdefghij", 4, 0, 0), "abcd\nefgh\nij\n");
    }

    #[test]
    fn embedded_newlines_start_new_lines() {
        assert_eq!(wrapped("first\nsecond", 40, 1, 2), " first\n   second\n");
        assert_eq!(wrapped("a\n\nb", 40, 0, 0), "a\n\nb\n");
    }

    #[test]
    #[should_panic(expected = "indentation exceeds")]
    fn indentation_must_fit() {
        let _ = wrapped("text", 10, 6, 4);
    }

    #[test]
    fn probed_size_wins_over_environment() {
        let env = |name: &str| match name {
            "COLUMNS" => Some("132".to_string()),
            "LINES" => Some("50".to_string()),
            _ => None,
        };
        assert_eq!(size_or_env((24, 80), env), (24, 80));
        assert_eq!(size_or_env((0, 0), env), (50, 132));
        assert_eq!(size_or_env((24, 0), env), (24, 132));
    }

    #[test]
    fn unknown_size_is_zero() {
        assert_eq!(size_or_env((0, 0), |_| None), (0, 0));
        assert_eq!(size_or_env((0, 0), |_| Some("wide".to_string())), (0, 0));
    }
}
