//! ANSI escape sequence stripping for clean text matching.
//!
//! Subject output is full of color, cursor, and mode-switch sequences. Pattern
//! waits compare against a stripped view of the captured text so a test can
//! look for `Hello, Alice!` without caring how it was styled. Stripping only
//! produces a view; captured buffers are never modified.

use std::sync::LazyLock;

use regex::Regex;

const ESC: char = '\u{1b}';
const BEL: char = '\u{07}';
/// 8-bit CSI introducer.
const CSI: char = '\u{9b}';
/// 8-bit string terminator.
const ST: char = '\u{9c}';
/// How some terminal backends render a lone 0x1B (the code page 437 glyph).
const MANGLED_ESC: char = '\u{2190}';

/// Cursor and mode fragments whose ESC was lost in transit, e.g. `[2K`,
/// `[1;31m`, `[?25l`.
static FRAGMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\??\d+(?:;\d+)*[ABCDEFGHJKSTfhlmnsu]").expect("fragment regex is valid")
});

/// Strip terminal control sequences from `input`.
///
/// Handles:
/// - CSI sequences: `ESC [ ... <final>` and the 8-bit `0x9B` form
/// - OSC and other string sequences: `ESC ] ... (BEL | ESC \)`
/// - Two-byte and charset escapes: `ESC M`, `ESC ( B`
/// - CSI sequences whose ESC was rendered as `←`
/// - Residual fragments such as `[2K` whose ESC was dropped
/// - Any remaining control character except `\n` and `\t`
///
/// Carriage returns are dropped so PTY line endings compare like pipe output.
/// The result is a fixpoint: `strip_ansi(&strip_ansi(x)) == strip_ansi(x)`.
pub fn strip_ansi(input: &str) -> String {
    let mut current = strip_pass(input);
    loop {
        let next = strip_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Decode `input` lossily as UTF-8 and strip it.
pub fn strip_ansi_bytes(input: &[u8]) -> String {
    strip_ansi(&String::from_utf8_lossy(input))
}

fn strip_pass(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            ESC => i = skip_escape(&chars, i + 1),
            MANGLED_ESC if chars.get(i + 1) == Some(&'[') => i = skip_csi(&chars, i + 2),
            CSI => i = skip_csi(&chars, i + 1),
            '\n' | '\t' => {
                out.push(chars[i]);
                i += 1;
            }
            c if c.is_control() => i += 1,
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    FRAGMENT_RE.replace_all(&out, "").into_owned()
}

/// Skip the body of an escape sequence; `i` points just past the ESC.
fn skip_escape(chars: &[char], i: usize) -> usize {
    match chars.get(i) {
        None => i,
        Some('[') => skip_csi(chars, i + 1),
        Some(']' | 'P' | 'X' | '^' | '_') => skip_string(chars, i + 1),
        Some('(' | ')' | '*' | '+') => (i + 2).min(chars.len()),
        Some(c) if (' '..='~').contains(c) => i + 1,
        // Not an escape we know; drop only the ESC itself.
        Some(_) => i,
    }
}

/// Skip CSI parameter/intermediate bytes and the final byte.
fn skip_csi(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && ('\u{20}'..='\u{3f}').contains(&chars[i]) {
        i += 1;
    }
    if i < chars.len() && ('\u{40}'..='\u{7e}').contains(&chars[i]) {
        i += 1;
    }
    i
}

/// Skip an OSC/DCS-style string up to and including its terminator.
fn skip_string(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() {
        match chars[i] {
            BEL | ST => return i + 1,
            ESC if chars.get(i + 1) == Some(&'\\') => return i + 2,
            _ => i += 1,
        }
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_unchanged() {
        assert_eq!(strip_ansi("hello world"), "hello world");
    }

    #[test]
    fn strips_color_codes() {
        assert_eq!(strip_ansi("\x1b[1;31merror\x1b[0m"), "error");
    }

    #[test]
    fn strips_cursor_movement_and_erase() {
        assert_eq!(strip_ansi("\x1b[2A\x1b[2Khello"), "hello");
    }

    #[test]
    fn strips_private_mode_toggles() {
        assert_eq!(strip_ansi("\x1b[?25lmenu\x1b[?25h"), "menu");
    }

    #[test]
    fn strips_osc_with_bel() {
        assert_eq!(strip_ansi("\x1b]0;My Terminal\x07rest"), "rest");
    }

    #[test]
    fn strips_osc_with_st() {
        assert_eq!(strip_ansi("\x1b]0;title\x1b\\rest"), "rest");
    }

    #[test]
    fn strips_charset_designation() {
        assert_eq!(strip_ansi("\x1b(Bplain"), "plain");
    }

    #[test]
    fn strips_mangled_escape() {
        assert_eq!(strip_ansi("\u{2190}[32mgreen\u{2190}[0m"), "green");
    }

    #[test]
    fn keeps_a_real_left_arrow() {
        assert_eq!(strip_ansi("\u{2190} back"), "\u{2190} back");
    }

    #[test]
    fn strips_residual_fragments() {
        assert_eq!(strip_ansi("[2K[1;36mHello[0m"), "Hello");
        assert_eq!(strip_ansi("[?25lwaiting"), "waiting");
    }

    #[test]
    fn keeps_bracketed_text_that_is_not_a_fragment() {
        assert_eq!(strip_ansi("items[0] and [link]"), "items[0] and [link]");
    }

    #[test]
    fn drops_carriage_returns_and_stray_controls() {
        assert_eq!(strip_ansi("line\r\n\x07bell\x08"), "line\nbell");
    }

    #[test]
    fn keeps_tabs_and_newlines() {
        assert_eq!(strip_ansi("a\tb\nc"), "a\tb\nc");
    }

    #[test]
    fn handles_bare_csi() {
        assert_eq!(strip_ansi("\u{9b}31mred\u{9b}0m"), "red");
    }

    #[test]
    fn handles_empty_input() {
        assert_eq!(strip_ansi(""), "");
    }

    #[test]
    fn handles_truncated_escape() {
        assert_eq!(strip_ansi("text\x1b"), "text");
        assert_eq!(strip_ansi("text\x1b["), "text");
    }

    #[test]
    fn preserves_multibyte_text() {
        let input = "\x1b[1m\x1b[36m\u{25cf}\x1b[0m caf\u{e9} \u{1f600}";
        assert_eq!(strip_ansi(input), "\u{25cf} caf\u{e9} \u{1f600}");
    }

    #[test]
    fn bytes_are_decoded_lossily() {
        assert_eq!(strip_ansi_bytes(b"\x1b[32mok\xff\x1b[0m"), "ok\u{fffd}");
    }

    #[test]
    fn nested_fragments_reach_a_fixpoint() {
        // Removing the inner fragment exposes a new one.
        assert_eq!(strip_ansi("[[2A2Aok"), "ok");
    }

    #[test]
    fn stripping_is_idempotent() {
        let samples = [
            "",
            "plain",
            "\x1b[1;31merror\x1b[0m",
            "[[2A2Aok",
            "\u{2190}[\u{2190}[0m1m",
            "\x1b\x1b[[1mx",
            "a\x1b]title",
            "[?[?25l25lhidden",
            "\r\n\r\n",
            "\u{9b}\u{9b}[3m",
        ];
        for sample in samples {
            let once = strip_ansi(sample);
            assert_eq!(strip_ansi(&once), once, "not idempotent for {sample:?}");
        }
    }
}
