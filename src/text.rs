//! Text cleanup for raw device captures

use once_cell::sync::Lazy;
use regex::Regex;

/// 7-bit C1 escapes (`ESC @`..`ESC _`) and CSI sequences (`ESC [ params inter final`)
static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("ANSI escape pattern is valid")
});

/// Strip ANSI escape sequences and drop anything outside printable ASCII.
///
/// Printable means ASCII letters, digits, punctuation and the whitespace set
/// `' '`, `\t`, `\n`, `\r`, `\x0b`, `\x0c`. Only used on raw captures, never on
/// structured output.
///
/// ```
/// use netdev_mcp::text::clean_output;
///
/// assert_eq!(clean_output("\x1b[1mR1#\x1b[0m"), "R1#");
/// ```
pub fn clean_output(output: &str) -> String {
    let stripped = ANSI_ESCAPE.replace_all(output, "");
    stripped.chars().filter(|c| is_printable(*c)).collect()
}

fn is_printable(c: char) -> bool {
    c.is_ascii_graphic() || matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

/// Remove whitespace common to the start of every non-blank line.
///
/// Whitespace-only lines come back empty and do not take part in computing
/// the common prefix.
pub fn dedent(text: &str) -> String {
    let mut margin: Option<&str> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let indent = &line[..line.len() - line.trim_start().len()];
        margin = Some(match margin {
            None => indent,
            Some(current) => common_prefix(current, indent),
        });
    }

    let margin = margin.unwrap_or("");
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                line.strip_prefix(margin).unwrap_or(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .char_indices()
        .zip(b.chars())
        .take_while(|((_, x), y)| x == y)
        .last()
        .map_or(0, |((i, x), _)| i + x.len_utf8());
    &a[..len]
}
