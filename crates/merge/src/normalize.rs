use once_cell::sync::Lazy;
use regex::Regex;

/// Reduce Python source to the lines that carry code.
///
/// Drops triple-quoted blocks, `#` comments outside string literals, blank
/// lines and surrounding whitespace. Used when at least one side of a
/// comparison does not parse, so it must never rely on a syntax tree.
pub(crate) fn normalize_code(source: &str) -> String {
    static TRIPLE_QUOTED: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#"(?s)""".*?"""|'''.*?'''"#).expect("Valid triple-quoted block regex")
    });

    let without_blocks = TRIPLE_QUOTED.replace_all(source, "");
    without_blocks
        .lines()
        .map(|line| strip_line_comment(line).trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cut a line at the first `#` that is not inside a quoted string
fn strip_line_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (idx, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, ch) {
            (Some(_), '\\') => escaped = true,
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '#') => return &line[..idx],
            (None, _) => {}
        }
    }
    line
}
