//! Deterministic cleanup of generated text before it is persisted.
//!
//! Models occasionally wrap a whole answer in a ```` ```markdown ```` fence,
//! mix `\r\n` line endings, or leak zero-width characters copied from the
//! source PDF. These rules fix that without touching the content itself.
//!
//! Order matters: fences are stripped before line endings are normalised so
//! the fence regex sees the raw answer, and the final-newline pass runs last.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup rule to a model answer.
///
/// 1. Strip an outer code fence around the whole answer
/// 2. Normalise line endings (CRLF / CR → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse runs of 3+ blank lines to a single blank line
/// 5. Remove invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. End with exactly one newline (empty stays empty)
pub fn clean_generated_text(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    ensure_final_newline(&s)
}

static RE_OUTER_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z]*\r?\n(.*?)\r?\n```$").expect("static regex")
});

fn strip_outer_fence(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCE.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n").into_owned()
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}', '\u{00AD}'],
        "",
    )
}

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fence() {
        assert_eq!(
            clean_generated_text("```markdown\n## Summary\n- a\n```"),
            "## Summary\n- a\n"
        );
    }

    #[test]
    fn keeps_inner_code_blocks() {
        let input = "Intro\n```\ncode\n```\nOutro";
        assert_eq!(clean_generated_text(input), "Intro\n```\ncode\n```\nOutro\n");
    }

    #[test]
    fn normalises_whitespace() {
        let input = "line one   \r\nline two\r\n\r\n\r\n\r\n\r\nline three";
        assert_eq!(
            clean_generated_text(input),
            "line one\nline two\n\nline three\n"
        );
    }

    #[test]
    fn removes_invisible_characters() {
        assert_eq!(clean_generated_text("净\u{200B}利润\u{FEFF}"), "净利润\n");
    }

    #[test]
    fn blank_answer_stays_empty() {
        assert_eq!(clean_generated_text("  \n\u{200B}\n "), "");
        assert_eq!(clean_generated_text("```\n\n```"), "");
    }
}
