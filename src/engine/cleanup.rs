//! Deterministic cleanup of VLM page output.
//!
//! Passes run in order: strip an outer code fence, normalise line endings,
//! drop invisible Unicode, trim trailing whitespace, collapse blank-line
//! runs, end with exactly one newline. Line endings are normalised before
//! heading counting sees the text, so `\r\n# Title` still counts.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?[ \t]*\n(.*)\n```\s*$").unwrap());

static RE_BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Zero-width and formatting characters models copy from the page.
const INVISIBLE: [char; 6] = [
    '\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}', '\u{00AD}',
];

/// Apply every cleanup pass to one page of Markdown.
pub fn clean_page(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = s.replace("\r\n", "\n").replace('\r', "\n");
    let s: String = s.chars().filter(|c| !INVISIBLE.contains(c)).collect();
    let s = s
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    let s = RE_BLANK_RUNS.replace_all(&s, "\n\n");

    let trimmed = s.trim_matches('\n');
    if trimmed.trim().is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

fn strip_outer_fence(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCE.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fence() {
        assert_eq!(clean_page("```markdown\n# Title\n```"), "# Title\n");
        assert_eq!(clean_page("```\n## Part\n```\n"), "## Part\n");
    }

    #[test]
    fn keeps_inner_code_blocks() {
        let md = "# Code\n\n```rust\nfn main() {}\n```\n\nAfter";
        assert_eq!(clean_page(md), format!("{md}\n"));
    }

    #[test]
    fn normalises_crlf_and_trailing_space() {
        assert_eq!(clean_page("Intro  \r\n# Title\t\r\n"), "Intro\n# Title\n");
    }

    #[test]
    fn collapses_blank_runs() {
        assert_eq!(clean_page("a\n\n\n\n\nb"), "a\n\nb\n");
    }

    #[test]
    fn removes_invisible_characters() {
        assert_eq!(clean_page("\u{FEFF}# Ti\u{200B}tle"), "# Title\n");
    }

    #[test]
    fn blank_page_becomes_empty() {
        assert_eq!(clean_page("  \n\n \n"), "");
    }
}
