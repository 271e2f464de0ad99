//! Cleanup applied to raw generator output before it is parsed or returned.

use std::sync::LazyLock;

use regex::Regex;

/// A line holding nothing but a fence marker, wherever it sits in the text.
static FENCE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*```[A-Za-z0-9_-]*[ \t]*(?:\r?\n|$)").expect("valid regex")
});

/// Opening fence with an optional language tag (```` ```html ````, ```` ```json ````).
static OPENING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[A-Za-z0-9_-]*").expect("valid regex"));

/// Remove code-fence markers and surrounding whitespace.
///
/// Fence lines are dropped anywhere in the text, so a preamble or trailer
/// around the fenced block does not leave markers behind. A fence glued to
/// the first or last line is stripped too. Applying it twice gives the same
/// result as applying it once.
pub fn strip_code_fences(text: &str) -> String {
    let mut current = text.trim().to_string();
    loop {
        let next = {
            let without_lines = FENCE_LINE.replace_all(&current, "");
            let mut rest = without_lines.trim();
            if let Some(m) = OPENING_FENCE.find(rest) {
                rest = rest[m.end()..].trim();
            }
            if let Some(stripped) = rest.strip_suffix("```") {
                rest = stripped.trim();
            }
            rest.to_string()
        };
        if next == current {
            return next;
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_language_tagged_fence() {
        assert_eq!(
            strip_code_fences("```html\n<h2>Overview</h2>\n<p>Hi</p>\n```"),
            "<h2>Overview</h2>\n<p>Hi</p>"
        );
        assert_eq!(strip_code_fences("```json\n[]\n```\n"), "[]");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fences("  <p>plain</p>\n"), "<p>plain</p>");
        assert_eq!(strip_code_fences("a ``` b"), "a ``` b");
    }

    #[test]
    fn fences_inside_the_text_are_removed() {
        let out = strip_code_fences("Here is the article:\n```html\n<h2>A</h2>\n```");
        assert_eq!(out, "Here is the article:\n<h2>A</h2>");

        let out = strip_code_fences("```html\n<h2>A</h2>\n```\nHope this helps!");
        assert_eq!(out, "<h2>A</h2>\nHope this helps!");

        let out = strip_code_fences("Intro\n  ```json  \n[]\r\n```\r\nDone");
        assert!(!out.contains("```"), "got {out:?}");
    }

    #[test]
    fn idempotent() {
        for input in [
            "```html\n<h2>A</h2>\n```",
            "```html\n```html\n<p>nested</p>\n```\n```",
            "```",
            "``````",
            "<p>no fences</p>",
            "Here is the article:\n```html\n<h2>A</h2>\n```\nBye",
            "```html<p>inline</p>```",
            "",
        ] {
            let once = strip_code_fences(input);
            assert_eq!(strip_code_fences(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn fence_only_input_becomes_empty() {
        assert_eq!(strip_code_fences("```html\n```"), "");
    }
}
