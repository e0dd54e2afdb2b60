//! Prompt construction for commit quality assessment.

use crate::models::CommitRecord;

/// Builds the assessment prompt for one commit.
///
/// The diff is cut to `max_diff_chars`; the content hash is always taken over
/// the full diff, so truncation never affects cache keys.
pub fn build_quality_prompt(
    commit: &CommitRecord,
    diff: &str,
    tech_stack: &str,
    max_diff_chars: usize,
) -> String {
    let short_sha = &commit.hash[..8.min(commit.hash.len())];
    let truncated = truncate_diff(diff, max_diff_chars);
    let note = if truncated.len() < diff.len() {
        "\n(diff truncated)\n"
    } else {
        ""
    };

    format!(
        r#"You are reviewing a single git commit. The dominant tech stack of the change is: {stack}.
Judge it against the established best practices for that stack.

Score the commit on two scales:
1. code_quality_score (0-100, higher is better). Use the whole range: reserve
   90+ for exemplary, well-tested and maintainable code and below 30 for
   changes that are disorganized or visibly buggy. Avoid clustering between 60 and 80.
2. complexity_score (0-100, higher means more complex).

Respond with JSON only, in this shape:
```json
{{
  "code_quality_score": 85,
  "complexity_score": 40,
  "rationale": "One or two sentences explaining the scores.",
  "suggestions": ["Concrete improvement", "..."]
}}
```

## Commit

**SHA**: {sha}
**Author**: {author}
**Date**: {date}
**Message**:
```
{message}
```

## Diff Statistics
- Files changed: {files}
- Lines added: {added}
- Lines removed: {removed}

**Diff**:
```diff
{diff}
```{note}"#,
        stack = tech_stack,
        sha = short_sha,
        author = commit.author_name,
        date = commit.timestamp.to_rfc3339(),
        message = commit.message,
        files = commit.files_changed(),
        added = commit.lines_added,
        removed = commit.lines_removed,
        diff = truncated,
        note = note,
    )
}

/// Cut `diff` to at most `max_chars` bytes, preferring a line boundary.
fn truncate_diff(diff: &str, max_chars: usize) -> &str {
    if diff.len() <= max_chars {
        return diff;
    }
    let mut end = max_chars;
    while !diff.is_char_boundary(end) {
        end -= 1;
    }
    let truncated = &diff[..end];
    match truncated.rfind('\n') {
        Some(last_newline) => &diff[..last_newline],
        None => truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::record;
    use crate::models::CommitType;

    #[test]
    fn prompt_contains_commit_context() {
        let commit = record("0123456789abcdef", "dev@example.com", CommitType::Feature);
        let prompt = build_quality_prompt(&commit, "+fn main() {}\n", "go", 3000);

        assert!(prompt.contains("**SHA**: 01234567"));
        assert!(prompt.contains("dominant tech stack of the change is: go"));
        assert!(prompt.contains("+fn main() {}"));
        assert!(prompt.contains("code_quality_score"));
        assert!(!prompt.contains("(diff truncated)"));
    }

    #[test]
    fn long_diffs_are_truncated_at_line_boundary() {
        let diff = "+aaaa\n".repeat(1000);
        let truncated = truncate_diff(&diff, 3000);
        assert!(truncated.len() <= 3000);
        assert!(truncated.ends_with("+aaaa"));

        let commit = record("abc", "dev@example.com", CommitType::Other);
        let prompt = build_quality_prompt(&commit, &diff, "unknown", 3000);
        assert!(prompt.contains("(diff truncated)"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let diff = "é".repeat(10);
        let truncated = truncate_diff(&diff, 5);
        assert_eq!(truncated, "éé");
    }
}
