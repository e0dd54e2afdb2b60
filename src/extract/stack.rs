//! Tech-stack detection from file extensions.

use std::collections::BTreeMap;
use std::path::Path;

/// Label used when no file maps onto a known stack.
pub const UNKNOWN_STACK: &str = "unknown";

const EXTENSIONS: &[(&str, &str)] = &[
    ("java", "java"),
    ("kt", "java"),
    ("scala", "java"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("mjs", "javascript"),
    ("ts", "javascript"),
    ("tsx", "javascript"),
    ("vue", "javascript"),
    ("c", "cpp"),
    ("h", "cpp"),
    ("cc", "cpp"),
    ("cpp", "cpp"),
    ("cxx", "cpp"),
    ("hpp", "cpp"),
    ("go", "go"),
    ("py", "python"),
    ("rs", "rust"),
    ("rb", "ruby"),
    ("php", "php"),
    ("cs", "csharp"),
    ("swift", "swift"),
];

/// Stack label for a single path, if its extension is known.
pub fn stack_for_path(path: &str) -> Option<&'static str> {
    let ext = Path::new(path).extension()?.to_str()?.to_lowercase();
    EXTENSIONS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, stack)| *stack)
}

/// Count touched files per stack.
pub fn stack_counts<'a>(paths: impl IntoIterator<Item = &'a str>) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for stack in paths.into_iter().filter_map(stack_for_path) {
        *counts.entry(stack).or_insert(0) += 1;
    }
    counts
}

/// The most frequent stack among `paths`; ties go to the alphabetically first label.
pub fn dominant_stack<'a>(paths: impl IntoIterator<Item = &'a str>) -> &'static str {
    let counts = stack_counts(paths);
    let mut best: Option<(&'static str, usize)> = None;
    for (stack, count) in counts {
        if best.map_or(true, |(_, n)| count > n) {
            best = Some((stack, count));
        }
    }
    best.map(|(stack, _)| stack).unwrap_or(UNKNOWN_STACK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_extensions_case_insensitively() {
        assert_eq!(stack_for_path("src/Main.JAVA"), Some("java"));
        assert_eq!(stack_for_path("web/app.tsx"), Some("javascript"));
        assert_eq!(stack_for_path("Makefile"), None);
        assert_eq!(stack_for_path("notes.txt"), None);
    }

    #[test]
    fn dominant_stack_prefers_majority() {
        let paths = ["a.go", "b.go", "c.js", "README.md"];
        assert_eq!(dominant_stack(paths), "go");
    }

    #[test]
    fn dominant_stack_tie_is_deterministic() {
        assert_eq!(dominant_stack(["a.go", "b.java"]), "go");
        assert_eq!(dominant_stack(["b.java", "a.go"]), "go");
    }

    #[test]
    fn no_known_files_is_unknown() {
        assert_eq!(dominant_stack(["README.md", "LICENSE"]), UNKNOWN_STACK);
        assert_eq!(dominant_stack(Vec::<&str>::new()), UNKNOWN_STACK);
    }
}
