//! URL path to document file resolution.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Compile glob patterns for [`match_file_path`].
pub fn compile_patterns<I, S>(patterns: I) -> Result<Vec<Pattern>, glob::PatternError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    patterns
        .into_iter()
        .map(|p| Pattern::new(p.as_ref()))
        .collect()
}

/// Resolve a request path to a document under `root`.
///
/// Query and fragment are ignored and surrounding slashes trimmed. A
/// directory resolves to its `index` file. The path relative to `root` must
/// match one of `patterns`. Paths that would leave `root` never match.
pub async fn match_file_path(
    root: &Path,
    index: &str,
    patterns: &[Pattern],
    url_path: &str,
) -> Option<PathBuf> {
    let path = url_path.split(['?', '#']).next().unwrap_or_default();

    let mut candidate = root.to_path_buf();
    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if segment == ".." || segment.contains('\\') {
            tracing::debug!(path = %url_path, "rejected path outside document root");
            return None;
        }
        candidate.push(segment);
    }

    let metadata = tokio::fs::metadata(&candidate).await.ok()?;
    if metadata.is_dir() {
        candidate.push(index);
        if !tokio::fs::metadata(&candidate).await.ok()?.is_file() {
            return None;
        }
    } else if !metadata.is_file() {
        return None;
    }

    let relative = candidate.strip_prefix(root).ok()?;
    patterns
        .iter()
        .any(|p| p.matches_path_with(relative, MATCH_OPTIONS))
        .then_some(candidate)
}
