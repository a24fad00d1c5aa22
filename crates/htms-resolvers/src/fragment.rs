//! Fragment-directory resolver.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use htms_core::{BoxError, Resolution, Resolver, Task, TaskInfo};

use crate::error::ResolveError;

type FragmentCache = Arc<RwLock<HashMap<PathBuf, String>>>;

/// Resolves tasks to HTML files under a root directory.
///
/// The specifier names a directory under the root and the task name a file
/// stem, so `<p data-htms="card" data-htms-module="product">` reads
/// `<root>/product/card.html`. Markers without a specifier read from the
/// root itself. Files are read when the task runs, not when it resolves.
#[derive(Debug, Clone)]
pub struct FragmentResolver {
    root: PathBuf,
    extension: String,
    cache: Option<FragmentCache>,
}

impl FragmentResolver {
    /// Create a resolver reading `.html` files under `root`, uncached.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: "html".to_string(),
            cache: None,
        }
    }

    /// Change the fragment file extension.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Keep fragment contents in memory after the first read.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled.then(FragmentCache::default);
        self
    }

    /// Fragment root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of cached fragments.
    pub fn cached(&self) -> usize {
        self.cache
            .as_ref()
            .and_then(|cache| cache.read().ok().map(|c| c.len()))
            .unwrap_or(0)
    }

    /// Path of the fragment for a task, rejecting anything that would
    /// leave the root.
    pub fn fragment_path(&self, name: &str, specifier: Option<&str>) -> Result<PathBuf, ResolveError> {
        let mut path = self.root.clone();

        if let Some(specifier) = specifier {
            let relative = Path::new(specifier.trim_matches('/'));
            if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
                return Err(ResolveError::InvalidPath(specifier.to_string()));
            }
            path.push(relative);
        }

        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return Err(ResolveError::InvalidPath(name.to_string())),
        }
        path.push(format!("{}.{}", name, self.extension));

        Ok(path)
    }
}

async fn read_fragment(path: PathBuf, cache: Option<FragmentCache>) -> Result<String, BoxError> {
    if let Some(html) = cache
        .as_ref()
        .and_then(|cache| cache.read().ok()?.get(&path).cloned())
    {
        tracing::trace!(path = %path.display(), "fragment cache hit");
        return Ok(html);
    }

    let html = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| ResolveError::Read {
            path: path.display().to_string(),
            source,
        })?;

    if let Some(cache) = cache {
        if let Ok(mut cache) = cache.write() {
            cache.insert(path, html.clone());
        }
    }

    Ok(html)
}

#[async_trait]
impl Resolver for FragmentResolver {
    async fn resolve(&self, info: &TaskInfo, specifier: Option<&str>) -> Result<Resolution, BoxError> {
        let task = match self.fragment_path(&info.name, specifier) {
            Ok(path) => {
                let cache = self.cache.clone();
                Task::new(move || read_fragment(path, cache))
            }
            Err(error) => {
                tracing::warn!(task = %info.name, error = %error, "invalid fragment reference");
                Task::rejected(error)
            }
        };

        Ok(task.into())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    async fn run(resolver: &FragmentResolver, name: &str, specifier: Option<&str>) -> Result<String, String> {
        let info = TaskInfo::new(name, "u");
        match resolver.resolve(&info, specifier).await.unwrap() {
            Resolution::Task(task) => task.run().await.map_err(|e| e.to_string()),
            Resolution::Value(_) => panic!("expected a task"),
        }
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("product")).unwrap();
        fs::write(dir.path().join("product/card.html"), "<article>card</article>").unwrap();
        fs::write(dir.path().join("banner.html"), "<aside>sale</aside>").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_reads_fragment_by_specifier() {
        let dir = fixture();
        let resolver = FragmentResolver::new(dir.path());

        assert_eq!(run(&resolver, "card", Some("product")).await.unwrap(), "<article>card</article>");
        assert_eq!(run(&resolver, "banner", None).await.unwrap(), "<aside>sale</aside>");
    }

    #[tokio::test]
    async fn test_missing_fragment_rejects() {
        let dir = fixture();
        let resolver = FragmentResolver::new(dir.path());

        let err = run(&resolver, "nope", Some("product")).await.unwrap_err();
        assert!(err.starts_with("failed to read fragment"));
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = fixture();
        let resolver = FragmentResolver::new(dir.path().join("product"));

        let err = run(&resolver, "banner", Some("..")).await.unwrap_err();
        assert_eq!(err, "invalid fragment path '..'");
        let err = run(&resolver, "../banner", None).await.unwrap_err();
        assert_eq!(err, "invalid fragment path '../banner'");
    }

    #[tokio::test]
    async fn test_cache_is_opt_in() {
        let dir = fixture();
        let uncached = FragmentResolver::new(dir.path());
        let cached = FragmentResolver::new(dir.path()).with_cache(true);

        run(&uncached, "banner", None).await.unwrap();
        run(&cached, "banner", None).await.unwrap();
        assert_eq!(uncached.cached(), 0);
        assert_eq!(cached.cached(), 1);

        fs::write(dir.path().join("banner.html"), "<aside>changed</aside>").unwrap();
        assert_eq!(run(&uncached, "banner", None).await.unwrap(), "<aside>changed</aside>");
        assert_eq!(run(&cached, "banner", None).await.unwrap(), "<aside>sale</aside>");
    }

    #[test]
    fn test_extension() {
        let resolver = FragmentResolver::new("/srv/fragments").with_extension(".htm");
        assert_eq!(
            resolver.fragment_path("nav", Some("/layout/")).unwrap(),
            PathBuf::from("/srv/fragments/layout/nav.htm")
        );
    }
}
