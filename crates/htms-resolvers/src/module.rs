//! In-memory task modules.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use htms_core::{BoxError, Resolution, Resolver, Task, TaskFuture, TaskInfo};

use crate::error::ResolveError;

/// A task function exported by a module.
pub type TaskFn = Arc<dyn Fn(TaskInfo) -> TaskFuture + Send + Sync>;

/// One named export of a module.
#[derive(Clone)]
pub enum Export {
    /// Callable task.
    Task(TaskFn),
    /// Plain value; resolving it reports the task as not callable.
    Value(serde_json::Value),
}

impl Export {
    /// Bind this export to a task occurrence.
    pub fn resolution(&self, info: &TaskInfo) -> Resolution {
        match self {
            Export::Task(f) => {
                let f = f.clone();
                let info = info.clone();
                Resolution::Task(Task::new(move || f(info)))
            }
            Export::Value(value) => Resolution::Value(value.clone()),
        }
    }
}

impl std::fmt::Debug for Export {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Export::Task(_) => f.write_str("Export::Task(..)"),
            Export::Value(value) => write!(f, "Export::Value({})", value),
        }
    }
}

/// A namespace of named exports.
#[derive(Debug, Clone, Default)]
pub struct TaskModule {
    exports: HashMap<String, Export>,
}

impl TaskModule {
    /// Create an empty module.
    pub fn new() -> Self {
        Self::default()
    }

    /// Export an async task function.
    pub fn with_task<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(TaskInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, BoxError>> + Send + 'static,
    {
        let f: TaskFn = Arc::new(move |info| f(info).boxed());
        self.exports.insert(name.into(), Export::Task(f));
        self
    }

    /// Export a task that always renders the same HTML.
    pub fn with_html(self, name: impl Into<String>, html: impl Into<String>) -> Self {
        let html = html.into();
        self.with_task(name, move |_| {
            let html = html.clone();
            async move { Ok(html) }
        })
    }

    /// Export a plain value.
    pub fn with_value(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.exports.insert(name.into(), Export::Value(value));
        self
    }

    /// Look up an export.
    pub fn get(&self, name: &str) -> Option<&Export> {
        self.exports.get(name)
    }

    /// Exported names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.exports.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Modules keyed by specifier.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<TaskModule>>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module under `specifier`.
    pub fn with_module(mut self, specifier: impl Into<String>, module: TaskModule) -> Self {
        self.register(specifier, module);
        self
    }

    /// Add or replace a module.
    pub fn register(&mut self, specifier: impl Into<String>, module: TaskModule) {
        self.modules.insert(specifier.into(), Arc::new(module));
    }

    /// Look up a module.
    pub fn get(&self, specifier: &str) -> Option<Arc<TaskModule>> {
        self.modules.get(specifier).cloned()
    }

    /// Number of registered modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether no module is registered.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Resolves task names against exports of registered modules.
///
/// Markers outside any module scope use the default specifier. Lookup
/// failures resolve to a task that rejects, so they surface as an error
/// chunk for that placeholder only.
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    registry: Arc<ModuleRegistry>,
    default_specifier: Option<String>,
}

impl ModuleResolver {
    /// Create a resolver over a registry.
    pub fn new(registry: ModuleRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            default_specifier: None,
        }
    }

    /// Module used when a marker has no specifier.
    pub fn with_default_specifier(mut self, specifier: impl Into<String>) -> Self {
        self.default_specifier = Some(specifier.into());
        self
    }

    fn lookup(&self, info: &TaskInfo, specifier: Option<&str>) -> Result<Resolution, ResolveError> {
        let specifier = specifier
            .or(self.default_specifier.as_deref())
            .ok_or_else(|| ResolveError::NoSpecifier {
                name: info.name.clone(),
            })?;

        let module = self
            .registry
            .get(specifier)
            .ok_or_else(|| ResolveError::ModuleNotFound(specifier.to_string()))?;

        let export = module
            .get(&info.name)
            .ok_or_else(|| ResolveError::ExportNotFound {
                name: info.name.clone(),
                specifier: specifier.to_string(),
            })?;

        Ok(export.resolution(info))
    }
}

#[async_trait]
impl Resolver for ModuleResolver {
    async fn resolve(&self, info: &TaskInfo, specifier: Option<&str>) -> Result<Resolution, BoxError> {
        match self.lookup(info, specifier) {
            Ok(resolution) => Ok(resolution),
            Err(error) => {
                tracing::warn!(task = %info.name, error = %error, "task lookup failed");
                Ok(Task::rejected(error).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModuleRegistry {
        ModuleRegistry::new()
            .with_module(
                "news.js",
                TaskModule::new()
                    .with_task("getNews", |info: TaskInfo| async move {
                        Ok(format!("<ul data-for=\"{}\"></ul>", info.uuid))
                    })
                    .with_value("config", serde_json::json!({ "limit": 3 })),
            )
            .with_module("shared.js", TaskModule::new().with_html("footer", "<footer/>"))
    }

    async fn run(resolution: Resolution) -> Result<String, String> {
        match resolution {
            Resolution::Task(task) => task.run().await.map_err(|e| e.to_string()),
            Resolution::Value(value) => panic!("unexpected value {}", value),
        }
    }

    #[tokio::test]
    async fn test_resolves_task_export() {
        let resolver = ModuleResolver::new(registry());
        let info = TaskInfo::new("getNews", "u-7");

        let resolution = resolver.resolve(&info, Some("news.js")).await.unwrap();
        assert_eq!(run(resolution).await.unwrap(), "<ul data-for=\"u-7\"></ul>");
    }

    #[tokio::test]
    async fn test_default_specifier() {
        let resolver = ModuleResolver::new(registry()).with_default_specifier("shared.js");
        let info = TaskInfo::new("footer", "u-1");

        let resolution = resolver.resolve(&info, None).await.unwrap();
        assert_eq!(run(resolution).await.unwrap(), "<footer/>");
    }

    #[tokio::test]
    async fn test_value_export_is_returned_as_value() {
        let resolver = ModuleResolver::new(registry());
        let info = TaskInfo::new("config", "u-1");

        let resolution = resolver.resolve(&info, Some("news.js")).await.unwrap();
        assert_eq!(resolution.kind(), "object");
    }

    #[tokio::test]
    async fn test_lookup_failures_reject() {
        let resolver = ModuleResolver::new(registry());
        let cases = [
            ("getNews", None, "no module specifier for task 'getNews'"),
            ("getNews", Some("missing.js"), "module 'missing.js' not found"),
            ("nope", Some("news.js"), "module 'news.js' has no export 'nope'"),
        ];

        for (name, specifier, message) in cases {
            let info = TaskInfo::new(name, "u");
            let resolution = resolver.resolve(&info, specifier).await.unwrap();
            assert_eq!(run(resolution).await.unwrap_err(), message);
        }
    }

    #[test]
    fn test_module_names_sorted() {
        let module = registry().get("news.js").unwrap();
        assert_eq!(module.names(), vec!["config", "getNews"]);
    }
}
