//! Closure-backed resolver.

use async_trait::async_trait;
use htms_core::{BoxError, Resolution, Resolver, Task, TaskInfo};

/// Resolver that delegates to a synchronous closure.
///
/// The closure only binds the task; any slow work belongs inside the task
/// it returns.
pub struct FnResolver<F> {
    f: F,
}

impl<F> FnResolver<F>
where
    F: Fn(&TaskInfo, Option<&str>) -> Result<Resolution, BoxError> + Send + Sync,
{
    /// Wrap a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Resolver for FnResolver<F>
where
    F: Fn(&TaskInfo, Option<&str>) -> Result<Resolution, BoxError> + Send + Sync,
{
    async fn resolve(&self, info: &TaskInfo, specifier: Option<&str>) -> Result<Resolution, BoxError> {
        (self.f)(info, specifier)
    }
}

/// Resolver whose tasks render a fixed piece of HTML per task name.
pub fn static_resolver<I, K, V>(
    entries: I,
) -> FnResolver<impl Fn(&TaskInfo, Option<&str>) -> Result<Resolution, BoxError> + Send + Sync>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let entries: std::collections::HashMap<String, String> = entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();

    FnResolver::new(move |info: &TaskInfo, _specifier: Option<&str>| {
        match entries.get(&info.name) {
            Some(html) => Ok(Task::ready(html.clone()).into()),
            None => Err(format!("unknown task '{}'", info.name).into()),
        }
    })
}
