//! Tasks and the resolver interface.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;

use crate::token::Token;

/// Error type returned by task and resolver implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Future returned when a task runs.
pub type TaskFuture = BoxFuture<'static, Result<String, BoxError>>;

/// Identity of one placeholder occurrence in a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TaskInfo {
    /// Task name from `data-htms`.
    pub name: String,
    /// Unique per occurrence, also the chunk correlation key.
    pub uuid: String,
}

impl TaskInfo {
    /// Create task info.
    pub fn new(name: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: uuid.into(),
        }
    }
}

/// A zero-argument operation producing an HTML string.
pub struct Task(Box<dyn FnOnce() -> TaskFuture + Send>);

impl Task {
    /// Create a task from an async closure.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<String, BoxError>> + Send + 'static,
    {
        Self(Box::new(move || f().boxed()))
    }

    /// Create a task that resolves to fixed HTML.
    pub fn ready(html: impl Into<String>) -> Self {
        let html = html.into();
        Self::new(move || async move { Ok(html) })
    }

    /// Create a task that always fails with the given error.
    pub fn rejected(error: impl Into<BoxError>) -> Self {
        let error = error.into();
        Self::new(move || async move { Err(error) })
    }

    /// Start the task.
    pub fn run(self) -> TaskFuture {
        (self.0)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Task(..)")
    }
}

/// What a resolver found for a task name.
///
/// Resolvers backed by module namespaces may find a plain value where a
/// task was expected; the resolver stage reports that as not callable.
#[derive(Debug)]
pub enum Resolution {
    /// A runnable task.
    Task(Task),
    /// A non-callable value.
    Value(serde_json::Value),
}

impl Resolution {
    /// Runtime type name of the resolved value.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Task(_) => "function",
            Self::Value(value) => match value {
                serde_json::Value::Null => "null",
                serde_json::Value::Bool(_) => "boolean",
                serde_json::Value::Number(_) => "number",
                serde_json::Value::String(_) => "string",
                serde_json::Value::Array(_) => "array",
                serde_json::Value::Object(_) => "object",
            },
        }
    }
}

impl From<Task> for Resolution {
    fn from(task: Task) -> Self {
        Self::Task(task)
    }
}

/// Turns a task marker into runnable work.
///
/// Implementations are interchangeable: module registries, directories of
/// fragments, closures and test doubles.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve `info` against the effective module `specifier`, if any.
    async fn resolve(&self, info: &TaskInfo, specifier: Option<&str>) -> Result<Resolution, BoxError>;
}

#[async_trait]
impl<R: Resolver + ?Sized> Resolver for Arc<R> {
    async fn resolve(&self, info: &TaskInfo, specifier: Option<&str>) -> Result<Resolution, BoxError> {
        (**self).resolve(info, specifier).await
    }
}

/// A resolved task waiting to be executed by the serializer.
#[derive(Debug)]
pub struct ResolvedWork {
    /// The marker this work belongs to.
    pub info: TaskInfo,
    /// The module specifier used for resolution.
    pub specifier: Option<String>,
    /// The task itself.
    pub task: Task,
}

impl ResolvedWork {
    /// Create resolved work.
    pub fn new(info: TaskInfo, specifier: Option<String>, task: Task) -> Self {
        Self {
            info,
            specifier,
            task,
        }
    }
}

/// Item flowing from the resolver stage to the serializer.
#[derive(Debug)]
pub enum ResolverToken {
    /// A forwarded markup token.
    Token(Token),
    /// Work appended after the last token.
    Task(ResolvedWork),
}

impl From<Token> for ResolverToken {
    fn from(token: Token) -> Self {
        Self::Token(token)
    }
}
