//! Lookup failures.

/// Why a task could not be found.
///
/// Resolvers in this crate do not fail resolution outright; they hand back
/// a task that rejects with one of these.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no module specifier for task '{name}'")]
    NoSpecifier { name: String },

    #[error("module '{0}' not found")]
    ModuleNotFound(String),

    #[error("module '{specifier}' has no export '{name}'")]
    ExportNotFound { name: String, specifier: String },

    #[error("invalid fragment path '{0}'")]
    InvalidPath(String),

    #[error("failed to read fragment '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
