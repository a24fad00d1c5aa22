//! Resolver stage: binds task markers to runnable work.

use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use htms_core::{
    HtmsError, Resolution, ResolutionPolicy, ResolvedWork, Resolver, ResolverToken, Task,
    TaskInfo, Token,
};

/// Per-document resolver state.
///
/// Tracks module scopes on its own so tokens coming from any source get
/// the right specifier, and accumulates resolved work until end of input.
pub struct ResolverStage {
    resolver: Arc<dyn Resolver>,
    policy: ResolutionPolicy,
    scopes: Vec<String>,
    work: Vec<ResolvedWork>,
}

impl ResolverStage {
    /// Create a stage for one document.
    pub fn new(resolver: Arc<dyn Resolver>, policy: ResolutionPolicy) -> Self {
        Self {
            resolver,
            policy,
            scopes: Vec::new(),
            work: Vec::new(),
        }
    }

    /// Observe a token, resolving it if it is a task marker.
    pub async fn observe(&mut self, token: &Token) -> Result<(), HtmsError> {
        match token {
            Token::ModuleScopeStart { specifier, .. } => {
                self.scopes.push(specifier.clone());
                Ok(())
            }
            Token::ModuleScopeEnd { .. } => {
                self.scopes.pop();
                Ok(())
            }
            Token::TaskMarker {
                task, specifier, ..
            } => {
                let specifier = specifier.clone().or_else(|| self.scopes.last().cloned());
                self.resolve(task.clone(), specifier).await
            }
            _ => Ok(()),
        }
    }

    async fn resolve(&mut self, info: TaskInfo, specifier: Option<String>) -> Result<(), HtmsError> {
        tracing::debug!(
            task = %info.name,
            uuid = %info.uuid,
            specifier = specifier.as_deref().unwrap_or(""),
            "resolving task"
        );

        let error = match self.resolver.resolve(&info, specifier.as_deref()).await {
            Ok(Resolution::Task(task)) => {
                self.work.push(ResolvedWork::new(info, specifier, task));
                return Ok(());
            }
            // A non-callable export is a broken document under either policy.
            Ok(resolution) => {
                return Err(HtmsError::NotCallable {
                    name: info.name,
                    kind: resolution.kind(),
                })
            }
            Err(source) => HtmsError::Resolve {
                name: info.name.clone(),
                source,
            },
        };

        match self.policy {
            ResolutionPolicy::Fatal => Err(error),
            ResolutionPolicy::Graceful => {
                tracing::warn!(task = %info.name, error = %error, "task resolution failed");
                let task = Task::rejected(error.to_string());
                self.work.push(ResolvedWork::new(info, specifier, task));
                Ok(())
            }
        }
    }

    /// Number of tasks resolved so far.
    pub fn resolved(&self) -> usize {
        self.work.len()
    }

    /// Take the accumulated work in marker order.
    pub fn take_work(&mut self) -> Vec<ResolvedWork> {
        std::mem::take(&mut self.work)
    }
}

enum Phase {
    Tokens,
    Work(std::vec::IntoIter<ResolvedWork>),
    Done,
}

struct ResolveState<S> {
    upstream: Pin<Box<S>>,
    stage: ResolverStage,
    /// Marker forwarded but not yet resolved.
    pending: Option<Token>,
    phase: Phase,
}

/// Forward every token and append resolved work at end of input.
///
/// Each marker is yielded before it is resolved, so downstream sees it
/// without waiting on the resolver. A fatal failure is yielded as the last
/// item; no work is emitted after it.
pub fn resolve_tokens<S>(
    tokens: S,
    resolver: Arc<dyn Resolver>,
    policy: ResolutionPolicy,
) -> impl Stream<Item = Result<ResolverToken, HtmsError>>
where
    S: Stream<Item = Result<Token, HtmsError>>,
{
    let state = ResolveState {
        upstream: Box::pin(tokens),
        stage: ResolverStage::new(resolver, policy),
        pending: None,
        phase: Phase::Tokens,
    };

    futures::stream::unfold(state, |mut state| async move {
        if let Some(token) = state.pending.take() {
            if let Err(error) = state.stage.observe(&token).await {
                state.phase = Phase::Done;
                return Some((Err(error), state));
            }
        }

        loop {
            match &mut state.phase {
                Phase::Done => return None,
                Phase::Work(work) => {
                    return match work.next() {
                        Some(item) => Some((Ok(ResolverToken::Task(item)), state)),
                        None => {
                            state.phase = Phase::Done;
                            None
                        }
                    };
                }
                Phase::Tokens => match state.upstream.next().await {
                    Some(Ok(token)) => {
                        if token.is_task_marker() {
                            state.pending = Some(token.clone());
                        } else if let Err(error) = state.stage.observe(&token).await {
                            state.phase = Phase::Done;
                            return Some((Err(error), state));
                        }
                        return Some((Ok(ResolverToken::Token(token)), state));
                    }
                    Some(Err(error)) => {
                        state.phase = Phase::Done;
                        return Some((Err(error), state));
                    }
                    None => {
                        let work = state.stage.take_work();
                        state.phase = Phase::Work(work.into_iter());
                    }
                },
            }
        }
    })
}
