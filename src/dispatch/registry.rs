//! Intent-type to handler routing.
//!
//! # Resolution Order
//!
//! 1. A route whose pattern equals the intent type exactly
//! 2. The first route (in registration order) whose glob pattern matches
//! 3. The default handler, if one is set
//! 4. Error: the task is unroutable

use super::Handler;
use crate::error::{AgentError, Result};
use globset::{Glob, GlobMatcher};
use std::fmt;
use std::sync::Arc;

struct Route {
    pattern: String,
    matcher: GlobMatcher,
    handler: Arc<dyn Handler>,
}

/// Registered handlers keyed by intent-type pattern.
///
/// The registry is mutable only while the agent is being configured; the
/// dispatcher takes it by value and shares it immutably afterwards.
#[derive(Default)]
pub struct HandlerRegistry {
    routes: Vec<Route>,
    default: Option<Arc<dyn Handler>>,
}

/// Resolved handler for an intent type.
pub struct HandlerBinding<'a> {
    pub handler: &'a Arc<dyn Handler>,
    /// The pattern that matched (`None` for the default handler).
    pub pattern: Option<&'a str>,
    pub source: RouteSource,
}

impl fmt::Debug for HandlerBinding<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerBinding")
            .field("pattern", &self.pattern)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// How a handler binding was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSource {
    /// A registered pattern matched the intent type.
    Explicit,
    /// Fell back to the default handler.
    Default,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for intent types matching `pattern` (glob syntax).
    pub fn register(&mut self, pattern: &str, handler: Arc<dyn Handler>) -> Result<()> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(AgentError::Configuration(
                "handler intent type pattern must not be empty".to_string(),
            ));
        }
        if self.routes.iter().any(|r| r.pattern == pattern) {
            return Err(AgentError::Configuration(format!(
                "a handler is already registered for '{}'",
                pattern
            )));
        }

        let matcher = Glob::new(pattern)
            .map_err(|e| {
                AgentError::Configuration(format!(
                    "invalid handler intent type pattern '{}': {}",
                    pattern, e
                ))
            })?
            .compile_matcher();

        self.routes.push(Route {
            pattern: pattern.to_string(),
            matcher,
            handler,
        });
        Ok(())
    }

    /// Handler used when no pattern matches.
    pub fn set_default(&mut self, handler: Arc<dyn Handler>) {
        self.default = Some(handler);
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty() && self.default.is_none()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.pattern.as_str())
    }

    /// Resolve the handler for an intent type.
    pub fn resolve(&self, intent_type: &str) -> Result<HandlerBinding<'_>> {
        let explicit = self
            .routes
            .iter()
            .find(|r| r.pattern == intent_type)
            .or_else(|| self.routes.iter().find(|r| r.matcher.is_match(intent_type)));

        if let Some(route) = explicit {
            return Ok(HandlerBinding {
                handler: &route.handler,
                pattern: Some(&route.pattern),
                source: RouteSource::Explicit,
            });
        }

        match self.default {
            Some(ref handler) => Ok(HandlerBinding {
                handler,
                pattern: None,
                source: RouteSource::Default,
            }),
            None => Err(AgentError::TaskExecution(format!(
                "no handler registered for intent type '{}' and no default handler is set.\n\
                 Registered patterns: {}",
                intent_type,
                self.available_patterns()
            ))),
        }
    }

    fn available_patterns(&self) -> String {
        if self.routes.is_empty() {
            "(none)".to_string()
        } else {
            self.patterns().collect::<Vec<_>>().join(", ")
        }
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("patterns", &self.patterns().collect::<Vec<_>>())
            .field("has_default", &self.default.is_some())
            .finish()
    }
}
