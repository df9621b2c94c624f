//! Uniform wrapper around tool calls
//!
//! Every call goes through the same steps: fingerprint the request, consult
//! the cache, join an identical call already in flight, otherwise call the
//! tool under a timeout and cache a successful result.

use crate::cache::ResultCache;
use crate::fingerprint::Fingerprint;
use crate::registry::ToolRegistry;
use crate::tool::Tool;
use agent_core::{ToolCaller, ToolError};
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

type SharedCall = Shared<BoxFuture<'static, Result<Value, ToolError>>>;

/// Counters describing invoker activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvokerStats {
    /// Calls that actually reached a tool
    pub invocations: u64,
    /// Calls answered from the cache
    pub cache_hits: u64,
    /// Calls that joined an identical in-flight or completed call
    pub joined: u64,
}

#[derive(Debug, Default)]
struct Counters {
    invocations: AtomicU64,
    cache_hits: AtomicU64,
    joined: AtomicU64,
}

/// Executes tools with caching, timeouts and per-plan de-duplication
#[derive(Clone)]
pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    cache: ResultCache,
    timeout: Duration,
    in_flight: Arc<Mutex<HashMap<Fingerprint, SharedCall>>>,
    counters: Arc<Counters>,
}

impl ToolInvoker {
    pub fn new(registry: Arc<ToolRegistry>, cache: ResultCache, timeout: Duration) -> Self {
        Self {
            registry,
            cache,
            timeout,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
        }
    }

    /// A view sharing tools, cache and counters but with its own in-flight table
    ///
    /// The orchestrator takes one scope per execution plan so that
    /// de-duplication never leaks across requests.
    pub fn scoped(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            cache: self.cache.clone(),
            timeout: self.timeout,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            counters: Arc::clone(&self.counters),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn stats(&self) -> InvokerStats {
        InvokerStats {
            invocations: self.counters.invocations.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            joined: self.counters.joined.load(Ordering::Relaxed),
        }
    }

    /// Invoke a tool by name
    pub async fn invoke(&self, tool_name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| ToolError::fatal(tool_name, "no such tool registered"))?;
        let fingerprint = Fingerprint::compute(tool_name, &args);

        if let Some(value) = self.cache.get(&fingerprint).await {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }

        let call = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = in_flight.get(&fingerprint) {
                self.counters.joined.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    tool = tool_name,
                    fingerprint = fingerprint.short(),
                    "Joining identical tool call"
                );
                existing.clone()
            } else {
                let call = self.start_call(tool, args, fingerprint.clone());
                in_flight.insert(fingerprint.clone(), call.clone());
                call
            }
        };

        let result = call.clone().await;

        if result.is_err() {
            // Release the failed call so a retry reaches the tool again
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if in_flight
                .get(&fingerprint)
                .is_some_and(|current| current.ptr_eq(&call))
            {
                in_flight.remove(&fingerprint);
            }
        }

        result
    }

    fn start_call(&self, tool: Arc<dyn Tool>, args: Value, fingerprint: Fingerprint) -> SharedCall {
        let cache = self.cache.clone();
        let counters = Arc::clone(&self.counters);
        let timeout = self.timeout;

        async move {
            counters.invocations.fetch_add(1, Ordering::Relaxed);
            let name = tool.name().to_string();
            tracing::debug!(tool = %name, fingerprint = fingerprint.short(), "Invoking tool");

            let value = match tokio::time::timeout(timeout, tool.call(args)).await {
                Ok(Ok(value)) => value,
                Ok(Err(e)) => {
                    tracing::warn!(tool = %name, error = %e, "Tool call failed");
                    return Err(e);
                }
                Err(_) => {
                    tracing::warn!(tool = %name, ?timeout, "Tool call timed out");
                    return Err(ToolError::retriable(
                        name,
                        format!("timed out after {}ms", timeout.as_millis()),
                    ));
                }
            };

            cache.put(fingerprint, value.clone(), tool.ttl()).await;
            Ok(value)
        }
        .boxed()
        .shared()
    }
}

#[async_trait]
impl ToolCaller for ToolInvoker {
    async fn call_tool(&self, tool: &str, args: Value) -> Result<Value, ToolError> {
        self.invoke(tool, args).await
    }
}
