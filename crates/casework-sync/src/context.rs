//! Shared effects and settings handed to every synchronizer.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use casework_core::config::{CaseworkConfig, CollectionConfig};
use casework_core::effects::{
    AbortSignal, Method, PhysicalTimeEffects, RequestOptions, TransportEffects,
};
use casework_core::errors::{CaseworkError, Result};

use crate::paths::ApiPaths;

/// Transport, clock, paths and collection settings.
///
/// Cheap to clone; synchronizers each keep their own copy.
#[derive(Clone)]
pub struct SyncContext {
    transport: Arc<dyn TransportEffects>,
    clock: Arc<dyn PhysicalTimeEffects>,
    paths: ApiPaths,
    collections: CollectionConfig,
}

impl SyncContext {
    /// Context over `transport` and `clock`. Fails if the configured API paths do not parse.
    pub fn new(
        transport: Arc<dyn TransportEffects>,
        clock: Arc<dyn PhysicalTimeEffects>,
        config: &CaseworkConfig,
    ) -> Result<Self> {
        Ok(Self {
            transport,
            clock,
            paths: ApiPaths::new(&config.api)?,
            collections: config.collections.clone(),
        })
    }

    /// Endpoint path builder.
    pub fn paths(&self) -> &ApiPaths {
        &self.paths
    }

    /// List settings.
    pub fn collections(&self) -> &CollectionConfig {
        &self.collections
    }

    /// Current time from the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.physical_time()
    }

    /// Milliseconds since the epoch, for placeholder ids.
    pub fn timestamp_ms(&self) -> i64 {
        self.clock.current_timestamp_ms()
    }

    /// Issue one transport call and map its rejection.
    ///
    /// `fallback` becomes the message when the rejection carries none.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        signal: Option<AbortSignal>,
        fallback: &str,
    ) -> Result<Value> {
        let options = RequestOptions { signal };
        tracing::trace!(%method, path, "transport call");
        let result = match method {
            Method::Get => self.transport.get(path, options).await,
            Method::Post => self.transport.post(path, body, options).await,
            Method::Patch => self.transport.patch(path, body, options).await,
            Method::Delete => self.transport.delete(path, options).await,
        };
        result.map_err(|err| {
            let mapped = CaseworkError::from_transport(err, fallback);
            if !mapped.is_cancellation() {
                tracing::debug!(%method, path, error = %mapped, "transport call failed");
            }
            mapped
        })
    }

    /// `GET path` with an abort signal.
    pub async fn fetch(&self, path: &str, signal: &AbortSignal, fallback: &str) -> Result<Value> {
        self.call(Method::Get, path, None, Some(signal.clone()), fallback)
            .await
    }

    /// Mutating call with a serializable body.
    pub async fn send<B>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> Result<Value>
    where
        B: serde::Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.call(method, path, Some(body), None, fallback).await
    }
}

impl fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncContext")
            .field("paths", &self.paths)
            .field("collections", &self.collections)
            .finish_non_exhaustive()
    }
}
