//! Process-wide cache of compiled models.
//!
//! Keyed by handle type, design-time flag and bound schema together. Keying
//! by handle type alone would hand one tenant's schema-qualified model to
//! every other tenant.

use crate::model::CompiledModel;
use dashmap::DashMap;
use std::any::{type_name, TypeId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelCacheKey {
    handle_type: TypeId,
    design_time: bool,
    schema: Option<String>,
}

impl ModelCacheKey {
    pub fn new<H: 'static>(design_time: bool, schema: Option<&str>) -> Self {
        Self {
            handle_type: TypeId::of::<H>(),
            design_time,
            schema: schema.map(str::to_string),
        }
    }

    pub fn design_time(&self) -> bool {
        self.design_time
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }
}

#[derive(Default)]
pub struct ModelCache {
    models: DashMap<ModelCacheKey, Arc<CompiledModel>>,
    compilations: AtomicUsize,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached model for `H` under this mode and schema, compiling it on first use.
    pub fn model_for<H: 'static, F>(
        &self,
        design_time: bool,
        schema: Option<&str>,
        compile: F,
    ) -> Arc<CompiledModel>
    where
        F: FnOnce() -> CompiledModel,
    {
        let key = ModelCacheKey::new::<H>(design_time, schema);

        if let Some(model) = self.models.get(&key) {
            return Arc::clone(model.value());
        }

        // The entry holds the shard lock, so racing callers compile at most once.
        let model = self.models.entry(key).or_insert_with(|| {
            self.compilations.fetch_add(1, Ordering::Relaxed);
            debug!(
                "Compiling model for {} (design_time={}, schema={:?})",
                type_name::<H>(),
                design_time,
                schema
            );
            Arc::new(compile())
        });

        Arc::clone(model.value())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Number of models compiled since the cache was created.
    pub fn compilations(&self) -> usize {
        self.compilations.load(Ordering::Relaxed)
    }
}
