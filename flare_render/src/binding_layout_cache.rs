/// Content-addressed cache of binding layouts
///
/// Logically identical layout descriptions resolve to one shared layout
/// object. Entries live until `clear()` at renderer shutdown.

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::{Arc, Mutex, MutexGuard};

use rustc_hash::FxBuildHasher;

use crate::error::{Error, Result};
use crate::graphics_device::{BindingLayout, BindingLayoutDesc, BindingLayoutKey, GraphicsDevice};
use crate::{engine_debug, engine_error, engine_fatal, engine_info};

pub struct BindingLayoutCache<S = FxBuildHasher> {
    entries: Mutex<HashMap<BindingLayoutKey, Arc<dyn BindingLayout>, S>>,
}

impl BindingLayoutCache<FxBuildHasher> {
    pub fn new() -> Self {
        Self::with_hasher(FxBuildHasher)
    }
}

impl Default for BindingLayoutCache<FxBuildHasher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: BuildHasher> BindingLayoutCache<S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            entries: Mutex::new(HashMap::with_hasher(hasher)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<BindingLayoutKey, Arc<dyn BindingLayout>, S>>> {
        self.entries
            .lock()
            .map_err(|_| Error::BackendError("binding layout cache lock poisoned".to_string()))
    }

    /// Return the cached layout for `desc`, creating it on first use
    ///
    /// The lock is held across lookup and creation so concurrent callers
    /// never create two layouts for one key.
    pub fn get_or_create(
        &self,
        device: &dyn GraphicsDevice,
        desc: &BindingLayoutDesc,
    ) -> Result<Arc<dyn BindingLayout>> {
        let key = desc.key();
        let mut entries = self.lock()?;

        if let Some(layout) = entries.get(&key) {
            return Ok(Arc::clone(layout));
        }

        let layout = device.create_binding_layout(desc)?;
        engine_debug!(
            "flare::layout_cache",
            "Created binding layout {:?} with {} slots ({} cached)",
            desc.label.as_deref().unwrap_or("<unnamed>"),
            desc.entries.len(),
            entries.len() + 1
        );
        entries.insert(key, Arc::clone(&layout));
        Ok(layout)
    }

    /// Entries for counting, read through a poisoned lock
    fn inspect(&self) -> MutexGuard<'_, HashMap<BindingLayoutKey, Arc<dyn BindingLayout>, S>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            engine_error!("flare::layout_cache", "Binding layout cache lock poisoned, reading through it");
            poisoned.into_inner()
        })
    }

    pub fn len(&self) -> usize {
        self.inspect().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of cached layouts still referenced outside the cache
    pub fn live_reference_count(&self) -> usize {
        self.inspect()
            .values()
            .filter(|layout| Arc::strong_count(layout) > 1)
            .count()
    }

    /// Drop every cached layout
    ///
    /// Every pipeline and binding set built on a cached layout must already be
    /// destroyed; a layout still referenced elsewhere is fatal.
    pub fn clear(&self) -> Result<()> {
        let mut entries = self.lock()?;
        let live: Vec<String> = entries
            .iter()
            .filter(|(_, layout)| Arc::strong_count(layout) > 1)
            .map(|(key, layout)| {
                format!(
                    "{} ({} slots, {} refs)",
                    layout.desc().label.as_deref().unwrap_or("<unnamed>"),
                    key.entries().len(),
                    Arc::strong_count(layout) - 1
                )
            })
            .collect();

        if !live.is_empty() {
            engine_fatal!(
                "flare::layout_cache",
                "clear() with {} binding layouts still referenced: {}",
                live.len(),
                live.join(", ")
            );
        }

        let count = entries.len();
        entries.clear();
        engine_info!("flare::layout_cache", "Released {} cached binding layouts", count);
        Ok(())
    }
}

#[cfg(test)]
#[path = "binding_layout_cache_tests.rs"]
mod tests;
