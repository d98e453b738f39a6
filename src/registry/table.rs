use std::collections::BTreeMap;

use crate::foundation::error::{OperationError, OperationResult};
use crate::media::item::MediaItem;
use crate::registry::operation::{Operation, OperationDescriptor};
use crate::registry::params::Params;
use crate::registry::request::OperationRequest;
use crate::registry::run::{RunContext, run};

/// Table of operations, keyed by id.
///
/// Built once and then only read; pass it by reference to whoever dispatches.
#[derive(Clone, Debug, Default)]
pub struct FeatureRegistry {
    ops: BTreeMap<&'static str, OperationDescriptor>,
}

impl FeatureRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in operation.
    pub fn with_builtin_operations() -> Self {
        let mut reg = Self::new();
        for op in Operation::ALL {
            reg.ops.insert(op.id(), op.descriptor());
        }
        reg
    }

    pub fn register(&mut self, descriptor: OperationDescriptor) -> OperationResult<()> {
        if self.ops.contains_key(descriptor.id) {
            return Err(OperationError::DuplicateOperation(descriptor.id.to_string()));
        }
        self.ops.insert(descriptor.id, descriptor);
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> OperationResult<&OperationDescriptor> {
        self.ops
            .get(id)
            .ok_or_else(|| OperationError::UnknownOperation(id.to_string()))
    }

    /// Every registered descriptor, ordered by id.
    pub fn descriptors(&self) -> impl Iterator<Item = &OperationDescriptor> + '_ {
        self.ops.values()
    }

    /// Descriptors applicable to `asset`, produced lazily.
    pub fn list<'a>(
        &'a self,
        asset: &'a MediaItem,
    ) -> impl Iterator<Item = &'a OperationDescriptor> + 'a {
        self.ops.values().filter(move |d| d.applies_to(asset))
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Run operation `id` on `asset`.
    ///
    /// Fails with `UnknownOperation`, then `UnsupportedAssetKind`, then `InvalidParameters`
    /// before any media is touched; later failures come from the export itself.
    #[tracing::instrument(skip(self, asset, params, ctx), fields(asset = %asset.id, kind = %asset.kind))]
    pub async fn dispatch(
        &self,
        id: &str,
        asset: &MediaItem,
        params: &Params,
        ctx: &RunContext,
    ) -> OperationResult<MediaItem> {
        let descriptor = self.lookup(id)?;
        if !descriptor.applies_to(asset) {
            return Err(OperationError::unsupported_kind(id, asset.kind));
        }
        let request = OperationRequest::parse(descriptor.operation, asset, params)?;
        tracing::debug!(?request, "dispatching");
        let out = run(request, asset, ctx).await?;
        tracing::info!(output = %out.locator, kind = %out.kind, duration = out.duration, "operation finished");
        Ok(out)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/registry/table.rs"]
mod tests;
