use crate::{
    context::ExecutionContext,
    models::{Action, Scope, StoreType},
};

/// Whether a cache write must be suppressed because it comes from a pull
/// request build.
///
/// Pull requests may read any cache, but only write to the cache of their
/// own event. Writes to job or pipeline caches are shared with the base
/// branch and are skipped.
pub fn should_skip(
    store_type: StoreType,
    scope: Scope,
    action: Action,
    ctx: &ExecutionContext,
) -> bool {
    if store_type != StoreType::Cache || !ctx.is_pull_request() {
        return false;
    }

    if action.is_write() && matches!(scope, Scope::Pipeline | Scope::Job) {
        tracing::info!("Skipping {action} {scope}-scoped cache for Pull Request");
        return true;
    }

    false
}
