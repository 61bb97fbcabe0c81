use crate::{
    address::Address,
    context::ExecutionContext,
    models::{Action, CacheStrategy, Scope, StoreType},
    policy,
    store::{Store, StoreError, disk::DiskCache, http::HttpStore},
};

/// Routes one action to the remote store or the disk cache.
pub struct Dispatcher<'a, S> {
    ctx: &'a ExecutionContext,
    store: S,
    disk: DiskCache<'a>,
}

impl<'a> Dispatcher<'a, HttpStore<'a>> {
    pub fn remote(ctx: &'a ExecutionContext) -> Self {
        Self::new(ctx, HttpStore::new(ctx))
    }
}

impl<'a, S> Dispatcher<'a, S>
where
    S: Store + Send + Sync,
{
    pub fn new(ctx: &'a ExecutionContext, store: S) -> Self {
        Self {
            ctx,
            store,
            disk: DiskCache::new(ctx),
        }
    }

    pub async fn execute(
        &self,
        action: Action,
        store_type: StoreType,
        scope: Scope,
        key: &str,
    ) -> Result<(), StoreError> {
        if policy::should_skip(store_type, scope, action, self.ctx) {
            return Ok(());
        }

        if store_type == StoreType::Cache && self.ctx.cache_strategy == CacheStrategy::Disk {
            return self
                .disk
                .execute(action, scope, key, self.ctx.cache_max_size_mb)
                .await;
        }

        match action {
            Action::Get => {
                let address = Address::build(store_type, scope, key, self.ctx)?;
                self.store
                    .download(&address, store_type.is_archived())
                    .await
            }
            Action::Set => {
                let address = Address::build(store_type, scope, key, self.ctx)?;
                self.store.upload(&address, store_type.is_archived()).await
            }
            Action::Remove if store_type == StoreType::Cache => {
                self.remove_cache_entry(scope, key).await
            }
            Action::Remove => {
                let address = Address::build(store_type, scope, key, self.ctx)?;
                self.store.remove(&address).await
            }
        }
    }

    pub async fn get(&self, store_type: StoreType, scope: Scope, key: &str) -> Result<(), StoreError> {
        self.execute(Action::Get, store_type, scope, key).await
    }

    pub async fn set(&self, store_type: StoreType, scope: Scope, key: &str) -> Result<(), StoreError> {
        self.execute(Action::Set, store_type, scope, key).await
    }

    pub async fn remove(
        &self,
        store_type: StoreType,
        scope: Scope,
        key: &str,
    ) -> Result<(), StoreError> {
        self.execute(Action::Remove, store_type, scope, key).await
    }

    /// A cache entry is an archive plus its md5 manifest, removed manifest
    /// first. The archive is left alone if removing the manifest fails.
    async fn remove_cache_entry(&self, scope: Scope, key: &str) -> Result<(), StoreError> {
        let entry = Address::build(StoreType::Cache, scope, key, self.ctx)?;

        for suffix in ["_md5.json", ".zip"] {
            let address = entry.with_suffix(suffix, self.ctx)?;
            self.store
                .remove(&address)
                .await
                .map_err(|error| StoreError::remove(&address, error))?;
        }

        tracing::info!(key = %entry.key, %scope, "removed cache");
        Ok(())
    }
}
