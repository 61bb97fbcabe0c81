use std::path::{Path, PathBuf};

use crate::{
    archive::{self, Manifest},
    context::ExecutionContext,
    key::CanonicalKey,
    models::{Action, Scope, StoreType},
    store::StoreError,
};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Cache entries kept on a local disk instead of the remote store.
///
/// Each scope has its own root directory. An entry for the key `/tmp/x`
/// lives at `{root}/tmp/x.zip` next to its manifest `{root}/tmp/x_md5.json`.
pub struct DiskCache<'a> {
    ctx: &'a ExecutionContext,
}

impl<'a> DiskCache<'a> {
    pub fn new(ctx: &'a ExecutionContext) -> Self {
        Self { ctx }
    }

    pub async fn execute(
        &self,
        action: Action,
        scope: Scope,
        key: &str,
        max_size_mb: u64,
    ) -> Result<(), StoreError> {
        let key = CanonicalKey::normalize(StoreType::Cache, key, self.ctx);
        let entry = self.entry(scope, &key)?;
        let source = key.local_path(self.ctx);

        tokio::task::spawn_blocking(move || match action {
            Action::Get => entry.restore(&source),
            Action::Set => entry.store(&source, max_size_mb),
            Action::Remove => entry.remove(),
        })
        .await
        .map_err(std::io::Error::other)?
    }

    fn entry(&self, scope: Scope, key: &CanonicalKey) -> Result<DiskEntry, StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidParameters(
                "cache key is empty after normalization".to_string(),
            ));
        }

        let root = match scope {
            Scope::Event => self.ctx.cache_dirs.event.as_ref(),
            Scope::Job => self.ctx.cache_dirs.job.as_ref(),
            Scope::Pipeline => self.ctx.cache_dirs.pipeline.as_ref(),
            Scope::Build | Scope::Unscoped => {
                return Err(StoreError::InvalidParameters(format!(
                    "disk cache requires an event, job or pipeline scope, got {:?}",
                    scope.as_str()
                )));
            }
        };
        let root = root.ok_or_else(|| {
            StoreError::InvalidParameters(format!("no disk cache directory for {scope} scope"))
        })?;

        let relative = key.as_str().trim_start_matches('/');
        Ok(DiskEntry {
            zip: root.join(format!("{relative}.zip")),
            manifest: root.join(format!("{relative}_md5.json")),
        })
    }
}

#[derive(Debug)]
struct DiskEntry {
    zip: PathBuf,
    manifest: PathBuf,
}

impl DiskEntry {
    fn restore(&self, destination: &Path) -> Result<(), StoreError> {
        let file = match std::fs::File::open(&self.zip) {
            Ok(file) => file,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.zip.display(), "cache not found on disk");
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        };

        archive::extract(std::io::BufReader::new(file), destination)?;

        tracing::info!(path = %self.zip.display(), "restored cache from disk");
        Ok(())
    }

    fn store(&self, source: &Path, max_size_mb: u64) -> Result<(), StoreError> {
        let size = archive::total_size(source)?;
        if max_size_mb > 0 && size > max_size_mb.saturating_mul(BYTES_PER_MB) {
            tracing::warn!(
                path = %source.display(),
                size,
                max_size_mb,
                "cache exceeds the maximum size, skipping"
            );
            return Ok(());
        }

        let manifest = Manifest::for_path(source)?;
        if manifest.is_empty() {
            tracing::warn!(path = %source.display(), "cache contains no files");
        }
        if self.stored_manifest()?.as_ref() == Some(&manifest) {
            tracing::info!(path = %source.display(), "cache unchanged, skipping");
            return Ok(());
        }

        let parent = self.zip.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent)?;

        let id = uuid::Uuid::new_v4();
        let temp_path = parent.join(format!(".cache-file-{id}"));
        let result = std::fs::File::create_new(&temp_path)
            .map_err(StoreError::from)
            .and_then(|file| {
                let file = archive::compress(source, std::io::BufWriter::new(file))?;
                file.into_inner().map_err(|error| error.into_error())?;
                Ok(())
            })
            .and_then(|()| Ok(std::fs::rename(&temp_path, &self.zip)?));
        if let Err(error) = result {
            let _ = std::fs::remove_file(&temp_path);
            return Err(error);
        }

        std::fs::write(&self.manifest, manifest.to_json()?)?;

        tracing::info!(
            path = %self.zip.display(),
            size,
            files = manifest.len(),
            "stored cache on disk"
        );
        Ok(())
    }

    fn remove(&self) -> Result<(), StoreError> {
        for path in [&self.manifest, &self.zip] {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => return Err(StoreError::remove(path.display(), error.into())),
            }
        }

        tracing::info!(path = %self.zip.display(), "removed cache from disk");
        Ok(())
    }

    fn stored_manifest(&self) -> Result<Option<Manifest>, StoreError> {
        let json = match std::fs::read(&self.manifest) {
            Ok(json) => json,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        match Manifest::from_json(&json) {
            Ok(manifest) => Ok(Some(manifest)),
            Err(error) => {
                tracing::warn!(path = %self.manifest.display(), %error, "ignoring invalid cache manifest");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CacheDirs;

    struct Fixture {
        workspace: tempfile::TempDir,
        cache_root: tempfile::TempDir,
        ctx: ExecutionContext,
    }

    fn fixture() -> Fixture {
        let workspace = tempfile::TempDir::new().unwrap();
        let cache_root = tempfile::TempDir::new().unwrap();
        let ctx = ExecutionContext {
            working_dir: workspace.path().to_path_buf(),
            cache_dirs: CacheDirs {
                event: Some(cache_root.path().join("event")),
                job: None,
                pipeline: Some(cache_root.path().join("pipeline")),
            },
            ..Default::default()
        };

        Fixture {
            workspace,
            cache_root,
            ctx,
        }
    }

    #[tokio::test]
    async fn test_set_get_remove() {
        let fixture = fixture();
        let cache = DiskCache::new(&fixture.ctx);
        let source = fixture.workspace.path().join("mycache");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("a.txt"), "alpha").unwrap();

        cache
            .execute(Action::Set, Scope::Event, "mycache", 0)
            .await
            .unwrap();
        let zip = fixture.cache_root.path().join("event/mycache.zip");
        let manifest = fixture.cache_root.path().join("event/mycache_md5.json");
        assert!(zip.is_file());
        assert!(manifest.is_file());

        std::fs::remove_dir_all(&source).unwrap();
        cache
            .execute(Action::Get, Scope::Event, "./mycache/", 0)
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(source.join("a.txt")).unwrap(), "alpha");

        cache
            .execute(Action::Remove, Scope::Event, "mycache", 0)
            .await
            .unwrap();
        assert!(!zip.exists());
        assert!(!manifest.exists());
    }

    #[tokio::test]
    async fn test_absolute_key_is_stored_under_root() {
        let fixture = fixture();
        let cache = DiskCache::new(&fixture.ctx);
        let source = fixture.workspace.path().join("deps");
        std::fs::write(&source, "lock").unwrap();

        let key = source.to_string_lossy().into_owned();
        cache
            .execute(Action::Set, Scope::Pipeline, &key, 0)
            .await
            .unwrap();

        let relative = key.trim_start_matches('/');
        assert!(
            fixture
                .cache_root
                .path()
                .join("pipeline")
                .join(format!("{relative}.zip"))
                .is_file()
        );
    }

    #[tokio::test]
    async fn test_get_missing_entry_is_a_miss() {
        let fixture = fixture();
        let cache = DiskCache::new(&fixture.ctx);

        cache
            .execute(Action::Get, Scope::Event, "mycache", 0)
            .await
            .unwrap();
        assert!(!fixture.workspace.path().join("mycache").exists());
    }

    #[tokio::test]
    async fn test_oversized_cache_is_skipped() {
        let fixture = fixture();
        let cache = DiskCache::new(&fixture.ctx);
        let source = fixture.workspace.path().join("big.bin");
        std::fs::write(&source, vec![0u8; (BYTES_PER_MB + 1) as usize]).unwrap();

        cache
            .execute(Action::Set, Scope::Event, "big.bin", 1)
            .await
            .unwrap();
        assert!(!fixture.cache_root.path().join("event/big.bin.zip").exists());

        cache
            .execute(Action::Set, Scope::Event, "big.bin", 2)
            .await
            .unwrap();
        assert!(fixture.cache_root.path().join("event/big.bin.zip").exists());
    }

    #[tokio::test]
    async fn test_set_missing_source_fails() {
        let fixture = fixture();
        let cache = DiskCache::new(&fixture.ctx);

        let result = cache.execute(Action::Set, Scope::Event, "missing", 0).await;
        assert!(matches!(result, Err(StoreError::Io(_))));
    }

    #[tokio::test]
    async fn test_scope_without_root_is_invalid() {
        let fixture = fixture();
        let cache = DiskCache::new(&fixture.ctx);

        let result = cache.execute(Action::Get, Scope::Job, "mycache", 0).await;
        assert!(matches!(result, Err(StoreError::InvalidParameters(_))));

        let result = cache.execute(Action::Get, Scope::Build, "mycache", 0).await;
        assert!(matches!(result, Err(StoreError::InvalidParameters(_))));
    }

    #[tokio::test]
    async fn test_root_key_is_invalid() {
        let fixture = fixture();
        let cache = DiskCache::new(&fixture.ctx);
        std::fs::write(fixture.workspace.path().join("a.txt"), "alpha").unwrap();

        let result = cache.execute(Action::Set, Scope::Event, "/", 0).await;
        assert!(matches!(result, Err(StoreError::InvalidParameters(_))));
        assert!(!fixture.cache_root.path().join("event").exists());
    }

    #[tokio::test]
    async fn test_empty_directory_is_stored() {
        let fixture = fixture();
        let cache = DiskCache::new(&fixture.ctx);
        std::fs::create_dir_all(fixture.workspace.path().join("empty")).unwrap();

        cache
            .execute(Action::Set, Scope::Event, "empty", 0)
            .await
            .unwrap();
        let manifest = fixture.cache_root.path().join("event/empty_md5.json");
        assert_eq!(std::fs::read_to_string(manifest).unwrap(), "{}");
    }
}
