use std::path::PathBuf;

use crate::{config::Config, models::CacheStrategy};

/// Facts about the running build, captured once at process start.
///
/// Nothing below the entry point reads the process environment; everything
/// that depends on the build is resolved from this value instead.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub store_base_url: String,
    pub token: String,
    pub build_id: String,
    pub job_id: String,
    pub event_id: String,
    pub pipeline_id: String,
    pub pull_request_id: String,
    pub pr_parent_job_id: String,
    pub cache_strategy: CacheStrategy,
    pub cache_max_size_mb: u64,
    pub cache_dirs: CacheDirs,
    pub home_dir: Option<PathBuf>,
    pub working_dir: PathBuf,
}

/// Disk cache roots, one per cache scope.
#[derive(Debug, Clone, Default)]
pub struct CacheDirs {
    pub event: Option<PathBuf>,
    pub job: Option<PathBuf>,
    pub pipeline: Option<PathBuf>,
}

impl ExecutionContext {
    pub fn from_config(config: Config) -> std::io::Result<Self> {
        let working_dir = std::env::current_dir()?;

        Ok(Self {
            store_base_url: config.store_url,
            token: config.token,
            build_id: config.build_id,
            job_id: config.job_id,
            event_id: config.event_id,
            pipeline_id: config.pipeline_id,
            pull_request_id: config.pull_request,
            pr_parent_job_id: config.pr_parent_job_id,
            cache_strategy: CacheStrategy::from_setting(&config.cache_strategy),
            cache_max_size_mb: config.cache_max_size_mb,
            cache_dirs: CacheDirs {
                event: non_empty_path(config.event_cache_dir),
                job: non_empty_path(config.job_cache_dir),
                pipeline: non_empty_path(config.pipeline_cache_dir),
            },
            home_dir: dirs::home_dir(),
            working_dir,
        })
    }

    pub fn is_pull_request(&self) -> bool {
        !self.pull_request_id.is_empty()
    }
}

fn non_empty_path(path: String) -> Option<PathBuf> {
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}
