use std::path::{Path, PathBuf};

use store_cli::{
    context::{CacheDirs, ExecutionContext},
    models::CacheStrategy,
};

pub const TOKEN: &str = "sd-token";

pub struct TestContext {
    workspace: tempfile::TempDir,
    cache_dir: tempfile::TempDir,
}

pub fn test_context() -> TestContext {
    TestContext {
        workspace: tempfile::TempDir::new().expect("failed to create temp dir"),
        cache_dir: tempfile::TempDir::new().expect("failed to create temp dir"),
    }
}

impl TestContext {
    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    pub fn cache_dir(&self) -> &Path {
        self.cache_dir.path()
    }

    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.workspace().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }
}

/// A build context whose remote store lives under `{server_url}/v1/`.
pub fn execution_context(ctx: &TestContext, server_url: &str) -> ExecutionContext {
    ExecutionContext {
        store_base_url: format!("{server_url}/v1/"),
        token: TOKEN.to_string(),
        build_id: "10038".to_string(),
        job_id: "888".to_string(),
        event_id: "499".to_string(),
        pipeline_id: "100".to_string(),
        working_dir: ctx.workspace().to_path_buf(),
        home_dir: Some(ctx.workspace().join("home")),
        ..Default::default()
    }
}

pub fn pull_request_context(ctx: &TestContext, server_url: &str) -> ExecutionContext {
    ExecutionContext {
        pull_request_id: "123".to_string(),
        pr_parent_job_id: "987".to_string(),
        ..execution_context(ctx, server_url)
    }
}

pub fn disk_context(ctx: &TestContext, server_url: &str) -> ExecutionContext {
    ExecutionContext {
        cache_strategy: CacheStrategy::Disk,
        cache_dirs: CacheDirs {
            event: Some(ctx.cache_dir().join("event")),
            job: Some(ctx.cache_dir().join("job")),
            pipeline: Some(ctx.cache_dir().join("pipeline")),
        },
        ..execution_context(ctx, server_url)
    }
}

pub fn md5_hex(contents: &str) -> String {
    format!("{:x}", md5::compute(contents))
}

/// Mocks that fail the test if the store receives any request at all.
pub async fn expect_no_requests(server: &mut mockito::Server) -> Vec<mockito::Mock> {
    let mut mocks = Vec::new();
    for method in ["GET", "PUT", "DELETE"] {
        let mock = server
            .mock(method, mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        mocks.push(mock);
    }

    mocks
}

pub async fn assert_mocks(mocks: Vec<mockito::Mock>) {
    for mock in mocks {
        mock.assert_async().await;
    }
}
