use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::{
    context::ExecutionContext,
    key::CanonicalKey,
    models::{Scope, StoreType},
    store::StoreError,
};

/// Characters escaped when a key is embedded as a single path segment.
///
/// Everything but the unreserved characters and the sub-delimiters the
/// store accepts in a segment (`$&+:=@`) is escaped, including `/`.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@');

/// A fully-qualified location in the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub store_type: StoreType,
    pub scope: Scope,
    pub key: CanonicalKey,
    pub url: url::Url,
}

impl Address {
    pub fn build(
        store_type: StoreType,
        scope: Scope,
        key: &str,
        ctx: &ExecutionContext,
    ) -> Result<Self, StoreError> {
        let key = CanonicalKey::normalize(store_type, key, ctx);
        Self::from_canonical(store_type, scope, key, ctx)
    }

    pub fn from_canonical(
        store_type: StoreType,
        scope: Scope,
        key: CanonicalKey,
        ctx: &ExecutionContext,
    ) -> Result<Self, StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidParameters(format!(
                "{store_type} key is empty after normalization"
            )));
        }

        let path = match store_type {
            StoreType::Cache => {
                if !scope.is_cache_scope() {
                    return Err(StoreError::InvalidParameters(format!(
                        "cache requires an event, job or pipeline scope, got {:?}",
                        scope.as_str()
                    )));
                }
                let scope_id = resolve_scope(scope, ctx);
                let encoded = encode_segment(key.as_str());
                format!("caches/{scope}s/{scope_id}/{encoded}")
            }
            StoreType::Artifact => {
                let encoded = encode_segment(key.as_str());
                format!("builds/{}/ARTIFACTS/{encoded}", ctx.build_id)
            }
            StoreType::Log => format!("builds/{}-{key}", ctx.build_id),
        };

        let address = format!("{}{path}", ctx.store_base_url);
        let url = url::Url::parse(&address)
            .map_err(|source| StoreError::MalformedAddress { address, source })?;

        Ok(Self {
            store_type,
            scope,
            key,
            url,
        })
    }

    /// The address of a sibling entry whose key is this key plus `suffix`.
    pub fn with_suffix(&self, suffix: &str, ctx: &ExecutionContext) -> Result<Self, StoreError> {
        Self::from_canonical(self.store_type, self.scope, self.key.with_suffix(suffix), ctx)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Map a scope to the id of the current build's event, job or pipeline.
///
/// Pull request jobs resolve the job scope to their parent job so they read
/// the cache the parent job wrote.
pub fn resolve_scope<'a>(scope: Scope, ctx: &'a ExecutionContext) -> &'a str {
    match scope {
        Scope::Event => &ctx.event_id,
        Scope::Job => {
            if ctx.is_pull_request() && !ctx.pr_parent_job_id.is_empty() {
                &ctx.pr_parent_job_id
            } else {
                &ctx.job_id
            }
        }
        Scope::Pipeline => &ctx.pipeline_id,
        Scope::Build | Scope::Unscoped => "",
    }
}

fn encode_segment(key: &str) -> String {
    utf8_percent_encode(key, PATH_SEGMENT).to_string()
}
