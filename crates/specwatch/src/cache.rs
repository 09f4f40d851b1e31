//! Operation cache: the provider → api-version → verb index over contract
//! operations.
//!
//! Built once from a set of resolved contract documents, then treated as
//! immutable; queries never mutate shared state, so a built cache can be read
//! from any number of threads without locking. Rebuilds publish a whole new
//! cache through [`SharedCache`] so in-flight validations keep a consistent
//! view.

use crate::operation::{ContractDocument, HttpVerb, Operation, ResponseSpec, DEFAULT_RESPONSE};
use crate::schema::{DefaultChecker, Schema, StructuralChecker};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Sentinel bucket for operations whose path template carries no
/// recognizable provider segment.
pub const UNKNOWN_PROVIDER: &str = "unknown-provider";

/// Sentinel bucket for operations from contracts with no declared version.
pub const UNKNOWN_API_VERSION: &str = "unknown-api-version";

/// Cache construction options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Whether literal template segments match case-sensitively. The provider
    /// namespace segment is always compared case-insensitively regardless.
    pub is_path_case_sensitive: bool,

    /// When set, operations lacking an explicit `default` response receive a
    /// synthesized one (empty schema) so undeclared error-range status codes
    /// are accepted. When unset, such codes are reported as non-conformant.
    pub implicit_default_response: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        CacheOptions {
            is_path_case_sensitive: false,
            implicit_default_response: false,
        }
    }
}

/// Failure to resolve one contract document. Collected per document; fatal
/// only when no document loads at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    /// Document identifier (file path, URL, ...).
    pub source: String,
    pub reason: String,
}

impl DocumentFailure {
    pub fn new(source: impl Into<String>, reason: impl Into<String>) -> Self {
        DocumentFailure {
            source: source.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DocumentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.reason)
    }
}

/// Fatal cache-build failures.
#[derive(Debug, Error)]
pub enum CacheBuildError {
    /// Every supplied document failed to load (or none were supplied).
    #[error("no contract documents could be loaded")]
    NoDocumentsLoaded,
}

/// Outcome of a cache build: the cache plus per-document failures that did
/// not abort the build.
pub struct CacheBuild {
    pub cache: OperationCache,
    pub failures: Vec<DocumentFailure>,
}

/// Staged lookup outcome, mirroring the matcher's failure taxonomy.
#[derive(Debug)]
pub enum CacheLookup<'a> {
    ProviderMiss,
    ApiVersionMiss,
    VerbMiss,
    Hit(&'a [Arc<Operation>]),
}

type VerbBuckets = HashMap<HttpVerb, Vec<Arc<Operation>>>;
type VersionBuckets = HashMap<String, VerbBuckets>;

/// Immutable three-level operation index.
pub struct OperationCache {
    providers: HashMap<String, VersionBuckets>,
    options: CacheOptions,
    checker: Arc<dyn StructuralChecker>,
}

impl OperationCache {
    /// Build a cache from resolver output: one `Result` per document, so a
    /// single malformed or unreachable document degrades to a collected
    /// failure instead of aborting the whole build.
    pub fn build(
        sources: impl IntoIterator<Item = Result<ContractDocument, DocumentFailure>>,
        options: CacheOptions,
    ) -> Result<CacheBuild, CacheBuildError> {
        let mut providers: HashMap<String, VersionBuckets> = HashMap::new();
        let mut failures = Vec::new();
        let mut loaded = 0usize;

        for source in sources {
            let document = match source {
                Ok(document) => document,
                Err(failure) => {
                    warn!(source = %failure.source, reason = %failure.reason, "contract document failed to resolve");
                    failures.push(failure);
                    continue;
                }
            };

            loaded += 1;
            let version = match document.api_version.as_deref() {
                Some(v) if !v.is_empty() => v.to_string(),
                _ => UNKNOWN_API_VERSION.to_string(),
            };

            debug!(
                source = document.source_name(),
                api_version = %version,
                operations = document.operations.len(),
                "indexing contract document"
            );

            for mut operation in document.operations {
                let provider = operation
                    .path_template
                    .provider_namespace()
                    .unwrap_or_else(|| UNKNOWN_PROVIDER.to_string());

                if options.implicit_default_response
                    && !operation.responses.contains_key(DEFAULT_RESPONSE)
                {
                    operation.responses.insert(
                        DEFAULT_RESPONSE.to_string(),
                        ResponseSpec {
                            schema: Some(Schema::default()),
                            headers: Default::default(),
                        },
                    );
                }

                providers
                    .entry(provider)
                    .or_default()
                    .entry(version.clone())
                    .or_default()
                    .entry(operation.http_verb)
                    .or_default()
                    .push(Arc::new(operation));
            }
        }

        if loaded == 0 {
            return Err(CacheBuildError::NoDocumentsLoaded);
        }

        let cache = OperationCache {
            providers,
            options,
            checker: Arc::new(DefaultChecker),
        };
        debug!(stats = ?cache.stats(), failures = failures.len(), "operation cache built");
        Ok(CacheBuild { cache, failures })
    }

    /// Convenience build from already-resolved documents.
    pub fn from_documents(
        documents: impl IntoIterator<Item = ContractDocument>,
        options: CacheOptions,
    ) -> Result<CacheBuild, CacheBuildError> {
        Self::build(documents.into_iter().map(Ok), options)
    }

    /// Swap in a different structural checker (the external schema validator).
    pub fn with_checker(mut self, checker: Arc<dyn StructuralChecker>) -> Self {
        self.checker = checker;
        self
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    pub fn checker(&self) -> &dyn StructuralChecker {
        self.checker.as_ref()
    }

    /// Staged lookup reporting which level missed. Provider keys are
    /// lower-cased at build time; the caller passes a lower-cased namespace.
    /// A `None` verb (one no contract operation can declare) is a verb-stage
    /// miss, reported only after the provider and api-version stages hit.
    pub fn lookup(
        &self,
        provider: &str,
        api_version: &str,
        verb: Option<HttpVerb>,
    ) -> CacheLookup<'_> {
        let Some(versions) = self.providers.get(provider) else {
            return CacheLookup::ProviderMiss;
        };
        let Some(verbs) = versions.get(api_version) else {
            return CacheLookup::ApiVersionMiss;
        };
        match verb.and_then(|verb| verbs.get(&verb)) {
            // Buckets are never created empty, but guard anyway.
            Some(operations) if !operations.is_empty() => CacheLookup::Hit(operations),
            _ => CacheLookup::VerbMiss,
        }
    }

    /// Total number of indexed operations.
    pub fn len(&self) -> usize {
        self.providers
            .values()
            .flat_map(|versions| versions.values())
            .flat_map(|verbs| verbs.values())
            .map(|ops| ops.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build-time observability counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            providers: self.providers.len(),
            api_versions: self.providers.values().map(|v| v.len()).sum(),
            operations: self.len(),
        }
    }

    /// Sorted operation ids for one (provider, apiVersion, verb) bucket.
    /// Intended for diagnostics and idempotence checks.
    pub fn bucket_operation_ids(
        &self,
        provider: &str,
        api_version: &str,
        verb: HttpVerb,
    ) -> Vec<String> {
        match self.lookup(provider, api_version, Some(verb)) {
            CacheLookup::Hit(operations) => {
                let mut ids: Vec<String> = operations
                    .iter()
                    .map(|op| op.operation_id.clone())
                    .collect();
                ids.sort();
                ids
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for OperationCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationCache")
            .field("stats", &self.stats())
            .field("options", &self.options)
            .finish()
    }
}

/// Cache index counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub providers: usize,
    pub api_versions: usize,
    pub operations: usize,
}

/// Atomically swappable cache handle for rebuild scenarios.
///
/// `load` hands out an `Arc` snapshot; `replace` publishes a freshly built
/// cache wholesale, so validations already holding the old snapshot complete
/// against a consistent view.
pub struct SharedCache {
    inner: RwLock<Arc<OperationCache>>,
}

impl SharedCache {
    pub fn new(cache: OperationCache) -> Self {
        SharedCache {
            inner: RwLock::new(Arc::new(cache)),
        }
    }

    /// Snapshot of the currently published cache.
    pub fn load(&self) -> Arc<OperationCache> {
        Arc::clone(&self.inner.read())
    }

    /// Publish a rebuilt cache, returning the previous one.
    pub fn replace(&self, cache: OperationCache) -> Arc<OperationCache> {
        let mut guard = self.inner.write();
        std::mem::replace(&mut *guard, Arc::new(cache))
    }
}
