//! Finds components for cleanup using the component search index.
//!
//! [`CleanupComponentBrowse`] turns a [`CleanupPolicy`] into a repository
//! scoped query and runs it in one of two modes:
//!
//! - [`browse`](CleanupComponentBrowse::browse) walks every match lazily and
//!   yields component ids, for background sweeps.
//! - [`browse_by_page`](CleanupComponentBrowse::browse_by_page) fetches one
//!   sorted, optionally filtered window and resolves each hit against the
//!   store inside the caller's transaction, for interactive preview.
//!
//! Every engine call is timed into a per `(policy, repository)` timer, on
//! the error path as well.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{Level, debug, enabled, trace};

use crate::config::{BrowseConfig, DEFAULT_MAX_RESULT_WINDOW};
use crate::criteria::AppenderRegistry;
use crate::error::{BrowseError, Result};
use crate::metrics::{MetricRegistry, TimerCache};
use crate::model::{CleanupPolicy, Component, EntityId, PagedResponse, QueryOptions, Repository};
use crate::search::engine::{HitStream, SearchEngine, SearchPage, TantivySearchEngine};
use crate::search::query::{PolicyQuery, QueryBuilder, RepositoryQuery, SortSpec};
use crate::search::tantivy::ComponentIndex;
use crate::storage::{ComponentLookup, ComponentStore};

pub struct CleanupComponentBrowse<E> {
    queries: QueryBuilder,
    engine: E,
    timers: TimerCache,
    max_result_window: u64,
}

impl<E: SearchEngine> CleanupComponentBrowse<E> {
    pub fn new(queries: QueryBuilder, engine: E, metrics: Arc<MetricRegistry>) -> Self {
        Self {
            queries,
            engine,
            timers: TimerCache::new(metrics, component_name::<Self>()),
            max_result_window: DEFAULT_MAX_RESULT_WINDOW,
        }
    }

    pub fn with_max_result_window(mut self, max_result_window: u64) -> Self {
        self.max_result_window = max_result_window;
        self
    }

    pub fn appenders(&self) -> &AppenderRegistry {
        self.queries.appenders()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn timers(&self) -> &TimerCache {
        &self.timers
    }

    /// Rejects a policy whose criteria cannot be translated.
    pub fn validate(&self, policy: &CleanupPolicy) -> Result<()> {
        self.appenders().validate(policy)
    }

    /// Ids of every component in `repository` matching `policy`.
    ///
    /// A policy without criteria matches nothing and never reaches the
    /// engine. The returned sequence holds the engine cursor until it is
    /// exhausted or dropped.
    pub fn browse(&self, policy: &CleanupPolicy, repository: &Repository) -> Result<ComponentIds> {
        if policy.criteria.is_empty() {
            return Ok(ComponentIds::empty());
        }

        let query = self.queries.build_policy_query(policy)?;

        debug!(
            policy = %policy.name,
            repository = %repository.name,
            "Searching for components to cleanup"
        );

        let hits = self.invoke_search(policy, repository, query)?;
        Ok(ComponentIds::new(hits))
    }

    fn invoke_search(
        &self,
        policy: &CleanupPolicy,
        repository: &Repository,
        query: PolicyQuery,
    ) -> Result<HitStream> {
        let _latency = LatencyGuard::start(self, policy, repository);
        self.engine
            .browse(&RepositoryQuery::unrestricted(query, &repository.name))
    }

    /// One page of components matching `policy`, resolved through `tx`.
    ///
    /// Hits whose component no longer exists in the store are dropped, so
    /// the page may be shorter than `limit`; `total` stays as reported by
    /// the engine.
    pub fn browse_by_page<L: ComponentLookup + ?Sized>(
        &self,
        tx: &L,
        policy: &CleanupPolicy,
        repository: &Repository,
        options: &QueryOptions,
    ) -> Result<PagedResponse<Component>> {
        let start = options.start.ok_or(BrowseError::MissingOption("start"))?;
        let limit = options.limit.ok_or(BrowseError::MissingOption("limit"))?;
        if limit == 0 {
            return Err(BrowseError::InvalidLimit(limit));
        }
        if start.saturating_add(limit) > self.max_result_window {
            return Err(BrowseError::WindowTooLarge {
                start,
                limit,
                max: self.max_result_window,
            });
        }
        let sort = SortSpec::from_options(options)?;

        let query = self.queries.build_paged_query(policy, options)?;

        debug!(
            policy = %policy.name,
            repository = %repository.name,
            start = start,
            limit = limit,
            "Searching for components to cleanup"
        );

        let page = self.invoke_search_by_page(
            policy,
            repository,
            query,
            sort,
            start as usize,
            limit as usize,
        )?;

        let mut components = Vec::with_capacity(page.hits.len());
        for hit in &page.hits {
            match tx.find_component(&hit.id)? {
                Some(component) => components.push(component),
                None => trace!(id = %hit.id, "skipping hit missing from store"),
            }
        }

        Ok(PagedResponse::new(page.total, components))
    }

    fn invoke_search_by_page(
        &self,
        policy: &CleanupPolicy,
        repository: &Repository,
        query: PolicyQuery,
        sort: SortSpec,
        start: usize,
        limit: usize,
    ) -> Result<SearchPage> {
        let _latency = LatencyGuard::start(self, policy, repository);
        self.engine.search(
            &RepositoryQuery::unrestricted(query, &repository.name),
            sort,
            start,
            limit,
        )
    }
}

/// Index, store and browse service opened from one [`BrowseConfig`].
pub struct BrowseBackend {
    pub index: ComponentIndex,
    pub store: ComponentStore,
    pub browse: CleanupComponentBrowse<TantivySearchEngine>,
}

impl BrowseBackend {
    pub fn open(config: &BrowseConfig, metrics: Arc<MetricRegistry>) -> anyhow::Result<Self> {
        let index = ComponentIndex::open_or_create(&config.index_dir, config.writer_heap_bytes)?;
        let store = ComponentStore::open(&config.db_path)?;
        let queries = QueryBuilder::new(AppenderRegistry::standard(), index.fields);
        let browse = CleanupComponentBrowse::new(queries, index.engine()?, metrics)
            .with_max_result_window(config.max_result_window);
        Ok(Self {
            index,
            store,
            browse,
        })
    }
}

/// Records elapsed time into the policy/repository timer when dropped, so
/// the update also happens when the engine call fails or unwinds.
struct LatencyGuard<'a> {
    timers: &'a TimerCache,
    policy: &'a CleanupPolicy,
    repository: &'a Repository,
    start: Instant,
}

impl<'a> LatencyGuard<'a> {
    fn start<E>(
        browse: &'a CleanupComponentBrowse<E>,
        policy: &'a CleanupPolicy,
        repository: &'a Repository,
    ) -> Self {
        Self {
            timers: &browse.timers,
            policy,
            repository,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyGuard<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        self.timers
            .get_or_create(&self.policy.name, &self.repository.name)
            .update(elapsed);

        if enabled!(Level::TRACE) {
            trace!(
                "Cleanup policy {} search on {} has criteria {:?} and took {}ns",
                self.policy.name,
                self.repository.name,
                self.policy.criteria,
                elapsed.as_nanos()
            );
        }
    }
}

/// Type path of `T` without generic arguments.
fn component_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.split('<').next().unwrap_or(full)
}

/// Lazily produced ids of the components a sweep should consider.
pub struct ComponentIds {
    hits: Option<HitStream>,
}

impl ComponentIds {
    /// An already terminated sequence.
    pub fn empty() -> Self {
        Self { hits: None }
    }

    fn new(hits: HitStream) -> Self {
        Self { hits: Some(hits) }
    }
}

impl Iterator for ComponentIds {
    type Item = Result<EntityId>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.hits.as_mut()?.next();
        if next.is_none() {
            // Release the engine cursor as soon as it runs dry.
            self.hits = None;
        }
        next.map(|hit| hit.map(|h| h.id))
    }
}

impl fmt::Debug for ComponentIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentIds")
            .field("open", &self.hits.is_some())
            .finish()
    }
}
