use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use cleanup_browse::criteria::AppenderRegistry;
use cleanup_browse::error::{BrowseError, Result};
use cleanup_browse::metrics::MetricRegistry;
use cleanup_browse::model::{Component, EntityId};
use cleanup_browse::search::engine::{HitStream, SearchEngine, SearchPage, TantivySearchEngine};
use cleanup_browse::search::query::{QueryBuilder, RepositoryQuery, SortSpec};
use cleanup_browse::search::tantivy::ComponentIndex;
use cleanup_browse::storage::ComponentStore;
use cleanup_browse::CleanupComponentBrowse;

/// Fixed "now" for age-based criteria.
#[allow(dead_code)]
pub const NOW: i64 = 1_700_000_000_000;
#[allow(dead_code)]
pub const DAY: i64 = 24 * 60 * 60 * 1000;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::TRACE)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Deterministic component generator for tests.
#[derive(Debug, Clone)]
pub struct ComponentFixtureBuilder {
    component: Component,
}

#[allow(dead_code)]
impl ComponentFixtureBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            component: Component {
                id: EntityId::new(id),
                repository: "maven-releases".into(),
                group: Some("com.acme".into()),
                name: format!("artifact-{id}"),
                version: "1.0.0".into(),
                format: "maven2".into(),
                last_blob_updated: Some(NOW - DAY),
                last_downloaded: None,
                prerelease: false,
            },
        }
    }

    pub fn repository(mut self, repository: &str) -> Self {
        self.component.repository = repository.into();
        self
    }

    pub fn group(mut self, group: &str) -> Self {
        self.component.group = Some(group.into());
        self
    }

    pub fn no_group(mut self) -> Self {
        self.component.group = None;
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.component.name = name.into();
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.component.version = version.into();
        self
    }

    pub fn format(mut self, format: &str) -> Self {
        self.component.format = format.into();
        self
    }

    pub fn blob_updated_days_ago(mut self, days: i64) -> Self {
        self.component.last_blob_updated = Some(NOW - days * DAY);
        self
    }

    pub fn downloaded_days_ago(mut self, days: i64) -> Self {
        self.component.last_downloaded = Some(NOW - days * DAY);
        self
    }

    pub fn prerelease(mut self) -> Self {
        self.component.prerelease = true;
        self
    }

    pub fn build(self) -> Component {
        self.component
    }
}

/// Engine wrapper that counts calls, records sort requests, and can be
/// told to fail.
pub struct CountingEngine {
    inner: TantivySearchEngine,
    pub browse_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    fail: AtomicBool,
    sorts: std::sync::Mutex<Vec<SortSpec>>,
}

#[allow(dead_code)]
impl CountingEngine {
    pub fn new(inner: TantivySearchEngine) -> Self {
        Self {
            inner,
            browse_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            sorts: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn fail_next_calls(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.browse_calls.load(Ordering::SeqCst) + self.search_calls.load(Ordering::SeqCst)
    }

    pub fn sorts(&self) -> Vec<SortSpec> {
        self.sorts.lock().unwrap().clone()
    }

    fn simulated_failure(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BrowseError::Search(tantivy::TantivyError::InternalError(
                "simulated engine failure".into(),
            )));
        }
        Ok(())
    }
}

impl SearchEngine for CountingEngine {
    fn browse(&self, query: &RepositoryQuery) -> Result<HitStream> {
        self.browse_calls.fetch_add(1, Ordering::SeqCst);
        self.simulated_failure()?;
        self.inner.browse(query)
    }

    fn search(
        &self,
        query: &RepositoryQuery,
        sort: SortSpec,
        start: usize,
        limit: usize,
    ) -> Result<SearchPage> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.sorts.lock().unwrap().push(sort);
        self.simulated_failure()?;
        self.inner.search(query, sort, start, limit)
    }
}

/// Index and store seeded side by side.
pub struct Fixture {
    pub index: ComponentIndex,
    pub store: ComponentStore,
}

pub type TestBrowse = CleanupComponentBrowse<Arc<CountingEngine>>;

#[allow(dead_code)]
impl Fixture {
    pub fn new() -> Self {
        Self {
            index: ComponentIndex::in_ram().expect("in-ram index"),
            store: ComponentStore::open_in_memory().expect("in-memory store"),
        }
    }

    pub fn add(&mut self, component: Component) -> &mut Self {
        self.index.add_component(&component).expect("index component");
        self.store
            .insert_component(&component)
            .expect("store component");
        self
    }

    /// Indexed but absent from the store, as after a missed index update.
    pub fn add_stale(&mut self, component: Component) -> &mut Self {
        self.index.add_component(&component).expect("index component");
        self
    }

    pub fn commit(&mut self) -> &mut Self {
        self.index.commit().expect("commit index");
        self
    }

    pub fn service(&self) -> (TestBrowse, Arc<CountingEngine>, Arc<MetricRegistry>) {
        let engine = Arc::new(CountingEngine::new(self.index.engine().expect("engine")));
        let metrics = Arc::new(MetricRegistry::new());
        let queries = QueryBuilder::with_clock(
            AppenderRegistry::standard(),
            self.index.fields,
            Arc::new(|| NOW),
        );
        let browse = CleanupComponentBrowse::new(queries, Arc::clone(&engine), Arc::clone(&metrics));
        (browse, engine, metrics)
    }
}
