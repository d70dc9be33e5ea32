//! Search engine boundary and its tantivy implementation.

use std::sync::Arc;

use serde::Serialize;
use tantivy::collector::{Count, TopDocs};
use tantivy::schema::Value;
use tantivy::{DocAddress, IndexReader, Order, Searcher, TantivyDocument};
use tracing::debug;

use crate::error::{BrowseError, Result};
use crate::model::{EntityId, SortDirection};
use crate::search::cursor::HitCursor;
use crate::search::query::{RepositoryQuery, SortSpec};
use crate::search::tantivy::Fields;

/// Lazy sequence of every hit for a query. Finite and not restartable.
pub type HitStream = Box<dyn Iterator<Item = Result<SearchHit>> + Send>;

/// Value a page was ordered by.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SortValue {
    Score(f32),
    Int(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: EntityId,
    pub sort_value: Option<SortValue>,
}

/// One bounded window of hits. `total` is the engine's match count for
/// the whole query, not the size of `hits`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPage {
    pub total: u64,
    pub hits: Vec<SearchHit>,
}

pub trait SearchEngine: Send + Sync {
    /// Every hit, produced lazily; the engine pages internally.
    fn browse(&self, query: &RepositoryQuery) -> Result<HitStream>;

    /// Hits `start..start + limit` in `sort` order, plus the total count.
    fn search(
        &self,
        query: &RepositoryQuery,
        sort: SortSpec,
        start: usize,
        limit: usize,
    ) -> Result<SearchPage>;
}

impl<E: SearchEngine + ?Sized> SearchEngine for Arc<E> {
    fn browse(&self, query: &RepositoryQuery) -> Result<HitStream> {
        (**self).browse(query)
    }

    fn search(
        &self,
        query: &RepositoryQuery,
        sort: SortSpec,
        start: usize,
        limit: usize,
    ) -> Result<SearchPage> {
        (**self).search(query, sort, start, limit)
    }
}

pub struct TantivySearchEngine {
    reader: IndexReader,
    fields: Fields,
}

impl TantivySearchEngine {
    pub fn new(reader: IndexReader, fields: Fields) -> Self {
        Self { reader, fields }
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Picks up segments committed since the reader was opened.
    pub fn refresh(&self) -> Result<()> {
        self.reader.reload()?;
        Ok(())
    }
}

fn order(direction: SortDirection) -> Order {
    match direction {
        SortDirection::Asc => Order::Asc,
        SortDirection::Desc => Order::Desc,
    }
}

impl SearchEngine for TantivySearchEngine {
    fn browse(&self, query: &RepositoryQuery) -> Result<HitStream> {
        let searcher = self.reader.searcher();
        debug!(
            repository = query.repository(),
            segments = searcher.segment_readers().len(),
            "browse_start"
        );
        let scoped = query.scoped(&self.fields);
        let cursor = HitCursor::open(searcher, &scoped, self.fields, query.repository())?;
        Ok(Box::new(cursor))
    }

    fn search(
        &self,
        query: &RepositoryQuery,
        sort: SortSpec,
        start: usize,
        limit: usize,
    ) -> Result<SearchPage> {
        let searcher = self.reader.searcher();
        let scoped = query.scoped(&self.fields);
        debug!(
            repository = query.repository(),
            sort = ?sort,
            start = start,
            limit = limit,
            "search_start"
        );

        let top = TopDocs::with_limit(limit).and_offset(start);
        let (total, ranked): (usize, Vec<(SortValue, DocAddress)>) = match sort.field.column() {
            None => {
                let (count, docs) = searcher.search(&scoped, &(Count, top))?;
                let docs = docs
                    .into_iter()
                    .map(|(score, addr)| (SortValue::Score(score), addr))
                    .collect();
                (count, docs)
            }
            Some(column) if sort.field.is_numeric() => {
                let collector = top.order_by_fast_field::<i64>(column, order(sort.direction));
                let (count, docs) = searcher.search(&scoped, &(Count, collector))?;
                let docs = docs
                    .into_iter()
                    .map(|(value, addr)| (SortValue::Int(value), addr))
                    .collect();
                (count, docs)
            }
            Some(column) => {
                let collector = top.order_by_string_fast_field(column, order(sort.direction));
                let (count, docs) = searcher.search(&scoped, &(Count, collector))?;
                let docs = docs
                    .into_iter()
                    .map(|(value, addr)| (SortValue::Text(value), addr))
                    .collect();
                (count, docs)
            }
        };

        let mut hits = Vec::with_capacity(ranked.len());
        for (sort_value, addr) in ranked {
            hits.push(SearchHit {
                id: hit_id(&searcher, &self.fields, addr)?,
                sort_value: Some(sort_value),
            });
        }
        Ok(SearchPage {
            total: total as u64,
            hits,
        })
    }
}

pub(crate) fn hit_id(searcher: &Searcher, fields: &Fields, addr: DocAddress) -> Result<EntityId> {
    let doc: TantivyDocument = searcher.doc(addr)?;
    doc.get_first(fields.id)
        .and_then(|v| v.as_str())
        .map(EntityId::new)
        .ok_or(BrowseError::MissingHitId)
}
