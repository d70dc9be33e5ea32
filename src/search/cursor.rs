//! Lazy, segment-at-a-time walk over every match of a query.
//!
//! A [`HitCursor`] owns a searcher snapshot, so the segments it reads stay
//! alive for as long as the caller keeps pulling. Only one segment scorer is
//! open at a time and hits are produced on demand; nothing is collected up
//! front. Dropping the cursor, whether exhausted or abandoned midway,
//! releases the snapshot.

use tantivy::query::{EnableScoring, Query, Scorer, Weight};
use tantivy::{DocAddress, DocSet, Searcher, TERMINATED};
use tracing::debug;

use crate::error::Result;
use crate::search::engine::{SearchHit, hit_id};
use crate::search::tantivy::Fields;

pub struct HitCursor {
    searcher: Searcher,
    weight: Box<dyn Weight>,
    fields: Fields,
    repository: String,
    segment_ord: u32,
    scorer: Option<Box<dyn Scorer>>,
    yielded: u64,
    done: bool,
}

impl HitCursor {
    pub fn open(
        searcher: Searcher,
        query: &dyn Query,
        fields: Fields,
        repository: &str,
    ) -> Result<Self> {
        let weight = query.weight(EnableScoring::disabled_from_searcher(&searcher))?;
        Ok(Self {
            searcher,
            weight,
            fields,
            repository: repository.to_string(),
            segment_ord: 0,
            scorer: None,
            yielded: 0,
            done: false,
        })
    }

    fn fail(&mut self, err: crate::error::BrowseError) -> Option<Result<SearchHit>> {
        self.done = true;
        self.scorer = None;
        Some(Err(err))
    }
}

impl Iterator for HitCursor {
    type Item = Result<SearchHit>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if self.scorer.is_none() {
                if self.segment_ord as usize >= self.searcher.segment_readers().len() {
                    self.done = true;
                    break;
                }
                let segment = self.searcher.segment_reader(self.segment_ord);
                match self.weight.scorer(segment, 1.0) {
                    Ok(scorer) => self.scorer = Some(scorer),
                    Err(e) => return self.fail(e.into()),
                }
            }
            let Some(scorer) = self.scorer.as_mut() else {
                break;
            };

            let doc = scorer.doc();
            if doc == TERMINATED {
                self.scorer = None;
                self.segment_ord += 1;
                continue;
            }
            scorer.advance();

            if self.searcher.segment_reader(self.segment_ord).is_deleted(doc) {
                continue;
            }

            let addr = DocAddress::new(self.segment_ord, doc);
            return match hit_id(&self.searcher, &self.fields, addr) {
                Ok(id) => {
                    self.yielded += 1;
                    Some(Ok(SearchHit {
                        id,
                        sort_value: None,
                    }))
                }
                Err(e) => self.fail(e),
            };
        }
        None
    }
}

impl Drop for HitCursor {
    fn drop(&mut self) {
        debug!(
            repository = %self.repository,
            yielded = self.yielded,
            exhausted = self.done,
            "released search cursor"
        );
    }
}
