//! Policy query assembly, preview filter, repository scoping and sort parsing.

use std::sync::Arc;

use tantivy::Term;
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, QueryClone, RegexQuery, TermQuery};
use tantivy::schema::IndexRecordOption;

use crate::criteria::AppenderRegistry;
use crate::error::Result;
use crate::model::{CleanupPolicy, QueryOptions, SortDirection};
use crate::search::tantivy::{self as schema, Fields};

/// Wildcard appended to the preview filter to turn it into a prefix match.
const WILDCARD: char = '*';

/// Source of the reference time used by age-based criteria.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp_millis())
}

/// Accumulates the clauses of one policy query: match-all AND every
/// criterion AND the optional filter.
pub struct PolicyQuery {
    fields: Fields,
    now_millis: i64,
    clauses: Vec<(Occur, Box<dyn Query>)>,
}

impl PolicyQuery {
    pub fn new(fields: Fields, now_millis: i64) -> Self {
        Self {
            fields,
            now_millis,
            clauses: vec![(Occur::Must, Box::new(AllQuery) as Box<dyn Query>)],
        }
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn now_millis(&self) -> i64 {
        self.now_millis
    }

    pub fn must(&mut self, clause: Box<dyn Query>) {
        self.clauses.push((Occur::Must, clause));
    }

    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }

    pub fn into_query(self) -> BooleanQuery {
        BooleanQuery::new(self.clauses)
    }
}

impl std::fmt::Debug for PolicyQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyQuery")
            .field("now_millis", &self.now_millis)
            .field("clauses", &self.clauses)
            .finish()
    }
}

/// Builds policy and preview queries from policy criteria.
#[derive(Clone)]
pub struct QueryBuilder {
    appenders: AppenderRegistry,
    fields: Fields,
    clock: Clock,
}

impl QueryBuilder {
    pub fn new(appenders: AppenderRegistry, fields: Fields) -> Self {
        Self::with_clock(appenders, fields, system_clock())
    }

    pub fn with_clock(appenders: AppenderRegistry, fields: Fields, clock: Clock) -> Self {
        Self {
            appenders,
            fields,
            clock,
        }
    }

    pub fn appenders(&self) -> &AppenderRegistry {
        &self.appenders
    }

    /// Match-all AND-combined with one clause per criterion.
    pub fn build_policy_query(&self, policy: &CleanupPolicy) -> Result<PolicyQuery> {
        let mut query = PolicyQuery::new(self.fields, (self.clock)());
        for (key, value) in &policy.criteria {
            self.appenders.append(&mut query, key, value)?;
        }
        Ok(query)
    }

    /// Policy query plus a prefix filter over name, group and version.
    pub fn build_paged_query(
        &self,
        policy: &CleanupPolicy,
        options: &QueryOptions,
    ) -> Result<PolicyQuery> {
        let mut query = self.build_policy_query(policy)?;
        let Some(filter) = options.filter_text() else {
            return Ok(query);
        };

        let pattern = wildcard_to_regex(&add_wildcard(filter));
        let fields = [self.fields.name, self.fields.group, self.fields.version];
        let mut any_field: Vec<(Occur, Box<dyn Query>)> = Vec::with_capacity(fields.len());
        for field in fields {
            any_field.push((
                Occur::Should,
                Box::new(RegexQuery::from_pattern(&pattern, field)?) as Box<dyn Query>,
            ));
        }
        query.must(Box::new(BooleanQuery::new(any_field)));
        Ok(query)
    }
}

fn add_wildcard(filter: &str) -> String {
    let mut out = String::with_capacity(filter.len() + 1);
    out.push_str(filter);
    out.push(WILDCARD);
    out
}

/// Whole-term regex for a wildcard pattern: `*` matches any run of
/// characters, everything else matches literally.
pub fn wildcard_to_regex(pattern: &str) -> String {
    pattern
        .split(WILDCARD)
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*")
}

/// A query confined to one repository with no further visibility
/// restriction.
pub struct RepositoryQuery {
    query: Box<dyn Query>,
    repository: String,
}

impl RepositoryQuery {
    pub fn unrestricted(query: PolicyQuery, repository: &str) -> Self {
        Self {
            query: Box::new(query.into_query()),
            repository: repository.to_string(),
        }
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Final query with the repository term AND-combined in.
    pub fn scoped(&self, fields: &Fields) -> BooleanQuery {
        BooleanQuery::new(vec![
            (Occur::Must, self.query.box_clone()),
            (
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(fields.repository, &self.repository),
                    IndexRecordOption::Basic,
                )) as Box<dyn Query>,
            ),
        ])
    }
}

impl std::fmt::Debug for RepositoryQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryQuery")
            .field("repository", &self.repository)
            .field("query", &self.query)
            .finish()
    }
}

/// Sortable index columns, keyed by their preview property names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Relevance,
    Group,
    Name,
    Version,
    Format,
    LastBlobUpdated,
    LastDownloaded,
}

impl SortField {
    pub fn from_property(property: &str) -> Option<Self> {
        match property {
            "group" => Some(Self::Group),
            "name" => Some(Self::Name),
            "version" => Some(Self::Version),
            "format" => Some(Self::Format),
            "lastBlobUpdated" => Some(Self::LastBlobUpdated),
            "lastDownloaded" => Some(Self::LastDownloaded),
            _ => None,
        }
    }

    /// Fast field backing the sort, `None` for relevance.
    pub fn column(self) -> Option<&'static str> {
        match self {
            Self::Relevance => None,
            Self::Group => Some(schema::GROUP),
            Self::Name => Some(schema::NAME),
            Self::Version => Some(schema::VERSION),
            Self::Format => Some(schema::FORMAT),
            Self::LastBlobUpdated => Some(schema::LAST_BLOB_UPDATED),
            Self::LastDownloaded => Some(schema::LAST_DOWNLOADED),
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::LastBlobUpdated | Self::LastDownloaded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn relevance() -> Self {
        Self {
            field: SortField::Relevance,
            direction: SortDirection::Desc,
        }
    }

    /// Sort requested by preview options. Direction defaults to ascending;
    /// an absent property means relevance order.
    pub fn from_options(options: &QueryOptions) -> Result<Self> {
        let direction = match options.sort_direction.as_deref() {
            Some(direction) => direction.parse()?,
            None => SortDirection::Asc,
        };
        let Some(property) = options.sort_property.as_deref() else {
            return Ok(Self::relevance());
        };
        let field = SortField::from_property(property).ok_or_else(|| {
            crate::error::BrowseError::UnsupportedSortProperty(property.to_string())
        })?;
        Ok(Self { field, direction })
    }
}
