//! Translation of cleanup policy criteria into query clauses.
//!
//! Each criterion key maps to one [`CriteriaAppender`] in an
//! [`AppenderRegistry`]. The registry is assembled once at startup and is
//! read-only while policies are being translated; a key with no appender is
//! a configuration error that aborts the translation before any search runs.

use std::collections::HashMap;
use std::ops::Bound::{Excluded, Unbounded};

use tantivy::Term;
use tantivy::query::{BooleanQuery, Occur, Query, RangeQuery, RegexQuery, TermQuery};
use tantivy::schema::{Field, IndexRecordOption};

use crate::error::{BrowseError, Result};
use crate::model::CleanupPolicy;
use crate::search::query::PolicyQuery;
use crate::search::tantivy::Fields;

pub const LAST_BLOB_UPDATED_KEY: &str = "lastBlobUpdated";
pub const LAST_DOWNLOADED_KEY: &str = "lastDownloaded";
pub const IS_PRERELEASE_KEY: &str = "isPrerelease";
pub const REGEX_KEY: &str = "regex";
pub const GROUP_KEY: &str = "group";
pub const NAME_KEY: &str = "name";
pub const VERSION_KEY: &str = "version";
pub const FORMAT_KEY: &str = "format";

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Keyword fields a criterion may match exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Group,
    Name,
    Version,
    Format,
}

impl TextField {
    fn resolve(self, fields: &Fields) -> Field {
        match self {
            Self::Group => fields.group,
            Self::Name => fields.name,
            Self::Version => fields.version,
            Self::Format => fields.format,
        }
    }
}

/// Timestamp fields an age criterion compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    LastBlobUpdated,
    LastDownloaded,
}

impl DateField {
    fn resolve(self, fields: &Fields) -> Field {
        match self {
            Self::LastBlobUpdated => fields.last_blob_updated,
            Self::LastDownloaded => fields.last_downloaded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriteriaAppender {
    /// Value is a number of days; matches timestamps strictly older than
    /// `now - days`.
    OlderThan { field: DateField },
    /// Value is a number of days; matches components not downloaded within
    /// that window. Never-downloaded components fall back to their blob
    /// update time.
    NotDownloadedSince,
    /// Value is `true` or `false`.
    Prerelease,
    /// Value is a regular expression that must match the whole field.
    Regex { field: TextField },
    /// Value must equal the field exactly.
    FieldEquals { field: TextField },
}

impl CriteriaAppender {
    pub fn append(self, query: &mut PolicyQuery, key: &str, value: &str) -> Result<()> {
        let fields = *query.fields();
        let clause: Box<dyn Query> = match self {
            Self::OlderThan { field } => {
                let cutoff = cutoff_millis(query.now_millis(), key, value)?;
                older_than(field.resolve(&fields), cutoff)
            }
            Self::NotDownloadedSince => {
                let cutoff = cutoff_millis(query.now_millis(), key, value)?;
                let never_downloaded = BooleanQuery::new(vec![
                    (
                        Occur::Must,
                        Box::new(TermQuery::new(
                            Term::from_field_bool(fields.downloaded, false),
                            IndexRecordOption::Basic,
                        )) as Box<dyn Query>,
                    ),
                    (Occur::Must, older_than(fields.last_blob_updated, cutoff)),
                ]);
                Box::new(BooleanQuery::new(vec![
                    (Occur::Should, older_than(fields.last_downloaded, cutoff)),
                    (Occur::Should, Box::new(never_downloaded) as Box<dyn Query>),
                ]))
            }
            Self::Prerelease => {
                let flag = parse_flag(key, value)?;
                Box::new(TermQuery::new(
                    Term::from_field_bool(fields.prerelease, flag),
                    IndexRecordOption::Basic,
                ))
            }
            Self::Regex { field } => {
                let regex = RegexQuery::from_pattern(value, field.resolve(&fields)).map_err(
                    |e| BrowseError::InvalidCriterion {
                        key: key.to_string(),
                        value: value.to_string(),
                        reason: e.to_string(),
                    },
                )?;
                Box::new(regex)
            }
            Self::FieldEquals { field } => Box::new(TermQuery::new(
                Term::from_field_text(field.resolve(&fields), value),
                IndexRecordOption::Basic,
            )),
        };
        query.must(clause);
        Ok(())
    }
}

fn older_than(field: Field, cutoff: i64) -> Box<dyn Query> {
    Box::new(RangeQuery::new(
        Unbounded,
        Excluded(Term::from_field_i64(field, cutoff)),
    ))
}

fn cutoff_millis(now_millis: i64, key: &str, value: &str) -> Result<i64> {
    let days: u32 = value
        .trim()
        .parse()
        .map_err(|_| BrowseError::InvalidCriterion {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a whole number of days".to_string(),
        })?;
    Ok(now_millis.saturating_sub(i64::from(days) * MILLIS_PER_DAY))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    let value_trimmed = value.trim();
    if value_trimmed.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value_trimmed.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(BrowseError::InvalidCriterion {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        })
    }
}

/// Criterion key to appender table.
#[derive(Debug, Clone, Default)]
pub struct AppenderRegistry {
    appenders: HashMap<String, CriteriaAppender>,
}

impl AppenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in criterion.
    pub fn standard() -> Self {
        Self::new()
            .with(
                LAST_BLOB_UPDATED_KEY,
                CriteriaAppender::OlderThan {
                    field: DateField::LastBlobUpdated,
                },
            )
            .with(LAST_DOWNLOADED_KEY, CriteriaAppender::NotDownloadedSince)
            .with(IS_PRERELEASE_KEY, CriteriaAppender::Prerelease)
            .with(
                REGEX_KEY,
                CriteriaAppender::Regex {
                    field: TextField::Name,
                },
            )
            .with(
                GROUP_KEY,
                CriteriaAppender::FieldEquals {
                    field: TextField::Group,
                },
            )
            .with(
                NAME_KEY,
                CriteriaAppender::FieldEquals {
                    field: TextField::Name,
                },
            )
            .with(
                VERSION_KEY,
                CriteriaAppender::FieldEquals {
                    field: TextField::Version,
                },
            )
            .with(
                FORMAT_KEY,
                CriteriaAppender::FieldEquals {
                    field: TextField::Format,
                },
            )
    }

    pub fn with(mut self, key: impl Into<String>, appender: CriteriaAppender) -> Self {
        self.register(key, appender);
        self
    }

    /// Returns the appender previously registered under `key`, if any.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        appender: CriteriaAppender,
    ) -> Option<CriteriaAppender> {
        self.appenders.insert(key.into(), appender)
    }

    pub fn get(&self, key: &str) -> Option<CriteriaAppender> {
        self.appenders.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.appenders.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.appenders.keys().map(String::as_str)
    }

    /// Checks that every criterion of `policy` has an appender, so wiring
    /// code can reject a policy before it is ever browsed.
    pub fn validate(&self, policy: &CleanupPolicy) -> Result<()> {
        match policy.criteria.keys().find(|key| !self.contains(key)) {
            Some(key) => Err(BrowseError::UnsupportedCriterion { key: key.clone() }),
            None => Ok(()),
        }
    }

    pub fn append(&self, query: &mut PolicyQuery, key: &str, value: &str) -> Result<()> {
        let appender = self
            .get(key)
            .ok_or_else(|| BrowseError::UnsupportedCriterion {
                key: key.to_string(),
            })?;
        appender.append(query, key, value)
    }
}
