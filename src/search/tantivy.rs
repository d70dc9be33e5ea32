use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tantivy::schema::*;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, doc};
use tracing::info;

use crate::model::Component;
use crate::search::engine::TantivySearchEngine;

const SCHEMA_VERSION: &str = "v1";

/// Smallest writer arena tantivy accepts for a single indexing thread.
pub const MIN_WRITER_HEAP_BYTES: usize = 15_000_000;

pub const ID: &str = "id";
pub const REPOSITORY: &str = "repository";
pub const GROUP: &str = "group";
pub const NAME: &str = "name";
pub const VERSION: &str = "version";
pub const FORMAT: &str = "format";
pub const LAST_BLOB_UPDATED: &str = "last_blob_updated";
pub const LAST_DOWNLOADED: &str = "last_downloaded";
pub const DOWNLOADED: &str = "downloaded";
pub const PRERELEASE: &str = "prerelease";

#[derive(Clone, Copy, Debug)]
pub struct Fields {
    pub id: Field,
    pub repository: Field,
    pub group: Field,
    pub name: Field,
    pub version: Field,
    pub format: Field,
    pub last_blob_updated: Field,
    pub last_downloaded: Field,
    pub downloaded: Field,
    pub prerelease: Field,
}

/// Writable component index. Search goes through [`TantivySearchEngine`].
pub struct ComponentIndex {
    pub index: Index,
    writer: IndexWriter,
    pub fields: Fields,
}

impl ComponentIndex {
    pub fn open_or_create(path: &Path, writer_heap_bytes: usize) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("creating index directory {}", path.display()))?;
        let index = if path.join("meta.json").exists() {
            Index::open_in_dir(path)?
        } else {
            Index::create_in_dir(path, build_schema())?
        };
        info!(path = %path.display(), "opened component index");
        Self::from_index(index, writer_heap_bytes)
    }

    pub fn in_ram() -> Result<Self> {
        Self::from_index(Index::create_in_ram(build_schema()), MIN_WRITER_HEAP_BYTES)
    }

    fn from_index(index: Index, writer_heap_bytes: usize) -> Result<Self> {
        let writer = index
            .writer(writer_heap_bytes.max(MIN_WRITER_HEAP_BYTES))
            .with_context(|| "create index writer")?;
        let fields = fields_from_schema(&index.schema())?;
        Ok(Self {
            index,
            writer,
            fields,
        })
    }

    pub fn add_component(&mut self, component: &Component) -> Result<()> {
        let f = &self.fields;
        let mut d = doc! {
            f.id => component.id.to_string(),
            f.repository => component.repository.clone(),
            f.name => component.name.clone(),
            f.version => component.version.clone(),
            f.format => component.format.clone(),
        };
        // Groupless components index an empty group so string sorts see
        // a value for every document.
        d.add_text(f.group, component.group.as_deref().unwrap_or_default());
        if let Some(ts) = component.last_blob_updated {
            d.add_i64(f.last_blob_updated, ts);
        }
        if let Some(ts) = component.last_downloaded {
            d.add_i64(f.last_downloaded, ts);
        }
        d.add_bool(f.downloaded, component.last_downloaded.is_some());
        d.add_bool(f.prerelease, component.prerelease);
        self.writer.add_document(d)?;
        Ok(())
    }

    /// Removes every indexed document carrying `id`. Visible after commit.
    pub fn delete_component(&mut self, id: &str) {
        self.writer
            .delete_term(Term::from_field_text(self.fields.id, id));
    }

    pub fn commit(&mut self) -> Result<()> {
        self.writer.commit()?;
        Ok(())
    }

    pub fn reader(&self) -> Result<IndexReader> {
        Ok(self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?)
    }

    /// Search engine over the segments committed so far.
    pub fn engine(&self) -> Result<TantivySearchEngine> {
        Ok(TantivySearchEngine::new(self.reader()?, self.fields))
    }
}

pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();
    schema_builder.add_text_field(ID, STRING | STORED);
    schema_builder.add_text_field(REPOSITORY, STRING | STORED);
    schema_builder.add_text_field(GROUP, STRING | STORED | FAST);
    schema_builder.add_text_field(NAME, STRING | STORED | FAST);
    schema_builder.add_text_field(VERSION, STRING | STORED | FAST);
    schema_builder.add_text_field(FORMAT, STRING | STORED | FAST);
    schema_builder.add_i64_field(LAST_BLOB_UPDATED, INDEXED | STORED | FAST);
    schema_builder.add_i64_field(LAST_DOWNLOADED, INDEXED | STORED | FAST);
    schema_builder.add_bool_field(DOWNLOADED, INDEXED);
    schema_builder.add_bool_field(PRERELEASE, INDEXED | STORED);
    schema_builder.build()
}

fn field(schema: &Schema, name: &str) -> Result<Field> {
    schema
        .get_field(name)
        .map_err(|_| anyhow::anyhow!("schema missing {name}"))
}

pub fn fields_from_schema(schema: &Schema) -> Result<Fields> {
    Ok(Fields {
        id: field(schema, ID)?,
        repository: field(schema, REPOSITORY)?,
        group: field(schema, GROUP)?,
        name: field(schema, NAME)?,
        version: field(schema, VERSION)?,
        format: field(schema, FORMAT)?,
        last_blob_updated: field(schema, LAST_BLOB_UPDATED)?,
        last_downloaded: field(schema, LAST_DOWNLOADED)?,
        downloaded: field(schema, DOWNLOADED)?,
        prerelease: field(schema, PRERELEASE)?,
    })
}

pub fn index_dir(base: &Path) -> PathBuf {
    base.join("index").join(SCHEMA_VERSION)
}
