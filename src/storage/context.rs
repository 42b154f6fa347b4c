//! The persistence context: one connection, one working set.
//!
//! A [`PersistenceContext`] owns the single `SQLite` connection/session for a
//! store and the working set of staged, uncommitted changes. It is created
//! once per store and lives for the application's lifetime; two contexts must
//! never share a store file. All access goes through the
//! [`DataService`](crate::DataService) worker, so the context itself is
//! single-threaded by construction.

use crate::config::StoreConfig;
use crate::models::StorageHandle;
use crate::storage::query::FetchRequest;
use crate::storage::record::{Record, Value};
use crate::storage::schema::{EntityDescriptor, Model, is_valid_identifier};
use crate::{DataError, Result};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A staged, uncommitted change in the working set.
#[derive(Debug)]
enum StagedChange {
    Insert {
        entity: String,
        values: BTreeMap<String, Value>,
    },
    Update {
        handle: StorageHandle,
        values: BTreeMap<String, Value>,
    },
    Delete {
        handle: StorageHandle,
    },
}

/// The single storage session for one store file.
///
/// Holds the schema descriptor, the backing connection, and the working set
/// of in-flight changes pending a save. Entities fetched through a context
/// are scoped to its lifetime and must not cross into another context.
pub struct PersistenceContext {
    conn: Connection,
    model: Model,
    db_path: Option<PathBuf>,
    staged: Vec<StagedChange>,
}

impl PersistenceContext {
    /// Opens (or creates) the store for `model` under the configured data
    /// directory and runs lightweight migration.
    ///
    /// The store file is `<data_dir>/<model name>.sqlite`. A store that
    /// cannot be opened or migrated is fatal at this layer: the failure is
    /// logged at error level and returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created, the store
    /// cannot be opened, or the existing schema is incompatible with the
    /// model.
    pub fn open(model: Model, config: &StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| {
            let error = DataError::open(model.name(), e);
            tracing::error!(%error, "fatal error occurred while creating persistence stack");
            error
        })?;

        let db_path = config.data_dir.join(format!("{}.sqlite", model.name()));
        let conn = Connection::open(&db_path).map_err(|e| {
            let error = DataError::open(model.name(), e);
            tracing::error!(%error, path = %db_path.display(), "fatal error occurred while creating persistence stack");
            error
        })?;

        let mut context = Self {
            conn,
            model,
            db_path: Some(db_path),
            staged: Vec::new(),
        };
        context.initialize(config.busy_timeout_ms)?;
        Ok(context)
    }

    /// Opens an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be initialized.
    pub fn in_memory(model: Model) -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DataError::open(model.name(), e))?;

        let mut context = Self {
            conn,
            model,
            db_path: None,
            staged: Vec::new(),
        };
        context.initialize(StoreConfig::default().busy_timeout_ms)?;
        Ok(context)
    }

    /// Returns the store file path (`None` for in-memory).
    #[must_use]
    pub const fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    /// Returns the schema descriptor this context was opened with.
    #[must_use]
    pub const fn model(&self) -> &Model {
        &self.model
    }

    /// Configures the connection and migrates the schema.
    fn initialize(&mut self, busy_timeout_ms: u32) -> Result<()> {
        configure_connection(&self.conn, busy_timeout_ms);
        self.migrate().map_err(|error| {
            tracing::error!(%error, "fatal error occurred while migrating persistent store");
            error
        })
    }

    /// Lightweight migration: create missing tables, add missing columns.
    ///
    /// Columns no longer declared by the model are left in place. A declared
    /// type change on an existing column is unrecoverable at this layer.
    fn migrate(&self) -> Result<()> {
        for entity in self.model.entities() {
            if !is_valid_identifier(entity.name()) {
                return Err(DataError::migration(entity.name(), "invalid entity name"));
            }
            if entity.attributes().is_empty() {
                return Err(DataError::migration(
                    entity.name(),
                    "entity declares no attributes",
                ));
            }
            for attribute in entity.attributes() {
                if !is_valid_identifier(attribute.name()) {
                    return Err(DataError::migration(
                        entity.name(),
                        format!("invalid attribute name '{}'", attribute.name()),
                    ));
                }
            }

            match self.table_columns(entity.name())? {
                None => self.create_table(entity)?,
                Some(columns) => self.upgrade_table(entity, &columns)?,
            }
        }
        Ok(())
    }

    /// Returns `name -> declared type` for an existing table, or `None` if
    /// the table does not exist yet.
    fn table_columns(&self, entity: &str) -> Result<Option<BTreeMap<String, String>>> {
        let exists: bool = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                [entity],
                |row| row.get::<_, i64>(0).map(|count| count > 0),
            )
            .map_err(|e| DataError::migration(entity, e.to_string()))?;
        if !exists {
            return Ok(None);
        }

        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info(\"{entity}\")"))
            .map_err(|e| DataError::migration(entity, e.to_string()))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| DataError::migration(entity, e.to_string()))?;

        let mut columns = BTreeMap::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DataError::migration(entity, e.to_string()))?
        {
            let name: String = row
                .get(1)
                .map_err(|e| DataError::migration(entity, e.to_string()))?;
            let declared: String = row
                .get(2)
                .map_err(|e| DataError::migration(entity, e.to_string()))?;
            columns.insert(name, declared);
        }
        Ok(Some(columns))
    }

    fn create_table(&self, entity: &EntityDescriptor) -> Result<()> {
        let columns = entity
            .attributes()
            .iter()
            .map(|attribute| format!("\"{}\" {}", attribute.name(), attribute.kind().column_type()))
            .collect::<Vec<_>>()
            .join(", ");
        self.conn
            .execute(
                &format!("CREATE TABLE \"{}\" ({columns})", entity.name()),
                [],
            )
            .map_err(|e| DataError::migration(entity.name(), e.to_string()))?;
        tracing::debug!(entity = entity.name(), "created entity table");
        Ok(())
    }

    fn upgrade_table(
        &self,
        entity: &EntityDescriptor,
        columns: &BTreeMap<String, String>,
    ) -> Result<()> {
        for attribute in entity.attributes() {
            match columns.get(attribute.name()) {
                None => {
                    self.conn
                        .execute(
                            &format!(
                                "ALTER TABLE \"{}\" ADD COLUMN \"{}\" {}",
                                entity.name(),
                                attribute.name(),
                                attribute.kind().column_type()
                            ),
                            [],
                        )
                        .map_err(|e| DataError::migration(entity.name(), e.to_string()))?;
                    tracing::debug!(
                        entity = entity.name(),
                        attribute = attribute.name(),
                        "added entity column"
                    );
                },
                Some(declared)
                    if !declared.eq_ignore_ascii_case(attribute.kind().column_type()) =>
                {
                    return Err(DataError::migration(
                        entity.name(),
                        format!(
                            "attribute '{}' is declared {} but stored as {declared}",
                            attribute.name(),
                            attribute.kind().column_type()
                        ),
                    ));
                },
                Some(_) => {},
            }
        }
        Ok(())
    }

    /// Looks up the descriptor for an entity kind.
    pub(crate) fn entity_descriptor(&self, entity: &str) -> Result<&EntityDescriptor> {
        self.model
            .entity(entity)
            .ok_or_else(|| DataError::operation(format!("unknown entity kind '{entity}'")))
    }

    // MARK: Fetch

    /// Executes a fetch request, materializing full records.
    pub(crate) fn fetch(&self, request: &FetchRequest) -> Result<Vec<Record>> {
        let entity = request.entity();
        let descriptor = self.entity_descriptor(entity)?;

        let mut params = Vec::new();
        let mut sql = String::from("SELECT rowid");
        for attribute in descriptor.attributes() {
            sql.push_str(&format!(", \"{}\"", attribute.name()));
        }
        sql.push_str(&format!(" FROM \"{entity}\""));

        if let Some(predicate) = request.predicate() {
            let mut referenced = Vec::new();
            predicate.collect_attributes(&mut referenced);
            for attribute in referenced {
                if descriptor.attribute(attribute).is_none() {
                    return Err(DataError::operation(format!(
                        "unknown attribute '{attribute}' in predicate on '{entity}'"
                    )));
                }
            }
            sql.push_str(" WHERE ");
            sql.push_str(&predicate.sql(&mut params));
        }

        if !request.sort_descriptors().is_empty() {
            for descriptor_attr in request.sort_descriptors() {
                if descriptor.attribute(descriptor_attr.attribute()).is_none() {
                    return Err(DataError::operation(format!(
                        "unknown attribute '{}' in sort on '{entity}'",
                        descriptor_attr.attribute()
                    )));
                }
            }
            let order = request
                .sort_descriptors()
                .iter()
                .map(super::query::SortDescriptor::sql)
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ORDER BY {order}"));
        }

        if let Some(limit) = request.limit() {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| DataError::fetch(entity, e))?;
        let mut rows = stmt
            .query(rusqlite::params_from_iter(params))
            .map_err(|e| DataError::fetch(entity, e))?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(|e| DataError::fetch(entity, e))? {
            let row_id: i64 = row.get(0).map_err(|e| DataError::fetch(entity, e))?;
            let mut record = Record::new(entity);
            record.set_handle(StorageHandle::new(entity, row_id));
            for (index, attribute) in descriptor.attributes().iter().enumerate() {
                let raw: rusqlite::types::Value = row
                    .get(index + 1)
                    .map_err(|e| DataError::fetch(entity, e))?;
                record.set(
                    attribute.name(),
                    Value::from_sql_value(raw, attribute.kind(), attribute.name())?,
                );
            }
            records.push(record);
        }
        Ok(records)
    }

    /// Shallow fetch: record identities only, without materializing values.
    pub(crate) fn fetch_handles(&self, entity: &str) -> Result<Vec<StorageHandle>> {
        self.entity_descriptor(entity)?;

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT rowid FROM \"{entity}\""))
            .map_err(|e| DataError::fetch(entity, e))?;
        let handles = stmt
            .query_map([], |row| row.get::<_, i64>(0))
            .map_err(|e| DataError::fetch(entity, e))?
            .map(|row| row.map(|row_id| StorageHandle::new(entity, row_id)))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| DataError::fetch(entity, e))?;
        Ok(handles)
    }

    /// Materializes the stored record a handle points at.
    pub(crate) fn record(&self, handle: &StorageHandle) -> Result<Record> {
        let entity = handle.entity();
        let descriptor = self.entity_descriptor(entity)?;

        let columns = descriptor
            .attributes()
            .iter()
            .map(|attribute| format!("\"{}\"", attribute.name()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT {columns} FROM \"{entity}\" WHERE rowid = ?");

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| DataError::fetch(entity, e))?;
        let mut rows = stmt
            .query([handle.row_id()])
            .map_err(|e| DataError::fetch(entity, e))?;

        let Some(row) = rows.next().map_err(|e| DataError::fetch(entity, e))? else {
            return Err(DataError::operation(format!(
                "no stored record for {handle}"
            )));
        };

        let mut record = Record::new(entity);
        record.set_handle(handle.clone());
        for (index, attribute) in descriptor.attributes().iter().enumerate() {
            let raw: rusqlite::types::Value =
                row.get(index).map_err(|e| DataError::fetch(entity, e))?;
            record.set(
                attribute.name(),
                Value::from_sql_value(raw, attribute.kind(), attribute.name())?,
            );
        }
        Ok(record)
    }

    // MARK: Working set

    /// Stages an insert of a populated record.
    pub(crate) fn stage_insert(&mut self, record: Record) -> Result<()> {
        let entity = record.entity().to_string();
        let descriptor = self.entity_descriptor(&entity)?;
        validate_values(descriptor, record.values())?;
        self.staged.push(StagedChange::Insert {
            entity,
            values: record.into_values(),
        });
        Ok(())
    }

    /// Stages an update of the record a handle points at.
    pub(crate) fn stage_update(&mut self, handle: &StorageHandle, record: Record) -> Result<()> {
        let descriptor = self.entity_descriptor(handle.entity())?;
        validate_values(descriptor, record.values())?;
        self.staged.push(StagedChange::Update {
            handle: handle.clone(),
            values: record.into_values(),
        });
        Ok(())
    }

    /// Stages a delete of the record a handle points at.
    pub(crate) fn stage_delete(&mut self, handle: &StorageHandle) {
        self.staged.push(StagedChange::Delete {
            handle: handle.clone(),
        });
    }

    /// Discards every staged, uncommitted change.
    ///
    /// Called on every batch abort so a failed batch cannot pollute the
    /// working set of the next operation.
    pub(crate) fn discard_staged(&mut self) {
        self.staged.clear();
    }

    /// Commits the working set in one transaction.
    ///
    /// All-or-nothing: on failure nothing is committed and the working set
    /// is dropped. On success, returns the handles assigned to staged
    /// inserts, in stage order.
    pub(crate) fn save(&mut self) -> Result<Vec<StorageHandle>> {
        let staged = std::mem::take(&mut self.staged);
        if staged.is_empty() {
            return Ok(Vec::new());
        }

        let tx = self
            .conn
            .transaction()
            .map_err(|e| DataError::save(None, e))?;

        let mut inserted = Vec::new();
        for change in staged {
            match change {
                StagedChange::Insert { entity, values } => {
                    let sql = if values.is_empty() {
                        format!("INSERT INTO \"{entity}\" DEFAULT VALUES")
                    } else {
                        let columns = values
                            .keys()
                            .map(|name| format!("\"{name}\""))
                            .collect::<Vec<_>>()
                            .join(", ");
                        let placeholders = vec!["?"; values.len()].join(", ");
                        format!("INSERT INTO \"{entity}\" ({columns}) VALUES ({placeholders})")
                    };
                    let params = values.values().map(Value::to_sql_value).collect::<Vec<_>>();
                    tx.execute(&sql, rusqlite::params_from_iter(params))
                        .map_err(|e| DataError::save(Some(&entity), e))?;
                    inserted.push(StorageHandle::new(entity, tx.last_insert_rowid()));
                },
                StagedChange::Update { handle, values } => {
                    if values.is_empty() {
                        continue;
                    }
                    let assignments = values
                        .keys()
                        .map(|name| format!("\"{name}\" = ?"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    let sql = format!(
                        "UPDATE \"{}\" SET {assignments} WHERE rowid = ?",
                        handle.entity()
                    );
                    let mut params =
                        values.values().map(Value::to_sql_value).collect::<Vec<_>>();
                    params.push(rusqlite::types::Value::Integer(handle.row_id()));
                    let changed = tx
                        .execute(&sql, rusqlite::params_from_iter(params))
                        .map_err(|e| DataError::save(Some(handle.entity()), e))?;
                    if changed == 0 {
                        return Err(DataError::operation(format!(
                            "no stored record to update for {handle}"
                        )));
                    }
                },
                StagedChange::Delete { handle } => {
                    tx.execute(
                        &format!("DELETE FROM \"{}\" WHERE rowid = ?", handle.entity()),
                        [handle.row_id()],
                    )
                    .map_err(|e| DataError::save(Some(handle.entity()), e))?;
                },
            }
        }

        tx.commit().map_err(|e| DataError::save(None, e))?;
        Ok(inserted)
    }
}

/// Configures the connection for durability and lock tolerance.
///
/// WAL journal, NORMAL synchronous, and a busy timeout so concurrent opens
/// of unrelated stores degrade gracefully instead of failing immediately.
fn configure_connection(conn: &Connection, busy_timeout_ms: u32) {
    // journal_mode returns the resulting mode as a row, which execute would
    // reject; pragma_update tolerates it.
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", busy_timeout_ms.to_string());
}

/// Validates staged values against the entity descriptor.
fn validate_values(
    descriptor: &EntityDescriptor,
    values: &BTreeMap<String, Value>,
) -> Result<()> {
    for (name, value) in values {
        let Some(attribute) = descriptor.attribute(name) else {
            return Err(DataError::operation(format!(
                "unknown attribute '{name}' on entity '{}'",
                descriptor.name()
            )));
        };
        if !value.matches(attribute.kind()) {
            return Err(DataError::operation(format!(
                "attribute '{name}' on entity '{}' does not accept {value:?}",
                descriptor.name()
            )));
        }
    }
    for attribute in descriptor.attributes() {
        if attribute.is_required()
            && !values
                .get(attribute.name())
                .is_some_and(|value| !matches!(value, Value::Null))
        {
            return Err(DataError::operation(format!(
                "required attribute '{}' missing on entity '{}'",
                attribute.name(),
                descriptor.name()
            )));
        }
    }
    Ok(())
}
