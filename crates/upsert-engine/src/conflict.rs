//! Conflict Resolver.
//!
//! For each key group (primary key first, then every unique group) the
//! resolver probes the table for a row matching the record's key values.
//! Conflicting groups are combined into the key columns of the UPDATE's
//! WHERE clause.

use crate::connection::UpsertConnection;
use crate::marshal::BinderRegistry;
use crate::statement::StatementBuilder;
use tracing::debug;
use upsert_core::{KeyGroup, RecordError, RecordFields, TableMetadata};

/// Key groups a record conflicts with. Empty means insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conflict {
    groups: Vec<KeyGroup>,
}

impl Conflict {
    /// Whether no group conflicts.
    pub fn is_none(&self) -> bool {
        self.groups.is_empty()
    }

    /// Conflicting groups, primary key first.
    pub fn groups(&self) -> &[KeyGroup] {
        &self.groups
    }

    /// WHERE-clause columns: primary-key columns first, then unique-group
    /// columns not already covered.
    pub fn key_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for group in &self.groups {
            for column in &group.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }
        columns
    }
}

/// Probes key groups for one table.
pub struct ConflictResolver<'a> {
    metadata: &'a TableMetadata,
    builder: &'a StatementBuilder,
    binders: &'a BinderRegistry,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(
        metadata: &'a TableMetadata,
        builder: &'a StatementBuilder,
        binders: &'a BinderRegistry,
    ) -> Self {
        Self {
            metadata,
            builder,
            binders,
        }
    }

    /// Probe a single key group.
    ///
    /// Returns the group when a matching row exists. An empty group, or a
    /// record with no value for any of the group's columns, never conflicts.
    pub async fn resolve<C>(
        &self,
        conn: &mut C,
        fields: &RecordFields,
        group: &KeyGroup,
    ) -> Result<Option<KeyGroup>, RecordError>
    where
        C: UpsertConnection + ?Sized,
    {
        let Some(probe) = self.builder.probe(group, fields) else {
            return Ok(None);
        };
        let params = self.binders.bind_statement(&probe, fields, self.metadata)?;
        let found = conn.probe(&probe.sql, &params).await?;
        debug!("Probe on key '{}' matched: {found}", group.name);
        Ok(found.then(|| group.clone()))
    }

    /// Probe the primary key and every unique group.
    pub async fn resolve_all<C>(
        &self,
        conn: &mut C,
        fields: &RecordFields,
    ) -> Result<Conflict, RecordError>
    where
        C: UpsertConnection + ?Sized,
    {
        let mut conflict = Conflict::default();
        let groups = std::iter::once(self.metadata.primary_key())
            .chain(self.metadata.unique_groups().iter());
        for group in groups {
            if let Some(hit) = self.resolve(conn, fields, group).await? {
                conflict.groups.push(hit);
            }
        }
        Ok(conflict)
    }
}
