//! Shared fixtures for engine tests.

#![allow(dead_code)]

use upsert_engine::{
    ColumnDefinition, CommitMode, KeyGroup, Outcome, Record, SqlType, TableMetadata, TableRef,
    UpsertConfig,
};

/// `public.users`: primary key `id`, unique `email`.
pub fn users_metadata() -> TableMetadata {
    TableMetadata::new(
        TableRef::new(Some("public".to_string()), "users"),
        vec![
            ColumnDefinition::new("id", SqlType::Integer),
            ColumnDefinition::new("email", SqlType::String),
            ColumnDefinition::new("name", SqlType::String),
            ColumnDefinition::new("price", SqlType::Numeric),
        ],
        KeyGroup::primary(vec!["id".to_string()]),
        vec![KeyGroup::new("users_email_key", vec!["email".to_string()])],
    )
    .unwrap()
}

pub fn records(lines: &[&str]) -> Vec<Record> {
    lines.iter().map(|l| Record::from_json_str(l)).collect()
}

/// `n` distinct valid user records.
pub fn user_records(n: usize) -> Vec<Record> {
    (1..=n)
        .map(|i| Record::from_json_str(&format!(r#"{{"id": {i}, "name": "user{i}"}}"#)))
        .collect()
}

pub fn row_commit(batch_size: i64) -> UpsertConfig {
    UpsertConfig {
        batch_size,
        commit_mode: CommitMode::RowCount,
        ..Default::default()
    }
}

pub fn indices(outcomes: &[Outcome]) -> Vec<u64> {
    outcomes.iter().map(|o| o.index).collect()
}
