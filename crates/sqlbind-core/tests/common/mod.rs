#![allow(dead_code)]

use sqlbind_core::{parse, HostType, ParsedExpr, Row, SqlValue, TypeBoundExpr};
use sqlbind_derive::{Record, Sequence};

#[derive(Debug, Default, Clone, PartialEq, Record)]
pub struct Person {
    #[db("id")]
    pub id: i64,
    #[db("name")]
    pub name: String,
    #[db("address_id")]
    pub address_id: i64,
}

#[derive(Debug, Default, Clone, PartialEq, Record)]
pub struct Address {
    #[db("id")]
    pub id: i64,
    #[db("district")]
    pub district: String,
    #[db("street")]
    pub street: String,
}

#[derive(Debug, Default, Clone, PartialEq, Sequence)]
pub struct Ids(pub Vec<i64>);

pub fn parse_ok(input: &str) -> ParsedExpr {
    parse(input).unwrap_or_else(|e| panic!("failed to parse: {input}\nerror: {e}"))
}

pub fn parse_err(input: &str) -> String {
    parse(input)
        .expect_err(&format!("expected parse error for: {input}"))
        .to_string()
}

pub fn bind_ok(input: &str, exemplars: &[&dyn HostType]) -> TypeBoundExpr {
    parse_ok(input)
        .bind_types(exemplars)
        .unwrap_or_else(|e| panic!("failed to bind: {input}\nerror: {e}"))
}

pub fn bind_err(input: &str, exemplars: &[&dyn HostType]) -> String {
    parse_ok(input)
        .bind_types(exemplars)
        .expect_err(&format!("expected bind error for: {input}"))
        .to_string()
}

/// An in-memory result row for decode tests.
pub struct TestRow {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl TestRow {
    pub fn new(entries: &[(&str, SqlValue)]) -> Self {
        Self {
            columns: entries.iter().map(|(name, _)| (*name).to_string()).collect(),
            values: entries.iter().map(|(_, value)| value.clone()).collect(),
        }
    }
}

impl Row for TestRow {
    fn columns(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn value(&self, index: usize) -> Option<SqlValue> {
        self.values.get(index).cloned()
    }
}
