use std::collections::BTreeMap;

use crate::error::{QueryError, Result};
use crate::identifier::{validate_identifier, IdentifierKind};
use crate::value::ColumnInfo;

/// Table name that passed screening and is known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTable(String);

impl ValidatedTable {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Column name that passed screening and belongs to a validated table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedColumn {
    info: ColumnInfo,
}

impl ValidatedColumn {
    pub fn name(&self) -> &str {
        &self.info.column_name
    }

    pub fn info(&self) -> &ColumnInfo {
        &self.info
    }
}

/// Snapshot of the identifiers the catalog reported, keyed by table name.
///
/// The version starts at 1 and increases on every refresh, so callers can
/// tell whether two validations ran against the same catalog state.
#[derive(Debug, Clone, Default)]
pub struct SchemaAllowList {
    version: u64,
    tables: BTreeMap<String, Vec<ColumnInfo>>,
}

impl SchemaAllowList {
    pub fn new(version: u64, tables: BTreeMap<String, Vec<ColumnInfo>>) -> Self {
        Self { version, tables }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn table(&self, name: &str) -> Result<ValidatedTable> {
        validate_identifier(IdentifierKind::Table, name)?;
        if self.tables.contains_key(name) {
            Ok(ValidatedTable(name.to_string()))
        } else {
            Err(QueryError::unknown_identifier(
                IdentifierKind::Table,
                name,
                self.tables.keys().cloned().collect(),
            ))
        }
    }

    pub fn columns(&self, table: &ValidatedTable) -> &[ColumnInfo] {
        self.tables.get(table.as_str()).map_or(&[], Vec::as_slice)
    }

    pub fn column(&self, table: &ValidatedTable, name: &str) -> Result<ValidatedColumn> {
        validate_identifier(IdentifierKind::Column, name)?;
        let columns = self.columns(table);
        columns
            .iter()
            .find(|c| c.column_name == name)
            .map(|info| ValidatedColumn { info: info.clone() })
            .ok_or_else(|| {
                QueryError::unknown_identifier(
                    IdentifierKind::Column,
                    name,
                    columns.iter().map(|c| c.column_name.clone()).collect(),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, data_type: &str) -> ColumnInfo {
        ColumnInfo {
            column_name: name.to_string(),
            data_type: data_type.to_string(),
            underlying_type: data_type.to_string(),
        }
    }

    fn allow_list() -> SchemaAllowList {
        let mut tables = BTreeMap::new();
        tables.insert(
            "athletes_race".to_string(),
            vec![column("id", "integer"), column("race_date", "date")],
        );
        tables.insert("athletes_club".to_string(), vec![column("id", "integer")]);
        SchemaAllowList::new(1, tables)
    }

    #[test]
    fn test_known_identifiers_validate() {
        let list = allow_list();
        let table = list.table("athletes_race").unwrap();
        let col = list.column(&table, "race_date").unwrap();
        assert_eq!(col.name(), "race_date");
        assert!(col.info().is_date());
    }

    #[test]
    fn test_unknown_table_suggests_closest() {
        let err = allow_list().table("athletes_rac").unwrap_err();
        match err {
            QueryError::IdentifierValidation {
                kind, suggestion, ..
            } => {
                assert_eq!(kind, IdentifierKind::Table);
                assert_eq!(suggestion.as_deref(), Some("athletes_race"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_column_must_belong_to_table() {
        let list = allow_list();
        let club = list.table("athletes_club").unwrap();
        assert!(list.column(&club, "race_date").is_err());
    }

    #[test]
    fn test_case_sensitive_match() {
        let list = allow_list();
        assert!(list.table("ATHLETES_RACE").is_err());
    }
}
