use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::identifier::AggregateFunction;
use crate::value::SqlValue;

/// Inclusive range over a date/timestamp column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub column: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub group_by: String,
    pub agg_column: String,
    #[serde(default)]
    pub agg_function: AggregateFunction,
}

/// One read against one table. Filters are equality predicates joined with
/// AND, applied in the order given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub table: String,
    #[serde(default)]
    pub filters: Vec<(String, SqlValue)>,
    /// `None` uses the service default
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub date_range: Option<DateRange>,
    #[serde(default)]
    pub aggregation: Option<Aggregation>,
}

impl QueryRequest {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            limit: None,
            date_range: None,
            aggregation: None,
        }
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn limit(mut self, limit: impl Into<Option<u32>>) -> Self {
        self.limit = limit.into();
        self
    }

    pub fn date_range(
        mut self,
        column: impl Into<String>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Self {
        self.date_range = Some(DateRange {
            column: column.into(),
            start,
            end,
        });
        self
    }

    pub fn aggregate(
        mut self,
        group_by: impl Into<String>,
        agg_column: impl Into<String>,
        agg_function: AggregateFunction,
    ) -> Self {
        self.aggregation = Some(Aggregation {
            group_by: group_by.into(),
            agg_column: agg_column.into(),
            agg_function,
        });
        self
    }

    /// Every identifier the request references, with what it is used as.
    pub(crate) fn identifiers(&self) -> Vec<(crate::identifier::IdentifierKind, &str)> {
        use crate::identifier::IdentifierKind::{Column, Table};

        let mut idents = vec![(Table, self.table.as_str())];
        idents.extend(self.filters.iter().map(|(c, _)| (Column, c.as_str())));
        if let Some(range) = &self.date_range {
            idents.push((Column, range.column.as_str()));
        }
        if let Some(agg) = &self.aggregation {
            idents.push((Column, agg.group_by.as_str()));
            idents.push((Column, agg.agg_column.as_str()));
        }
        idents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::IdentifierKind;

    #[test]
    fn test_request_from_json() {
        let json = r#"{
            "table": "athletes_results",
            "filters": [["race_id", 3], ["category", "M40"]],
            "limit": 20,
            "aggregation": {"group_by": "category", "agg_column": "id", "agg_function": "COUNT"}
        }"#;
        let req: QueryRequest = serde_json::from_str(json).unwrap();
        assert_eq!(
            req.filters,
            vec![
                ("race_id".to_string(), SqlValue::Int(3)),
                ("category".to_string(), SqlValue::Text("M40".into())),
            ]
        );
        assert_eq!(req.limit, Some(20));
        assert_eq!(
            req.aggregation.unwrap().agg_function,
            AggregateFunction::Count
        );
    }

    #[test]
    fn test_identifiers_cover_every_reference() {
        let start = chrono::NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let req = QueryRequest::new("athletes_race")
            .filter("city", "Ubatuba")
            .date_range("race_date", start, start)
            .aggregate("year", "id", AggregateFunction::Count);

        let idents = req.identifiers();
        assert_eq!(idents[0], (IdentifierKind::Table, "athletes_race"));
        let columns: Vec<_> = idents[1..].iter().map(|(_, n)| *n).collect();
        assert_eq!(columns, vec!["city", "race_date", "year", "id"]);
    }
}
