//! Fetch queries: equality filters, one ordering column, optional limit

use crate::gateway::records::{Record, RecordKind, CREATED_AT_COLUMN};
use std::cmp::Ordering;

/// Equality filter on one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        record.column_value(&self.column).as_deref() == Some(self.value.as_str())
    }
}

/// Ordering column and direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }

    /// Compare two records on the ordering column
    ///
    /// Timestamps compare chronologically, everything else as strings.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let ordering = if self.column == CREATED_AT_COLUMN {
            a.created_at().cmp(&b.created_at())
        } else {
            a.column_value(&self.column).cmp(&b.column_value(&self.column))
        };

        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

/// A fetch request against one record kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub kind: RecordKind,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    /// Every row of a kind, unordered
    pub fn all(kind: RecordKind) -> Self {
        Self {
            kind,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Most recent rows first
    pub fn recent(kind: RecordKind, limit: usize) -> Self {
        Self::all(kind)
            .order_by(Order::desc(CREATED_AT_COLUMN))
            .limit(limit)
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        record.kind() == self.kind && self.filters.iter().all(|f| f.matches(record))
    }

    /// Apply filters, ordering and limit to an in-memory set of rows
    pub fn apply<'a, I>(&self, rows: I) -> Vec<Record>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut selected: Vec<Record> = rows
            .into_iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect();

        if let Some(order) = &self.order {
            // stable: equal keys keep insertion order
            selected.sort_by(|a, b| order.compare(a, b));
        }

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }

        selected
    }
}
