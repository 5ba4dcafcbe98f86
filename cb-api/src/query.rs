//! Table query builder.
//!
//! Describes a read or delete against one table: selected columns, column
//! filters, ordering, and whether exactly one row is expected. The same
//! description is rendered to query-string pairs by the HTTP client and
//! evaluated directly by in-memory backends.

/// Comparison applied by a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOp {
    /// `col=eq.value`
    Eq(String),
    /// `col=in.(a,b,c)`
    In(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
}

impl Filter {
    /// Render the right-hand side of the query pair.
    pub fn to_param(&self) -> String {
        match &self.op {
            FilterOp::Eq(v) => format!("eq.{v}"),
            FilterOp::In(values) => {
                let list: Vec<String> = values.iter().map(|v| quote_list_item(v)).collect();
                format!("in.({})", list.join(","))
            }
        }
    }

    /// Whether a JSON cell satisfies this filter. Values compare as text.
    pub fn matches(&self, cell: Option<&serde_json::Value>) -> bool {
        let Some(text) = cell.and_then(cell_text) else {
            return false;
        };
        match &self.op {
            FilterOp::Eq(v) => &text == v,
            FilterOp::In(values) => values.iter().any(|v| v == &text),
        }
    }
}

/// Quote list items that contain list syntax characters.
fn quote_list_item(v: &str) -> String {
    if v.chars().any(|c| matches!(c, ',' | '(' | ')' | '"' | ' ')) {
        format!("\"{}\"", v.replace('"', "\\\""))
    } else {
        v.to_string()
    }
}

fn cell_text(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A query against a single table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    pub table: String,
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    /// Expect exactly one row; zero or several rows is an error.
    pub single: bool,
}

impl TableQuery {
    /// Start a query selecting every column.
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: "*".to_string(),
            filters: Vec::new(),
            order: Vec::new(),
            single: false,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            op: FilterOp::Eq(value.to_string()),
        });
        self
    }

    pub fn in_list<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        self.filters.push(Filter {
            column: column.to_string(),
            op: FilterOp::In(values.into_iter().map(|v| v.to_string()).collect()),
        });
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order.push(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    /// Query-string pairs for a read.
    pub fn to_select_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.columns.clone())];
        params.extend(self.filter_params());
        if !self.order.is_empty() {
            let order: Vec<String> = self
                .order
                .iter()
                .map(|o| format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" }))
                .collect();
            params.push(("order".to_string(), order.join(",")));
        }
        params
    }

    /// Query-string pairs for filters only (deletes).
    pub fn filter_params(&self) -> Vec<(String, String)> {
        self.filters
            .iter()
            .map(|f| (f.column.clone(), f.to_param()))
            .collect()
    }

    /// Whether a row satisfies every filter.
    pub fn matches(&self, row: &serde_json::Value) -> bool {
        self.filters.iter().all(|f| f.matches(row.get(&f.column)))
    }
}
