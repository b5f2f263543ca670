use reqwest::Method;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
struct Order {
    /// `None` for the top-level table, else the embedded path (`swim_lanes.cards`).
    foreign_table: Option<String>,
    column: String,
    ascending: bool,
}

/// A single PostgREST request: one table, one verb.
#[derive(Debug, Clone)]
pub struct Query {
    table: String,
    method: Method,
    select: Option<String>,
    filters: Vec<(String, String)>,
    orders: Vec<Order>,
    single: bool,
    body: Option<Value>,
}

impl Query {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            method: Method::GET,
            select: None,
            filters: Vec::new(),
            orders: Vec::new(),
            single: false,
            body: None,
        }
    }

    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.select = Some(columns.into());
        self
    }

    pub fn eq(mut self, column: &str, value: impl std::fmt::Display) -> Self {
        self.filters.push((column.to_string(), format!("eq.{value}")));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.orders.push(Order {
            foreign_table: None,
            column: column.to_string(),
            ascending,
        });
        self
    }

    /// Orders rows of an embedded resource, e.g. `("swim_lanes.cards", "position")`.
    pub fn order_foreign(mut self, foreign_table: &str, column: &str, ascending: bool) -> Self {
        self.orders.push(Order {
            foreign_table: Some(foreign_table.to_string()),
            column: column.to_string(),
            ascending,
        });
        self
    }

    /// Expect exactly one row; zero rows surfaces as `PGRST116`.
    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    pub fn insert(mut self, row: Value) -> Self {
        self.method = Method::POST;
        self.body = Some(row);
        self
    }

    pub fn update(mut self, changes: Value) -> Self {
        self.method = Method::PATCH;
        self.body = Some(changes);
        self
    }

    pub fn delete(mut self) -> Self {
        self.method = Method::DELETE;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn is_single(&self) -> bool {
        self.single
    }

    /// Writes always ask for the affected rows back so callers can tell a
    /// filtered-out row from a successful write.
    pub fn prefer(&self) -> Option<&'static str> {
        match self.method {
            Method::GET => None,
            _ => Some("return=representation"),
        }
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();

        if let Some(select) = &self.select {
            pairs.push(("select".to_string(), compact_select(select)));
        }
        pairs.extend(self.filters.iter().cloned());

        // One `order` parameter per table, columns comma-joined in call order
        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        for order in &self.orders {
            let key = match &order.foreign_table {
                Some(path) => format!("{path}.order"),
                None => "order".to_string(),
            };
            let term = format!(
                "{}.{}",
                order.column,
                if order.ascending { "asc" } else { "desc" }
            );
            match grouped.iter_mut().find(|(k, _)| *k == key) {
                Some((_, terms)) => terms.push(term),
                None => grouped.push((key, vec![term])),
            }
        }
        pairs.extend(
            grouped
                .into_iter()
                .map(|(key, terms)| (key, terms.join(","))),
        );

        pairs
    }
}

/// PostgREST accepts whitespace in `select` but it bloats every URL.
fn compact_select(select: &str) -> String {
    select.chars().filter(|c| !c.is_whitespace()).collect()
}
