//! PQL query builder for the inventory service

use std::fmt;

/// PQL query builder
///
/// Provides type-safe construction of inventory queries such as
/// `resources[certname] { type = "Class" and ... order by certname asc limit 1 }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Entity being queried (`resources`, `nodes`, ...)
    entity: String,
    /// Projected fields
    projection: Vec<String>,
    /// Conditions joined with `and`
    conditions: Vec<String>,
    /// ORDER BY clause
    order_by: Option<String>,
    /// LIMIT clause
    limit: Option<usize>,
}

impl Query {
    /// Create a new query for an entity
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            projection: Vec::new(),
            conditions: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Project specific fields
    #[must_use]
    pub fn project(mut self, fields: &[&str]) -> Self {
        self.projection = fields.iter().map(|f| (*f).to_string()).collect();
        self
    }

    /// Add an equality condition
    #[must_use]
    pub fn where_eq(mut self, field: &str, value: &str) -> Self {
        self.conditions
            .push(format!("{field} = \"{}\"", escape(value)));
        self
    }

    /// Restrict to nodes that are neither deactivated nor expired
    #[must_use]
    pub fn live_nodes(mut self) -> Self {
        self.conditions
            .push("nodes { deactivated is null and expired is null }".to_string());
        self
    }

    /// Order by field
    #[must_use]
    pub fn order_by(mut self, field: &str, ascending: bool) -> Self {
        let dir = if ascending { "asc" } else { "desc" };
        self.order_by = Some(format!("{field} {dir}"));
        self
    }

    /// Limit results
    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Field whose value identifies each row, the first projected field
    #[must_use]
    pub fn key_field(&self) -> Option<&str> {
        self.projection.first().map(String::as_str)
    }

    /// Build the PQL string
    #[must_use]
    pub fn build(&self) -> String {
        let mut pql = self.entity.clone();
        if !self.projection.is_empty() {
            pql.push('[');
            pql.push_str(&self.projection.join(", "));
            pql.push(']');
        }

        let mut body = self.conditions.join(" and ");

        if let Some(ref order) = self.order_by {
            if !body.is_empty() {
                body.push(' ');
            }
            body.push_str("order by ");
            body.push_str(order);
        }

        if let Some(limit) = self.limit {
            use std::fmt::Write;
            if !body.is_empty() {
                body.push(' ');
            }
            let _ = write!(body, "limit {limit}");
        }

        pql.push_str(" { ");
        pql.push_str(&body);
        pql.push_str(" }");
        pql
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.build())
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Predefined queries used by the reconciler
pub mod queries {
    use super::Query;

    /// Live nodes that declare `class`, ordered by certname
    #[must_use]
    pub fn class_members(class: &str) -> Query {
        Query::new("resources")
            .project(&["certname"])
            .where_eq("type", "Class")
            .where_eq("title", class)
            .live_nodes()
            .order_by("certname", true)
    }

    /// The single reporting-host candidate for `class`
    #[must_use]
    pub fn reporting_host(class: &str) -> Query {
        class_members(class).limit(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporting_host_query() {
        let pql = queries::reporting_host("Role::Importer").build();
        assert_eq!(
            pql,
            "resources[certname] { type = \"Class\" and title = \"Role::Importer\" and \
             nodes { deactivated is null and expired is null } order by certname asc limit 1 }"
        );
    }

    #[test]
    fn test_class_members_has_no_limit() {
        let query = queries::class_members("Role::Importer");
        assert!(!query.build().contains("limit"));
        assert_eq!(query.key_field(), Some("certname"));
    }

    #[test]
    fn test_injection_prevention() {
        let pql = Query::new("resources")
            .where_eq("title", "x\" or type = \"File")
            .build();
        assert!(pql.contains("title = \"x\\\" or type = \\\"File\""));
    }

    #[test]
    fn test_order_desc() {
        let pql = Query::new("nodes").order_by("certname", false).build();
        assert_eq!(pql, "nodes { order by certname desc }");
    }
}
