use std::cmp::Ordering;

use serde_json::Value;

use crate::document::Document;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { path: String, value: Value },
    /// The field is an array holding `value`.
    ArrayContains { path: String, value: Value },
    Gte { path: String, value: Value },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// A collection query: all filters must match; results optionally ordered
/// by one field.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
        }
    }

    pub fn where_eq(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq {
            path: path.into(),
            value: value.into(),
        });
        self
    }

    pub fn where_array_contains(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::ArrayContains {
            path: path.into(),
            value: value.into(),
        });
        self
    }

    pub fn where_gte(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte {
            path: path.into(),
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, path: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((path.into(), direction));
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|filter| match filter {
            Filter::Eq { path, value } => doc.get(path) == Some(value),
            Filter::ArrayContains { path, value } => doc
                .get(path)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
            Filter::Gte { path, value } => doc
                .get(path)
                .and_then(|field| compare_values(field, value))
                .is_some_and(|ord| ord != Ordering::Less),
        })
    }

    /// Filter and order documents given in insertion order. Ties keep
    /// insertion order ascending and reverse it descending, so "newest
    /// first" stays newest first even when timestamps collide.
    pub fn apply(&self, docs: Vec<Document>) -> Vec<Document> {
        let mut result: Vec<Document> = docs.into_iter().filter(|d| self.matches(d)).collect();

        if let Some((path, direction)) = &self.order_by {
            let key = |d: &Document| d.get(path).cloned().unwrap_or(Value::Null);
            match direction {
                Direction::Asc => {
                    result.sort_by(|a, b| compare_values(&key(a), &key(b)).unwrap_or(Ordering::Equal));
                }
                Direction::Desc => {
                    result.reverse();
                    result.sort_by(|a, b| compare_values(&key(b), &key(a)).unwrap_or(Ordering::Equal));
                }
            }
        }

        result
    }
}

/// Ordering across JSON scalars. Null sorts before everything; values of
/// different kinds are otherwise incomparable.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Less),
        (_, Value::Null) => Some(Ordering::Greater),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, fields: Value) -> Document {
        let Value::Object(fields) = fields else {
            panic!("expected object")
        };
        Document {
            id: id.into(),
            fields,
        }
    }

    #[test]
    fn eq_and_order_desc() {
        let docs = vec![
            doc("a", json!({ "communityId": "g1", "timestamp": 10 })),
            doc("b", json!({ "communityId": "g2", "timestamp": 20 })),
            doc("c", json!({ "communityId": "g1", "timestamp": 30 })),
        ];
        let q = Query::collection("posts")
            .where_eq("communityId", "g1")
            .order_by("timestamp", Direction::Desc);
        let ids: Vec<String> = q.apply(docs).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn desc_ties_put_later_inserts_first() {
        let docs = vec![
            doc("first", json!({ "timestamp": 10 })),
            doc("second", json!({ "timestamp": 10 })),
        ];
        let q = Query::collection("posts").order_by("timestamp", Direction::Desc);
        let ids: Vec<String> = q.apply(docs).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["second", "first"]);
    }

    #[test]
    fn gte_filters_by_number() {
        let docs = vec![
            doc("old", json!({ "timestamp": 5 })),
            doc("edge", json!({ "timestamp": 10 })),
            doc("new", json!({ "timestamp": 15 })),
            doc("missing", json!({})),
        ];
        let q = Query::collection("moods")
            .where_gte("timestamp", 10)
            .order_by("timestamp", Direction::Asc);
        let ids: Vec<String> = q.apply(docs).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["edge", "new"]);
    }

    #[test]
    fn array_contains_checks_members() {
        let docs = vec![
            doc("g1", json!({ "members": ["u1", "u2"] })),
            doc("g2", json!({ "members": ["u3"] })),
            doc("g3", json!({ "members": "u1" })),
        ];
        let q = Query::collection("groups").where_array_contains("members", "u1");
        let ids: Vec<String> = q.apply(docs).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["g1"]);
    }
}
