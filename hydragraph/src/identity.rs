//! Global node identities.
//!
//! A node id is a single opaque string carrying the GraphQL type the node was minted as, the name of
//! the source able to load it, and the query handed to that source's batch fetch function:
//!
//! ```text
//! Task@Tasks@{"args":{"taskId":"42"}}
//! Component@Catalog@{"ref":"component:default/backend","args":{}}
//! ```

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::error::IdentityError;

pub(crate) const SEPARATOR: char = '@';

/// The part of a node id that a source uses to find the backing record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeQuery {
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Map<String, Value>>,
}

impl NodeQuery {
    pub fn by_ref(reference: impl Into<String>) -> Self {
        Self {
            reference: Some(reference.into()),
            args: None,
        }
    }

    pub fn by_args(args: Map<String, Value>) -> Self {
        Self {
            reference: None,
            args: Some(args),
        }
    }
}

/// A decoded node id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeId {
    pub source: String,
    pub typename: String,
    pub query: NodeQuery,
}

impl NodeId {
    pub fn new(
        source: impl Into<String>,
        typename: impl Into<String>,
        query: NodeQuery,
    ) -> Self {
        Self {
            source: source.into(),
            typename: typename.into(),
            query,
        }
    }

    pub fn encode(&self) -> String {
        encode_id(self)
    }
}

impl std::str::FromStr for NodeId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_id(s)
    }
}

/// Encodes a node id. Equal ids always produce equal tokens.
pub fn encode_id(id: &NodeId) -> String {
    // Serializing a struct of strings and JSON maps can't fail.
    let query = serde_json::to_string(&id.query).unwrap_or_else(|_| String::from("{}"));
    format!(
        "{}{SEPARATOR}{}{SEPARATOR}{query}",
        id.typename, id.source
    )
}

/// Decodes a token produced by [`encode_id`].
pub fn decode_id(id: &str) -> Result<NodeId, IdentityError> {
    let malformed = |reason: String| IdentityError::MalformedIdentity {
        id: id.to_string(),
        reason,
    };
    let mut parts = id.splitn(3, SEPARATOR);
    let (Some(typename), Some(source), Some(query)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed(format!(
            "expected `typename{SEPARATOR}source{SEPARATOR}query`"
        )));
    };
    if typename.is_empty() {
        return Err(malformed("the typename is empty".to_string()));
    }
    if source.is_empty() {
        return Err(malformed("the source is empty".to_string()));
    }
    // Sequences deserialize into structs too, which would give one query several tokens.
    let query = serde_json::from_str::<Value>(query).map_err(|error| malformed(error.to_string()))?;
    let query = match query {
        Value::Object(_) => query,
        _ => return Err(malformed("the query must be a JSON object".to_string())),
    };
    let query: NodeQuery =
        serde_json::from_value(query).map_err(|error| malformed(error.to_string()))?;
    Ok(NodeId {
        source: source.to_string(),
        typename: typename.to_string(),
        query,
    })
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn encodes_reference_ids() {
        let id = NodeId::new(
            "Catalog",
            "Node",
            NodeQuery::by_ref("component:default/backend"),
        );
        assert_snapshot!(id.encode(), @r###"Node@Catalog@{"ref":"component:default/backend"}"###);
    }

    #[test]
    fn encodes_argument_ids() {
        let id = NodeId::new("Tasks", "Task", NodeQuery::by_args(args(json!({"taskId": "42"}))));
        assert_snapshot!(id.encode(), @r###"Task@Tasks@{"args":{"taskId":"42"}}"###);
    }

    #[test]
    fn encodes_empty_query() {
        let id = NodeId::new("Mock", "Entity", NodeQuery::default());
        assert_eq!(id.encode(), "Entity@Mock@{}");
    }

    #[rstest]
    #[case(NodeQuery::default())]
    #[case(NodeQuery::by_ref("user:default/john@example.com"))]
    #[case(NodeQuery { reference: Some("x".into()), args: Some(args(json!({"first": 1, "filter": {"kind": ["A", "B"]}}))) })]
    fn decodes_what_it_encodes(#[case] query: NodeQuery) {
        let id = NodeId::new("Mock", "Entity", query);
        assert_eq!(decode_id(&id.encode()), Ok(id));
    }

    #[rstest]
    #[case("Entity")]
    #[case("Entity@Mock")]
    #[case("@Mock@{}")]
    #[case("Entity@@{}")]
    #[case("Entity@Mock@not json")]
    #[case("Entity@Mock@[]")]
    #[case(r#"Entity@Mock@{"ref":1}"#)]
    #[case(r#"Entity@Mock@{"args":"x"}"#)]
    #[case(r#"Entity@Mock@{"unknown":true}"#)]
    #[case(r#"Entity@Mock@["x",{"k":1}]"#)]
    #[case(r#"Entity@Mock@"x""#)]
    fn rejects_malformed_ids(#[case] id: &str) {
        let error = decode_id(id).unwrap_err();
        assert!(matches!(error, IdentityError::MalformedIdentity { .. }));
        assert!(error.to_string().contains(id));
    }

    #[test]
    fn reports_non_object_queries() {
        assert_snapshot!(
            decode_id(r#"Entity@Mock@["x",{"k":1}]"#).unwrap_err(),
            @r#"Malformed node id "Entity@Mock@["x",{"k":1}]": the query must be a JSON object"#
        );
    }

    #[test]
    fn reports_decode_reason() {
        assert_snapshot!(
            decode_id("Entity@Mock").unwrap_err(),
            @"Malformed node id \"Entity@Mock\": expected `typename@source@query`"
        );
    }
}
