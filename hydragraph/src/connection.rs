//! Cursor-paginated connections over minted node ids.
//!
//! A `@resolve` field typed `Connection` is rewritten to a connection specialized over its node
//! type. Its own arguments move into one generated input object, and `first`, `after`, `last` and
//! `before` are added:
//!
//! ```graphql
//! # before
//! interface Entity @implements(interface: "Node") {
//!   parents(kind: String): Connection @resolve(at: "spec.parents", nodeType: "Entity")
//! }
//! # after
//! interface Entity @implements(interface: "Node") {
//!   parents(args: EntityParentsArgs, first: Int, after: String, last: Int, before: String): EntityConnection
//! }
//! input EntityParentsArgs { kind: String }
//! type EntityConnection implements Connection { pageInfo: PageInfo! edges: [EntityEdge!]! count: Int }
//! type EntityEdge implements Edge { cursor: String! node: Entity! }
//! ```

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::ast::InputValueDefinition;
use apollo_compiler::ast::Type;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::name;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ComponentName;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::InputObjectType;
use apollo_compiler::schema::ObjectType;
use apollo_compiler::ty;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use heck::ToPascalCase;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::error::ResolveError;
use crate::utils::logging::snapshot;

pub(crate) const CONNECTION_INTERFACE: &str = "Connection";
pub(crate) const ARGS_ARGUMENT: &str = "args";
const CURSOR_PREFIX: &str = "arrayconnection:";

/// One page of a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionPage {
    pub type_name: Name,
    pub edges: Vec<Edge>,
    pub has_previous_page: bool,
    pub has_next_page: bool,
    /// Total number of nodes, before slicing.
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub type_name: Name,
    pub cursor: String,
    /// Encoded id of the node.
    pub node: String,
}

impl ConnectionPage {
    pub fn start_cursor(&self) -> Option<&str> {
        self.edges.first().map(|edge| edge.cursor.as_str())
    }

    pub fn end_cursor(&self) -> Option<&str> {
        self.edges.last().map(|edge| edge.cursor.as_str())
    }

    pub(crate) fn page_info_value(&self) -> Value {
        json!({
            "hasNextPage": self.has_next_page,
            "hasPreviousPage": self.has_previous_page,
            "startCursor": self.start_cursor(),
            "endCursor": self.end_cursor(),
        })
    }
}

/// The pagination arguments of a connection field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationArgs {
    pub first: Option<i64>,
    pub after: Option<String>,
    pub last: Option<i64>,
    pub before: Option<String>,
}

impl PaginationArgs {
    pub fn from_arguments(args: &Map<String, Value>) -> Self {
        Self {
            first: args.get("first").and_then(Value::as_i64),
            after: args.get("after").and_then(Value::as_str).map(str::to_string),
            last: args.get("last").and_then(Value::as_i64),
            before: args.get("before").and_then(Value::as_str).map(str::to_string),
        }
    }
}

pub fn offset_to_cursor(offset: usize) -> String {
    STANDARD.encode(format!("{CURSOR_PREFIX}{offset}"))
}

pub fn cursor_to_offset(cursor: &str) -> Option<i64> {
    let decoded = STANDARD.decode(cursor).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    decoded.strip_prefix(CURSOR_PREFIX)?.parse().ok()
}

/// Slices the full, ordered list of node ids of a connection field.
pub fn paginate(
    type_name: &Name,
    edge_type_name: &Name,
    nodes: Vec<String>,
    args: &PaginationArgs,
) -> Result<ConnectionPage, ResolveError> {
    let length = nodes.len() as i64;
    // Cursors come from clients: offsets outside of the list are clamped to its bounds.
    let before_offset = args
        .before
        .as_deref()
        .and_then(cursor_to_offset)
        .map_or(length, |offset| offset.clamp(-1, length));
    let after_offset = args
        .after
        .as_deref()
        .and_then(cursor_to_offset)
        .map_or(-1, |offset| offset.clamp(-1, length));

    let mut start = after_offset + 1;
    let mut end = before_offset;
    if let Some(first) = args.first {
        if first < 0 {
            return Err(ResolveError::InvalidPaginationArgument { argument: "first" });
        }
        end = end.min(start.saturating_add(first));
    }
    if let Some(last) = args.last {
        if last < 0 {
            return Err(ResolveError::InvalidPaginationArgument { argument: "last" });
        }
        start = start.max(end.saturating_sub(last));
    }

    let lower_bound = if args.after.is_some() { after_offset + 1 } else { 0 };
    let upper_bound = if args.before.is_some() { before_offset } else { length };
    let has_previous_page = args.last.is_some() && start > lower_bound;
    let has_next_page = args.first.is_some() && end < upper_bound;

    let from = start.max(0) as usize;
    let to = end.max(0) as usize;
    let edges = nodes
        .into_iter()
        .enumerate()
        .skip(from)
        .take(to.saturating_sub(from))
        .map(|(offset, node)| Edge {
            type_name: edge_type_name.clone(),
            cursor: offset_to_cursor(offset),
            node,
        })
        .collect();

    Ok(ConnectionPage {
        type_name: type_name.clone(),
        edges,
        has_previous_page,
        has_next_page,
        count: length as usize,
    })
}

/// The generated types a connection field was rewritten to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConnectionTypes {
    pub(crate) connection: Name,
    pub(crate) edge: Name,
}

pub(crate) fn is_connection(field: &FieldDefinition) -> bool {
    !field.ty.is_list() && field.ty.inner_named_type() == CONNECTION_INTERFACE
}

/// Rewrites `field` of `parent` into a connection over `node_type`, declaring the generated types
/// in `schema` when they don't exist yet.
pub(crate) fn synthesize(
    schema: &mut Schema,
    generated: &mut IndexSet<Name>,
    parent: &Name,
    field: &mut FieldDefinition,
    node_type: &Name,
) -> Result<ConnectionTypes, String> {
    let connection = Name::new(&format!("{node_type}Connection")).map_err(|e| e.to_string())?;
    let edge = Name::new(&format!("{node_type}Edge")).map_err(|e| e.to_string())?;

    declare(schema, generated, &edge, || ObjectType {
        description: None,
        name: edge.clone(),
        implements_interfaces: [ComponentName::from(name!("Edge"))].into_iter().collect(),
        directives: Default::default(),
        fields: [
            field_definition(name!("cursor"), ty!(String!)),
            field_definition(name!("node"), Type::NonNullNamed(node_type.clone())),
        ]
        .into_iter()
        .collect(),
    })?;
    declare(schema, generated, &connection, || ObjectType {
        description: None,
        name: connection.clone(),
        implements_interfaces: [ComponentName::from(name!("Connection"))]
            .into_iter()
            .collect(),
        directives: Default::default(),
        fields: [
            field_definition(name!("pageInfo"), ty!(PageInfo!)),
            field_definition(
                name!("edges"),
                Type::NonNullList(Box::new(Type::NonNullNamed(edge.clone()))),
            ),
            field_definition(name!("count"), ty!(Int)),
        ]
        .into_iter()
        .collect(),
    })?;

    let mut arguments = Vec::with_capacity(5);
    if !field.arguments.is_empty() {
        let input_name = Name::new(&format!(
            "{parent}{}Args",
            field.name.as_str().to_pascal_case()
        ))
        .map_err(|e| e.to_string())?;
        let fields: IndexMap<Name, Component<InputValueDefinition>> = field
            .arguments
            .drain(..)
            .map(|argument| (argument.name.clone(), Component::new(argument.as_ref().clone())))
            .collect();
        if schema.types.contains_key(&input_name) {
            return Err(format!(
                "The \"{input_name}\" type is already declared in the schema"
            ));
        }
        snapshot!("InputObjectType", input_name.to_string(), "generated connection arguments");
        schema.types.insert(
            input_name.clone(),
            ExtendedType::InputObject(Node::new(InputObjectType {
                description: None,
                name: input_name.clone(),
                directives: Default::default(),
                fields,
            })),
        );
        generated.insert(input_name.clone());
        arguments.push(argument_definition(name!("args"), Type::Named(input_name)));
    }
    arguments.extend([
        argument_definition(name!("first"), ty!(Int)),
        argument_definition(name!("after"), ty!(String)),
        argument_definition(name!("last"), ty!(Int)),
        argument_definition(name!("before"), ty!(String)),
    ]);
    field.arguments = arguments;
    field.ty = if field.ty.is_non_null() {
        Type::NonNullNamed(connection.clone())
    } else {
        Type::Named(connection.clone())
    };

    Ok(ConnectionTypes { connection, edge })
}

fn declare(
    schema: &mut Schema,
    generated: &mut IndexSet<Name>,
    type_name: &Name,
    build: impl FnOnce() -> ObjectType,
) -> Result<(), String> {
    if generated.contains(type_name) {
        return Ok(());
    }
    if schema.types.contains_key(type_name) {
        return Err(format!(
            "The \"{type_name}\" type is already declared in the schema"
        ));
    }
    tracing::trace!(type_name = %type_name, "generating connection type");
    schema
        .types
        .insert(type_name.clone(), ExtendedType::Object(Node::new(build())));
    generated.insert(type_name.clone());
    Ok(())
}

fn field_definition(name: Name, ty: Type) -> (Name, Component<FieldDefinition>) {
    (
        name.clone(),
        Component::new(FieldDefinition {
            description: None,
            name,
            arguments: Vec::new(),
            ty,
            directives: Default::default(),
        }),
    )
}

fn argument_definition(name: Name, ty: Type) -> Node<InputValueDefinition> {
    Node::new(InputValueDefinition {
        description: None,
        name,
        ty: Node::new(ty),
        default_value: None,
        directives: Default::default(),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn nodes(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("node-{i}")).collect()
    }

    fn page(count: usize, args: PaginationArgs) -> ConnectionPage {
        paginate(&name!("EntityConnection"), &name!("EntityEdge"), nodes(count), &args).unwrap()
    }

    fn node_names(page: &ConnectionPage) -> Vec<&str> {
        page.edges.iter().map(|edge| edge.node.as_str()).collect()
    }

    #[test]
    fn cursors_round_trip() {
        assert_eq!(offset_to_cursor(0), "YXJyYXljb25uZWN0aW9uOjA=");
        assert_eq!(cursor_to_offset(&offset_to_cursor(17)), Some(17));
        assert_eq!(cursor_to_offset("not a cursor"), None);
    }

    #[test]
    fn first_takes_from_the_start() {
        let page = page(
            5,
            PaginationArgs {
                first: Some(2),
                ..Default::default()
            },
        );
        assert_eq!(node_names(&page), vec!["node-0", "node-1"]);
        assert_eq!(page.count, 5);
        assert!(page.has_next_page);
        assert!(!page.has_previous_page);
        assert_eq!(page.start_cursor(), Some(offset_to_cursor(0).as_str()));
        assert_eq!(page.end_cursor(), Some(offset_to_cursor(1).as_str()));
    }

    #[test]
    fn after_skips_past_the_cursor() {
        let page = page(
            3,
            PaginationArgs {
                first: Some(2),
                after: Some(offset_to_cursor(0)),
                ..Default::default()
            },
        );
        assert_eq!(node_names(&page), vec!["node-1", "node-2"]);
        assert!(!page.has_next_page);
        assert_eq!(page.count, 3);
    }

    #[test]
    fn last_takes_from_the_end() {
        let page = page(
            5,
            PaginationArgs {
                last: Some(2),
                before: Some(offset_to_cursor(4)),
                ..Default::default()
            },
        );
        assert_eq!(node_names(&page), vec!["node-2", "node-3"]);
        assert!(page.has_previous_page);
        assert!(!page.has_next_page);
    }

    #[rstest]
    #[case(PaginationArgs::default(), 4)]
    #[case(PaginationArgs { first: Some(10), ..Default::default() }, 4)]
    #[case(PaginationArgs { first: Some(0), ..Default::default() }, 0)]
    #[case(PaginationArgs { after: Some(offset_to_cursor(3)), ..Default::default() }, 0)]
    #[case(PaginationArgs { after: Some("garbage".into()), ..Default::default() }, 4)]
    #[case(PaginationArgs { after: Some(offset_to_cursor(2)), before: Some(offset_to_cursor(1)), ..Default::default() }, 0)]
    fn edge_counts(#[case] args: PaginationArgs, #[case] expected: usize) {
        let page = page(4, args);
        assert_eq!(page.edges.len(), expected);
        assert_eq!(page.count, 4);
    }

    #[rstest]
    #[case::after_past_the_end(PaginationArgs { after: Some(STANDARD.encode("arrayconnection:9223372036854775807")), ..Default::default() }, 0)]
    #[case::after_before_the_start(PaginationArgs { after: Some(STANDARD.encode("arrayconnection:-9223372036854775808")), ..Default::default() }, 4)]
    #[case::before_before_the_start(PaginationArgs { before: Some(STANDARD.encode("arrayconnection:-9223372036854775808")), last: Some(1), ..Default::default() }, 0)]
    #[case::before_past_the_end(PaginationArgs { before: Some(STANDARD.encode("arrayconnection:9223372036854775807")), last: Some(1), ..Default::default() }, 1)]
    #[case::huge_first(PaginationArgs { first: Some(i64::MAX), after: Some(offset_to_cursor(1)), ..Default::default() }, 2)]
    #[case::huge_last(PaginationArgs { last: Some(i64::MAX), before: Some(offset_to_cursor(2)), ..Default::default() }, 2)]
    fn extreme_cursors_are_clamped(#[case] args: PaginationArgs, #[case] expected: usize) {
        let page = page(4, args);
        assert_eq!(page.edges.len(), expected);
        assert_eq!(page.count, 4);
    }

    #[test]
    fn negative_limits_are_rejected() {
        let error = paginate(
            &name!("EntityConnection"),
            &name!("EntityEdge"),
            nodes(2),
            &PaginationArgs {
                first: Some(-1),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Argument \"first\" must be a non-negative integer"
        );
    }

    #[test]
    fn page_info_is_exposed_as_plain_data() {
        let page = page(
            1,
            PaginationArgs {
                first: Some(1),
                ..Default::default()
            },
        );
        assert_eq!(
            page.page_info_value(),
            json!({
                "hasNextPage": false,
                "hasPreviousPage": false,
                "startCursor": "YXJyYXljb25uZWN0aW9uOjA=",
                "endCursor": "YXJyYXljb25uZWN0aW9uOjA=",
            })
        );
    }
}
