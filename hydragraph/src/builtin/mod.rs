//! The built-in fragment: directive definitions, the `Node` root interface, connection
//! interfaces and the `node`/`nodes` root fields.

mod field_directive;
mod resolve_directive;

use apollo_compiler::name;
use serde_json::Value;

pub(crate) use self::field_directive::FieldDirective;
pub(crate) use self::resolve_directive::ResolveDirective;
use crate::error::ResolveError;
use crate::fragment::SchemaFragment;
use crate::resolvers::FieldResolver;
use crate::resolvers::Resolved;
use crate::resolvers::ResolverArgs;

pub const NODE_INTERFACE: &str = "Node";

pub(crate) const IMPLEMENTS_DIRECTIVE: &str = "implements";
pub(crate) const DISCRIMINATES_DIRECTIVE: &str = "discriminates";
pub(crate) const DISCRIMINATION_ALIAS_DIRECTIVE: &str = "discriminationAlias";

pub const CORE_SDL: &str = r#"
scalar _DirectiveArgument_

directive @field(at: _DirectiveArgument_, default: _DirectiveArgument_) on FIELD_DEFINITION
directive @discriminates(with: _DirectiveArgument_, opaqueType: String) on INTERFACE
directive @discriminationAlias(value: String!, type: String!) repeatable on INTERFACE
directive @resolve(at: _DirectiveArgument_, nodeType: String, from: String) on FIELD_DEFINITION
directive @implements(interface: String!) on OBJECT | INTERFACE

interface Node {
  id: ID!
}

type PageInfo {
  hasNextPage: Boolean!
  hasPreviousPage: Boolean!
  startCursor: String
  endCursor: String
}

interface Connection {
  pageInfo: PageInfo!
  edges: [Edge!]!
  count: Int
}

interface Edge {
  cursor: String!
  node: Node!
}

type Query {
  node(id: ID!): Node
  nodes(ids: [ID!]!): [Node]!
}
"#;

/// The fragment every graph is assembled with, always first.
pub fn core_fragment() -> SchemaFragment {
    SchemaFragment::new("core")
        .sdl("core.graphql", CORE_SDL)
        .directive(name!("field"), FieldDirective)
        .directive(name!("resolve"), ResolveDirective)
        .field_resolver(name!("Node"), name!("id"), FieldResolver::new(node_id))
        .field_resolver(name!("Query"), name!("node"), FieldResolver::new(node))
        .field_resolver(name!("Query"), name!("nodes"), FieldResolver::new(nodes))
}

/// The id of an existing node, `null` when its source doesn't know it.
async fn node_id(
    ResolverArgs {
        parent, context, ..
    }: ResolverArgs,
) -> Result<Resolved, ResolveError> {
    let Resolved::Node(id) = parent else {
        return Ok(parent.property("id"));
    };
    Ok(match context.loader().load(&id).await? {
        Some(_) => Resolved::Value(Value::String(id)),
        None => Resolved::Null,
    })
}

async fn node(ResolverArgs { args, .. }: ResolverArgs) -> Result<Resolved, ResolveError> {
    Ok(args
        .get("id")
        .and_then(Value::as_str)
        .map_or(Resolved::Null, Resolved::node))
}

async fn nodes(ResolverArgs { args, .. }: ResolverArgs) -> Result<Resolved, ResolveError> {
    let ids = args.get("ids").and_then(Value::as_array);
    Ok(Resolved::List(
        ids.into_iter()
            .flatten()
            .map(|id| id.as_str().map_or(Resolved::Null, Resolved::node))
            .collect(),
    ))
}
