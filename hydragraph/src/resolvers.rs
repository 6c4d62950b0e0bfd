use std::collections::HashMap;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::future::Future;
use std::sync::Arc;

use apollo_compiler::Name;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::connection::ConnectionPage;
use crate::connection::Edge;
use crate::error::ResolveError;
use crate::loader::Loader;

/// The value a field resolves to, and the parent handed to the resolvers of its sub-fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Null,
    /// Plain data, read by sub-fields without going through the loader.
    Value(Value),
    /// A node, addressed by its encoded id.
    Node(String),
    List(Vec<Resolved>),
    Connection(Arc<ConnectionPage>),
    Edge(Arc<Edge>),
}

impl Resolved {
    pub fn node(id: impl Into<String>) -> Self {
        Resolved::Node(id.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Resolved::Null | Resolved::Value(Value::Null))
    }

    /// The encoded id of a node parent.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Resolved::Node(id) => Some(id),
            _ => None,
        }
    }

    /// Resolves `field` the way a resolver-less field is resolved: by reading a property of the
    /// parent.
    pub(crate) fn property(&self, field: &str) -> Resolved {
        match self {
            Resolved::Value(Value::Object(map)) => map
                .get(field)
                .cloned()
                .map_or(Resolved::Null, Resolved::Value),
            Resolved::Connection(page) => match field {
                "edges" => Resolved::List(
                    page.edges
                        .iter()
                        .cloned()
                        .map(|edge| Resolved::Edge(Arc::new(edge)))
                        .collect(),
                ),
                "count" => Resolved::Value(json!(page.count)),
                "pageInfo" => Resolved::Value(page.page_info_value()),
                _ => Resolved::Null,
            },
            Resolved::Edge(edge) => match field {
                "cursor" => Resolved::Value(Value::String(edge.cursor.clone())),
                "node" => Resolved::Node(edge.node.clone()),
                _ => Resolved::Null,
            },
            _ => Resolved::Null,
        }
    }
}

/// Per-request state shared by every resolver of one execution.
#[derive(Debug, Clone)]
pub struct RequestContext {
    loader: Loader,
}

impl RequestContext {
    pub fn new(loader: Loader) -> Self {
        Self { loader }
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }
}

/// Everything a field resolver is called with.
#[derive(Debug, Clone)]
pub struct ResolverArgs {
    pub parent: Resolved,
    pub args: Map<String, Value>,
    pub context: RequestContext,
}

pub type ResolverFuture = BoxFuture<'static, Result<Resolved, ResolveError>>;

/// Resolves one field.
#[derive(Clone)]
pub struct FieldResolver(Arc<dyn Fn(ResolverArgs) -> ResolverFuture + Send + Sync>);

impl FieldResolver {
    pub fn new<F, Fut>(resolve: F) -> Self
    where
        F: Fn(ResolverArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resolved, ResolveError>> + Send + 'static,
    {
        Self(Arc::new(move |args| resolve(args).boxed()))
    }

    pub fn call(&self, args: ResolverArgs) -> ResolverFuture {
        (self.0)(args)
    }
}

impl Debug for FieldResolver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("FieldResolver")
    }
}

pub type TypeResolverFuture = BoxFuture<'static, Result<Option<Name>, ResolveError>>;

/// Picks the concrete object type of an abstract (interface or union) value.
#[derive(Clone)]
pub struct TypeResolver(Arc<dyn Fn(Resolved, RequestContext) -> TypeResolverFuture + Send + Sync>);

impl TypeResolver {
    pub fn new<F, Fut>(resolve: F) -> Self
    where
        F: Fn(Resolved, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Name>, ResolveError>> + Send + 'static,
    {
        Self(Arc::new(move |parent, context| {
            resolve(parent, context).boxed()
        }))
    }

    pub fn call(&self, parent: Resolved, context: RequestContext) -> TypeResolverFuture {
        (self.0)(parent, context)
    }
}

impl Debug for TypeResolver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("TypeResolver")
    }
}

/// Field resolvers keyed by type name, then field name.
#[derive(Debug, Clone, Default)]
pub struct FieldResolvers {
    by_type: HashMap<Name, HashMap<Name, FieldResolver>>,
}

impl FieldResolvers {
    pub fn get(&self, type_name: &str, field_name: &str) -> Option<&FieldResolver> {
        self.by_type.get(type_name)?.get(field_name)
    }

    /// Returns the previously registered resolver, if any.
    pub fn insert(
        &mut self,
        type_name: Name,
        field_name: Name,
        resolver: FieldResolver,
    ) -> Option<FieldResolver> {
        self.by_type
            .entry(type_name)
            .or_default()
            .insert(field_name, resolver)
    }

    pub fn remove(&mut self, type_name: &str, field_name: &str) -> Option<FieldResolver> {
        self.by_type.get_mut(type_name)?.remove(field_name)
    }

    /// Makes `to.field` resolve the way `from.field` does, unless `to.field` has a resolver of its
    /// own.
    pub(crate) fn inherit(&mut self, from: &str, to: &Name, field_name: &Name) {
        if self.get(to, field_name).is_some() {
            return;
        }
        if let Some(resolver) = self.get(from, field_name).cloned() {
            self.insert(to.clone(), field_name.clone(), resolver);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Name, &FieldResolver)> {
        self.by_type.iter().flat_map(|(type_name, fields)| {
            fields
                .iter()
                .map(move |(field_name, resolver)| (type_name, field_name, resolver))
        })
    }
}
