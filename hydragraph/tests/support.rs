use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use hydragraph::ExecutableGraph;
use hydragraph::LoaderFactory;
use hydragraph::RequestContext;
use hydragraph::Resolved;
use hydragraph::SchemaFragment;
use hydragraph::config::TransformOptions;
use hydragraph::error::FetchError;
use hydragraph::error::ResolveError;
use hydragraph::error::TransformError;
use hydragraph::identity::NodeQuery;
use hydragraph::loader::BatchLoadFn;
use hydragraph::loader::BatchResult;
use parking_lot::Mutex;
use serde_json::Map;
use serde_json::Value;

pub(crate) fn transform(sdl: &str) -> Result<ExecutableGraph, TransformError> {
    transform_with(sdl, false)
}

pub(crate) fn transform_with(
    sdl: &str,
    generate_opaque_types: bool,
) -> Result<ExecutableGraph, TransformError> {
    hydragraph::transform_schema(
        vec![SchemaFragment::new("test").sdl("test.graphql", sdl)],
        &TransformOptions {
            generate_opaque_types,
        },
    )
}

/// The message of the first error the transformation failed with.
pub(crate) fn first_error(sdl: &str, generate_opaque_types: bool) -> String {
    let error = transform_with(sdl, generate_opaque_types).expect_err("transformation fails");
    error.errors()[0].to_string()
}

pub(crate) fn field_names(graph: &ExecutableGraph, type_name: &str) -> Vec<String> {
    let ty = graph.schema().types.get(type_name).expect("type exists");
    let names: Vec<_> = match ty {
        apollo_compiler::schema::ExtendedType::Object(object) => object.fields.keys().collect(),
        apollo_compiler::schema::ExtendedType::Interface(interface) => {
            interface.fields.keys().collect()
        }
        apollo_compiler::schema::ExtendedType::InputObject(input) => input.fields.keys().collect(),
        _ => panic!("{type_name} has no fields"),
    };
    names.into_iter().map(|name| name.to_string()).collect()
}

pub(crate) fn interface_names(graph: &ExecutableGraph, type_name: &str) -> Vec<String> {
    let ty = graph.schema().types.get(type_name).expect("type exists");
    let interfaces = match ty {
        apollo_compiler::schema::ExtendedType::Object(object) => &object.implements_interfaces,
        apollo_compiler::schema::ExtendedType::Interface(interface) => {
            &interface.implements_interfaces
        }
        _ => panic!("{type_name} implements nothing"),
    };
    interfaces
        .iter()
        .map(|interface| interface.name.to_string())
        .collect()
}

/// A source answering with fixed records, keyed by `ref` or, without one, by the serialized `args`.
#[derive(Default)]
pub(crate) struct FixedSource {
    pub(crate) records: HashMap<String, Value>,
    pub(crate) batches: Mutex<Vec<Vec<NodeQuery>>>,
}

impl FixedSource {
    pub(crate) fn new<'a>(records: impl IntoIterator<Item = (&'a str, Value)>) -> Arc<Self> {
        Arc::new(Self {
            records: records
                .into_iter()
                .map(|(key, record)| (key.to_string(), record))
                .collect(),
            batches: Default::default(),
        })
    }

    pub(crate) fn fetches(&self) -> usize {
        self.batches.lock().len()
    }
}

#[async_trait]
impl BatchLoadFn<()> for FixedSource {
    async fn load(&self, queries: Vec<NodeQuery>, _context: &()) -> BatchResult {
        self.batches.lock().push(queries.clone());
        Ok(queries
            .into_iter()
            .map(|query| {
                let key = match (&query.reference, &query.args) {
                    (Some(reference), _) => reference.clone(),
                    (None, Some(args)) => Value::Object(args.clone()).to_string(),
                    (None, None) => return Err(FetchError::new("empty query")),
                };
                Ok(self.records.get(&key).cloned())
            })
            .collect())
    }
}

pub(crate) fn context<'a>(sources: impl IntoIterator<Item = (&'a str, Arc<FixedSource>)>) -> RequestContext {
    let mut factory = LoaderFactory::<()>::builder();
    for (name, source) in sources {
        factory = factory.source(name, source).expect("valid source name");
    }
    RequestContext::new(factory.build().create(()))
}

pub(crate) fn args(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Walks `path` from `parent`, resolving the concrete type of every abstract field on the way.
pub(crate) async fn resolve(
    graph: &ExecutableGraph,
    context: &RequestContext,
    type_name: &str,
    parent: Resolved,
    path: &[(&str, Value)],
) -> Result<Resolved, ResolveError> {
    let mut type_name = type_name.to_string();
    let mut current = parent;
    for (field_name, field_args) in path {
        current = graph
            .resolve_field(&type_name, field_name, current, args(field_args.clone()), context)
            .await?;
        let field_type = field_type(graph, &type_name, field_name);
        type_name = match graph.resolve_type(&field_type, &current, context).await? {
            Some(concrete) => concrete.to_string(),
            None => field_type,
        };
    }
    Ok(current)
}

pub(crate) fn field_type(graph: &ExecutableGraph, type_name: &str, field_name: &str) -> String {
    let ty = graph.schema().types.get(type_name).expect("type exists");
    let field = match ty {
        apollo_compiler::schema::ExtendedType::Object(object) => object.fields.get(field_name),
        apollo_compiler::schema::ExtendedType::Interface(interface) => {
            interface.fields.get(field_name)
        }
        _ => None,
    }
    .expect("field exists");
    field.ty.inner_named_type().to_string()
}
