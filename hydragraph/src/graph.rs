use std::collections::HashMap;
use std::fmt::Debug;
use std::fmt::Formatter;

use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::validation::Valid;
use serde_json::Map;
use serde_json::Value;

use crate::discrimination::TypeResolution;
use crate::discrimination::resolve_type;
use crate::error::ResolveError;
use crate::resolvers::FieldResolver;
use crate::resolvers::FieldResolvers;
use crate::resolvers::RequestContext;
use crate::resolvers::ResolverArgs;
use crate::resolvers::Resolved;

/// The transformed, validated schema together with the resolvers its fields and abstract types
/// execute with. Immutable once assembled.
pub struct ExecutableGraph {
    schema: Valid<Schema>,
    field_resolvers: FieldResolvers,
    type_resolutions: HashMap<Name, TypeResolution>,
}

impl Debug for ExecutableGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutableGraph")
            .field("types", &self.schema.types.len())
            .field("type_resolutions", &self.type_resolutions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ExecutableGraph {
    pub(crate) fn new(
        schema: Valid<Schema>,
        field_resolvers: FieldResolvers,
        type_resolutions: HashMap<Name, TypeResolution>,
    ) -> Self {
        Self {
            schema,
            field_resolvers,
            type_resolutions,
        }
    }

    pub fn schema(&self) -> &Valid<Schema> {
        &self.schema
    }

    pub fn field_resolver(&self, type_name: &str, field_name: &str) -> Option<&FieldResolver> {
        self.field_resolvers.get(type_name, field_name)
    }

    /// Resolves `field_name` of a `type_name` parent. Fields without a resolver read the property
    /// of the same name from the parent.
    pub async fn resolve_field(
        &self,
        type_name: &str,
        field_name: &str,
        parent: Resolved,
        args: Map<String, Value>,
        context: &RequestContext,
    ) -> Result<Resolved, ResolveError> {
        match self.field_resolver(type_name, field_name) {
            Some(resolver) => {
                resolver
                    .call(ResolverArgs {
                        parent,
                        args,
                        context: context.clone(),
                    })
                    .await
            }
            None => Ok(parent.property(field_name)),
        }
    }

    /// The concrete object type of a value of the `abstract_type` interface or union, `None` when it
    /// can't be told.
    pub async fn resolve_type(
        &self,
        abstract_type: &str,
        value: &Resolved,
        context: &RequestContext,
    ) -> Result<Option<Name>, ResolveError> {
        if !self.type_resolutions.contains_key(abstract_type) {
            return Ok(match value {
                Resolved::Connection(page) => Some(page.type_name.clone()),
                Resolved::Edge(edge) => Some(edge.type_name.clone()),
                _ => None,
            });
        }
        resolve_type(
            &self.schema,
            &self.type_resolutions,
            abstract_type,
            value,
            context,
        )
        .await
    }
}
