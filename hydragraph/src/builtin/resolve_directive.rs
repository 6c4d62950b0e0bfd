use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::ast::Directive;
use apollo_compiler::name;
use apollo_compiler::schema::ExtendedType;
use serde_json::Value;

use crate::connection::ARGS_ARGUMENT;
use crate::connection::ConnectionTypes;
use crate::connection::PaginationArgs;
use crate::connection::is_connection;
use crate::connection::paginate;
use crate::connection::synthesize;
use crate::error::ResolveError;
use crate::fragment::FieldDirectiveHandler;
use crate::fragment::FieldSite;
use crate::identity::NodeId;
use crate::identity::NodeQuery;
use crate::identity::SEPARATOR;
use crate::identity::decode_id;
use crate::path::FieldPaths;
use crate::resolvers::FieldResolver;
use crate::resolvers::Resolved;
use crate::resolvers::ResolverArgs;
use crate::utils::value::shape;

/// `@resolve(at: ..., from: ..., nodeType: ...)`: resolves the field to other nodes, minting their
/// ids from references found in the backing record of the parent node.
pub(crate) struct ResolveDirective;

#[derive(Debug)]
enum Cardinality {
    Single,
    List,
    Connection(ConnectionTypes),
}

#[derive(Debug)]
struct RelatedNodes {
    field_name: Name,
    typename: Name,
    at: Option<FieldPaths>,
    from: Option<String>,
    cardinality: Cardinality,
}

fn string_argument<'a>(directive: &'a Directive, argument: &str) -> Result<Option<&'a str>, String> {
    match directive.specified_argument_by_name(argument) {
        None => Ok(None),
        Some(value) => value.as_str().map(Some).ok_or_else(|| {
            format!("The \"{argument}\" argument of @resolve directive must be a string")
        }),
    }
}

impl FieldDirectiveHandler for ResolveDirective {
    fn apply(&self, site: &mut FieldSite<'_>, directive: &Directive) -> Result<(), String> {
        let at = directive
            .specified_argument_by_name("at")
            .map(|at| FieldPaths::from_argument(at))
            .transpose()
            .map_err(|_| {
                String::from(
                    "The \"at\" argument of @resolve directive must be a string or an array of strings",
                )
            })?;
        let from = string_argument(directive, "from")?;
        if let Some(from) = from {
            if from.is_empty() || from.contains(SEPARATOR) {
                return Err(format!(
                    "The \"from\" argument of @resolve directive must be a non-empty source name without '{SEPARATOR}', but got \"{from}\""
                ));
            }
        }
        let node_type = string_argument(directive, "nodeType")?;

        let (typename, cardinality) = if is_connection(site.definition) {
            if at.is_none() {
                return Err(String::from(
                    "The \"at\" argument of @resolve directive must be specified for a connection field",
                ));
            }
            let node_type = match node_type {
                Some(node_type) => {
                    let node_type = Name::new(node_type).map_err(|error| error.to_string())?;
                    match site.schema.types.get(&node_type) {
                        Some(ExtendedType::Object(_) | ExtendedType::Interface(_)) => node_type,
                        Some(_) => {
                            return Err(format!(
                                "The \"{node_type}\" type in `@resolve(nodeType: \"{node_type}\")` is not an object type or interface"
                            ));
                        }
                        None => {
                            return Err(format!(
                                "The \"{node_type}\" type in `@resolve(nodeType: \"{node_type}\")` is not defined in the schema"
                            ));
                        }
                    }
                }
                None => name!("Node"),
            };
            let types = synthesize(
                site.schema,
                site.generated,
                site.type_name,
                site.definition,
                &node_type,
            )?;
            (node_type, Cardinality::Connection(types))
        } else if site.definition.ty.is_list() {
            if at.is_none() {
                return Err(String::from(
                    "The \"at\" argument of @resolve directive must be specified for a list field",
                ));
            }
            (site.definition.ty.inner_named_type().clone(), Cardinality::List)
        } else {
            (site.definition.ty.inner_named_type().clone(), Cardinality::Single)
        };

        let resolver = Arc::new(RelatedNodes {
            field_name: site.field_name().clone(),
            typename,
            at,
            from: from.map(str::to_string),
            cardinality,
        });
        site.resolver = Some(FieldResolver::new(move |args| {
            let resolver = resolver.clone();
            async move { resolver.resolve(args).await }
        }));
        Ok(())
    }
}

impl RelatedNodes {
    async fn resolve(&self, args: ResolverArgs) -> Result<Resolved, ResolveError> {
        let ResolverArgs {
            parent,
            args,
            context,
        } = args;
        // Root fields have no parent node: they can only mint ids from their arguments and `from`.
        let parent_id = match parent {
            Resolved::Node(id) => Some(id),
            _ => None,
        };
        if self.at.as_ref().is_some_and(FieldPaths::is_id) {
            return Ok(parent_id.map_or(Resolved::Null, Resolved::Node));
        }

        let source = match (&self.from, &parent_id) {
            (Some(from), _) => from.clone(),
            (None, Some(parent_id)) => decode_id(parent_id)?.source,
            (None, None) => return Ok(Resolved::Null),
        };
        let node_args = match self.cardinality {
            Cardinality::Connection(_) => args
                .get(ARGS_ARGUMENT)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            _ => args.clone(),
        };
        let mint = |reference: Option<String>| {
            NodeId::new(
                source.clone(),
                self.typename.as_str(),
                NodeQuery {
                    reference,
                    args: Some(node_args.clone()),
                },
            )
            .encode()
        };

        let Some(at) = &self.at else {
            return Ok(Resolved::Node(mint(None)));
        };
        let Some(parent_id) = parent_id else {
            return Ok(Resolved::Null);
        };
        let Some(record) = context.loader().load(&parent_id).await? else {
            return Ok(Resolved::Null);
        };
        let Some(reference) = at.lookup(&record) else {
            return Ok(Resolved::Null);
        };

        match &self.cardinality {
            Cardinality::Single => match reference {
                Value::String(reference) if reference.is_empty() => Ok(Resolved::Null),
                Value::String(reference) => Ok(Resolved::Node(mint(Some(reference)))),
                other => Err(self.invalid_shape("a string", &other)),
            },
            Cardinality::List => Ok(Resolved::List(
                self.references(reference)?
                    .into_iter()
                    .map(|reference| Resolved::Node(mint(Some(reference))))
                    .collect(),
            )),
            Cardinality::Connection(types) => {
                let nodes = self
                    .references(reference)?
                    .into_iter()
                    .map(|reference| mint(Some(reference)))
                    .collect();
                let page = paginate(
                    &types.connection,
                    &types.edge,
                    nodes,
                    &PaginationArgs::from_arguments(&args),
                )?;
                Ok(Resolved::Connection(Arc::new(page)))
            }
        }
    }

    fn references(&self, value: Value) -> Result<Vec<String>, ResolveError> {
        let Value::Array(items) = value else {
            return Err(self.invalid_shape("an array of strings", &value));
        };
        // Empty references point nowhere and are dropped.
        items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(reference) if reference.is_empty() => None,
                Value::String(reference) => Some(Ok(reference)),
                other => Some(Err(self.invalid_shape("an array of strings", &other))),
            })
            .collect()
    }

    fn invalid_shape(&self, expected: &'static str, observed: &Value) -> ResolveError {
        ResolveError::InvalidReferenceShape {
            field_name: self.field_name.clone(),
            expected,
            observed: shape(observed),
        }
    }
}
