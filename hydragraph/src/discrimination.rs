//! Runtime type resolution of interfaces and unions.
//!
//! Every abstract type with a generated resolution gets one entry in a dispatch table built at
//! assembly time. Resolving the concrete type of a node starts at the entry of the field's type and
//! walks down the `@implements` tree: a discriminated value naming an interface continues with that
//! interface's entry, until an object type is found.

use std::collections::HashMap;

use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::ObjectType;
use heck::ToPascalCase;
use serde_json::Value;

use crate::error::ResolveError;
use crate::identity::decode_id;
use crate::path::FieldPaths;
use crate::resolvers::RequestContext;
use crate::resolvers::Resolved;
use crate::resolvers::TypeResolver;

#[derive(Debug, Clone)]
pub(crate) enum TypeResolution {
    Discriminate(Discrimination),
    /// Resolved by the entry of another type (unions resolve through `Node`).
    Delegate(Name),
    Custom(TypeResolver),
}

/// How an interface picks the type of a node implementing it.
#[derive(Debug, Clone)]
pub(crate) struct Discrimination {
    pub(crate) interface: Name,
    pub(crate) with: Option<FieldPaths>,
    pub(crate) aliases: IndexMap<String, Name>,
    /// Used when the discriminated value doesn't name a type.
    pub(crate) opaque: Option<Name>,
    pub(crate) sole_implementation: Option<Name>,
}

enum Step {
    Done(Option<Name>),
    Descend(Name),
}

pub(crate) async fn resolve_type(
    schema: &Schema,
    table: &HashMap<Name, TypeResolution>,
    abstract_type: &str,
    value: &Resolved,
    context: &RequestContext,
) -> Result<Option<Name>, ResolveError> {
    let mut current = abstract_type.to_string();
    loop {
        match table.get(current.as_str()) {
            None => return Ok(None),
            Some(TypeResolution::Custom(resolver)) => {
                return resolver.call(value.clone(), context.clone()).await;
            }
            Some(TypeResolution::Delegate(target)) => current = target.to_string(),
            Some(TypeResolution::Discriminate(discrimination)) => {
                match discrimination.discriminate(schema, value, context).await? {
                    Step::Done(resolved) => return Ok(resolved),
                    Step::Descend(interface) => current = interface.to_string(),
                }
            }
        }
    }
}

impl Discrimination {
    async fn discriminate(
        &self,
        schema: &Schema,
        value: &Resolved,
        context: &RequestContext,
    ) -> Result<Step, ResolveError> {
        let Resolved::Node(id) = value else {
            return Ok(Step::Done(None));
        };
        let identity = decode_id(id)?;
        let source_type = schema.types.get(identity.typename.as_str());

        if let Some(with) = &self.with {
            let Some(record) = context.loader().load(id).await? else {
                return Ok(Step::Done(None));
            };
            if let Some(discriminated) = with.lookup(&record) {
                let Value::String(discriminated) = discriminated else {
                    return Err(ResolveError::DiscriminatorNotString {
                        id: id.clone(),
                        interface: self.interface.clone(),
                        value: discriminated,
                    });
                };
                let type_name = match self.aliases.get(&discriminated) {
                    Some(alias) => alias.to_string(),
                    None => discriminated,
                };
                let found = schema.types.get_key_value(type_name.as_str()).or_else(|| {
                    schema
                        .types
                        .get_key_value(type_name.to_pascal_case().as_str())
                });
                match found {
                    Some((name, ty)) => {
                        let implements_interface = match ty {
                            ExtendedType::Object(object) => implements(
                                object.implements_interfaces.iter().map(|i| &i.name),
                                &self.interface,
                            ),
                            ExtendedType::Interface(interface) => implements(
                                interface.implements_interfaces.iter().map(|i| &i.name),
                                &self.interface,
                            ),
                            _ => {
                                return Err(ResolveError::DiscriminatedTypeNotComposite {
                                    id: id.clone(),
                                    interface: self.interface.clone(),
                                    type_name: name.clone(),
                                });
                            }
                        };
                        if !implements_interface {
                            return Err(ResolveError::DiscriminatedTypeNotImplementing {
                                id: id.clone(),
                                interface: self.interface.clone(),
                                type_name: name.clone(),
                            });
                        }
                        if let ExtendedType::Object(object) = ty {
                            if source_type.is_some_and(|source| {
                                is_related(object, source, &identity.typename)
                            }) {
                                return Ok(Step::Done(Some(name.clone())));
                            }
                            return Err(ResolveError::DiscriminatedTypeUnrelated {
                                id: id.clone(),
                                interface: self.interface.clone(),
                                type_name: name.clone(),
                                encoded: identity.typename,
                            });
                        }
                        return Ok(Step::Descend(name.clone()));
                    }
                    None if self.opaque.is_none() => {
                        return Err(ResolveError::UnknownDiscriminatedType {
                            id: id.clone(),
                            interface: self.interface.clone(),
                            type_name,
                        });
                    }
                    None => {}
                }
            }
        }

        let Some(fallback) = self.opaque.as_ref().or(self.sole_implementation.as_ref()) else {
            return Ok(Step::Done(None));
        };
        Ok(match schema.types.get(fallback) {
            Some(ExtendedType::Interface(_)) => Step::Descend(fallback.clone()),
            Some(ExtendedType::Object(object))
                if source_type
                    .is_some_and(|source| is_related(object, source, &identity.typename)) =>
            {
                Step::Done(Some(fallback.clone()))
            }
            _ => Step::Done(None),
        })
    }
}

fn implements<'a>(mut interfaces: impl Iterator<Item = &'a Name>, interface: &Name) -> bool {
    interfaces.any(|name| name == interface)
}

/// The resolved object is the type the node was minted as, implements it, or is a member of it.
fn is_related(resolved: &ObjectType, source: &ExtendedType, source_name: &str) -> bool {
    resolved.name.as_str() == source_name
        || resolved
            .implements_interfaces
            .iter()
            .any(|interface| interface.name.as_str() == source_name)
        || matches!(source, ExtendedType::Union(union) if union.members.iter().any(|member| member.name == resolved.name))
}
