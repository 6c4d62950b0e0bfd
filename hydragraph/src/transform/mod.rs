//! The schema transformation pipeline.
//!
//! Stages run in order over one [`TransformContext`], each failing with every error it found:
//!
//! 1. collect `@implements` edges ([`implements`]);
//! 2. check that every implementation hangs off the `Node` chain ([`implements`]);
//! 3. apply field directive handlers ([`fields`]);
//! 4. merge inherited fields into interfaces, generate opaque and alias types and build the
//!    discrimination table ([`interfaces`]);
//! 5. merge inherited fields into objects ([`objects`]);
//! 6. expand unions over discriminated interfaces ([`unions`]);
//!
//! and the result is validated before it's handed out as an [`ExecutableGraph`].

mod fields;
mod implements;
mod interfaces;
mod objects;
mod unions;

use std::collections::HashMap;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ExtendedType;
use indexmap::IndexMap;

use crate::ExecutableGraph;
use crate::config::TransformOptions;
use crate::discrimination::TypeResolution;
use crate::error::MultipleTransformErrors;
use crate::error::SingleTransformError;
use crate::error::TransformError;
use crate::error::TypeKind;
use crate::fragment::FieldDirectiveHandler;
use crate::fragment::SchemaFragment;
use crate::resolvers::FieldResolvers;
use crate::resolvers::TypeResolver;
use crate::utils::logging::snapshot;

/// A type taking part in the `@implements` graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Implementation {
    /// The interface named by its own `@implements`.
    pub(crate) implements: Option<Name>,
    /// The types naming it in their `@implements`.
    pub(crate) children: IndexSet<Name>,
}

/// The mutable state every stage reads and rewrites.
pub(crate) struct TransformContext {
    pub(crate) schema: Schema,
    pub(crate) options: TransformOptions,
    pub(crate) directive_handlers: IndexMap<Name, Arc<dyn FieldDirectiveHandler>>,
    pub(crate) field_resolvers: FieldResolvers,
    pub(crate) type_resolvers: HashMap<Name, TypeResolver>,
    pub(crate) implementations: IndexMap<Name, Implementation>,
    /// Types declared by the pipeline itself.
    pub(crate) generated: IndexSet<Name>,
    pub(crate) resolutions: HashMap<Name, TypeResolution>,
}

impl TransformContext {
    /// Merges the fragments into one raw schema and one set of registries.
    pub(crate) fn assemble(
        fragments: Vec<SchemaFragment>,
        options: TransformOptions,
    ) -> Result<Self, TransformError> {
        let mut builder = Schema::builder().adopt_orphan_extensions();
        let mut errors = MultipleTransformErrors::new();
        let mut directive_handlers: IndexMap<Name, Arc<dyn FieldDirectiveHandler>> =
            IndexMap::new();
        let mut field_resolvers = FieldResolvers::default();
        let mut type_resolvers = HashMap::new();

        for fragment in fragments {
            tracing::debug!(fragment = fragment.name(), "assembling schema fragment");
            for (path, source) in &fragment.sources {
                builder = builder.parse(source, path);
            }
            for (directive, handler) in fragment.directive_handlers {
                if directive_handlers.contains_key(&directive) {
                    errors.push(SingleTransformError::DuplicateDirectiveHandler { directive });
                } else {
                    directive_handlers.insert(directive, handler);
                }
            }
            for (type_name, field_name, resolver) in fragment.field_resolvers {
                if field_resolvers.get(&type_name, &field_name).is_some() {
                    errors.push(SingleTransformError::DuplicateFieldResolver {
                        type_name,
                        field_name,
                    });
                } else {
                    field_resolvers.insert(type_name, field_name, resolver);
                }
            }
            for (type_name, resolver) in fragment.type_resolvers {
                if type_resolvers.contains_key(&type_name) {
                    errors.push(SingleTransformError::DuplicateTypeResolver { type_name });
                } else {
                    type_resolvers.insert(type_name, resolver);
                }
            }
        }

        let schema = builder.build()?;
        errors.into_result()?;
        Ok(Self {
            schema,
            options,
            directive_handlers,
            field_resolvers,
            type_resolvers,
            implementations: IndexMap::new(),
            generated: Default::default(),
            resolutions: HashMap::new(),
        })
    }

    pub(crate) fn run(mut self) -> Result<ExecutableGraph, TransformError> {
        implements::collect_implements(&mut self)?;
        snapshot!(
            "Implementations",
            format!("{:?}", self.implementations),
            "collected @implements edges"
        );
        implements::check_chain(&self)?;
        fields::apply_field_directives(&mut self)?;
        interfaces::map_interfaces(&mut self)?;
        objects::map_objects(&mut self)?;
        unions::map_unions(&mut self)?;
        self.attach_custom_type_resolvers()?;
        snapshot!("Schema", self.schema.to_string(), "transformed schema");

        let schema = self.schema.validate()?;
        tracing::debug!(
            types = schema.types.len(),
            generated = self.generated.len(),
            "schema transformed"
        );
        Ok(ExecutableGraph::new(
            schema,
            self.field_resolvers,
            self.resolutions,
        ))
    }

    /// Explicit type resolvers of abstract types the pipeline left alone.
    fn attach_custom_type_resolvers(&mut self) -> Result<(), TransformError> {
        for (type_name, resolver) in std::mem::take(&mut self.type_resolvers) {
            // Conflicts are reported by the stage generating the resolution.
            if self.resolutions.contains_key(&type_name) {
                return Err(TransformError::internal(format!(
                    "\"{type_name}\" got two type resolutions"
                )));
            }
            self.resolutions
                .insert(type_name, TypeResolution::Custom(resolver));
        }
        Ok(())
    }

    /// Fails when an explicit type resolver was registered for a type the pipeline generates
    /// one for.
    pub(crate) fn check_resolver_authority(
        &self,
        kind: TypeKind,
        type_name: &Name,
    ) -> Result<(), SingleTransformError> {
        if self.type_resolvers.contains_key(type_name) {
            return Err(SingleTransformError::ConflictingTypeResolver {
                kind,
                type_name: type_name.clone(),
            });
        }
        Ok(())
    }

    /// Names of the object and interface types, in schema order.
    pub(crate) fn composite_type_names(&self) -> Vec<Name> {
        self.schema
            .types
            .iter()
            .filter(|(_, ty)| matches!(ty, ExtendedType::Object(_) | ExtendedType::Interface(_)))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub(crate) fn type_names(&self, filter: impl Fn(&ExtendedType) -> bool) -> Vec<Name> {
        self.schema
            .types
            .iter()
            .filter(|(_, ty)| filter(ty))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// The `@`-directive of a type, if any.
pub(crate) fn type_directive<'a>(ty: &'a ExtendedType, name: &str) -> Option<&'a Directive> {
    ty.directives().get(name).map(|directive| &*directive.node)
}

pub(crate) fn fields_of(
    ty: &ExtendedType,
) -> Option<&apollo_compiler::collections::IndexMap<Name, Component<FieldDefinition>>> {
    match ty {
        ExtendedType::Object(object) => Some(&object.fields),
        ExtendedType::Interface(interface) => Some(&interface.fields),
        _ => None,
    }
}

/// The interfaces a type declares with the `implements` keyword.
pub(crate) fn native_interfaces(ty: &ExtendedType) -> Vec<Name> {
    match ty {
        ExtendedType::Object(object) => object
            .implements_interfaces
            .iter()
            .map(|interface| interface.name.clone())
            .collect(),
        ExtendedType::Interface(interface) => interface
            .implements_interfaces
            .iter()
            .map(|interface| interface.name.clone())
            .collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn kind_of(ty: &ExtendedType) -> TypeKind {
    match ty {
        ExtendedType::Interface(_) => TypeKind::Interface,
        ExtendedType::Union(_) => TypeKind::Union,
        _ => TypeKind::Object,
    }
}
