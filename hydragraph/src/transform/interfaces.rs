use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ComponentName;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::ObjectType;

use super::TransformContext;
use super::fields_of;
use super::native_interfaces;
use super::type_directive;
use crate::builtin::DISCRIMINATES_DIRECTIVE;
use crate::builtin::DISCRIMINATION_ALIAS_DIRECTIVE;
use crate::builtin::NODE_INTERFACE;
use crate::discrimination::Discrimination;
use crate::discrimination::TypeResolution;
use crate::error::MultipleTransformErrors;
use crate::error::SingleTransformError;
use crate::error::TransformError;
use crate::error::TypeKind;
use crate::path::FieldPaths;

/// What a valid `@discriminates` interface resolves with.
struct Discriminates {
    directive: Option<Directive>,
    with: Option<FieldPaths>,
    aliases: IndexMap<String, Name>,
    opaque: Option<Name>,
}

/// Merges inherited fields into every interface of the `@implements` graph, generates its opaque
/// and alias types and records how its implementations are told apart.
#[tracing::instrument(level = "trace", skip_all)]
pub(super) fn map_interfaces(context: &mut TransformContext) -> Result<(), TransformError> {
    let mut errors = MultipleTransformErrors::new();

    for interface in context.type_names(|ty| matches!(ty, ExtendedType::Interface(_))) {
        let Some(ty) = context.schema.types.get(&interface) else {
            continue;
        };
        let directive = type_directive(ty, DISCRIMINATES_DIRECTIVE).cloned();
        if directive.is_none() && !context.implementations.contains_key(&interface) {
            continue;
        }
        if let Err(error) = context.check_resolver_authority(TypeKind::Interface, &interface) {
            errors.push(error);
            continue;
        }
        let discriminates = match validate(context, &interface, directive) {
            Ok(discriminates) => discriminates,
            Err(error) => {
                errors.push(error);
                continue;
            }
        };

        merge_interface(context, &interface);
        if let Err(error) = generate_types(context, &interface, &discriminates) {
            errors.push(error);
            continue;
        }

        let implementation = context.implementations.get(&interface);
        let sole_implementation = implementation
            .filter(|implementation| implementation.children.len() == 1)
            .and_then(|implementation| implementation.children.first().cloned());
        let opaque = discriminates
            .opaque
            .filter(|opaque| context.schema.types.contains_key(opaque));
        tracing::debug!(
            %interface,
            with = ?discriminates.with,
            opaque = ?opaque,
            sole_implementation = ?sole_implementation,
            "interface discriminated"
        );
        context.resolutions.insert(
            interface.clone(),
            TypeResolution::Discriminate(Discrimination {
                interface,
                with: discriminates.with,
                aliases: discriminates.aliases,
                opaque,
                sole_implementation,
            }),
        );
    }

    errors.into_result()
}

fn validate(
    context: &TransformContext,
    interface: &Name,
    directive: Option<Directive>,
) -> Result<Discriminates, SingleTransformError> {
    let Some(ty) = context.schema.types.get(interface) else {
        return Err(SingleTransformError::Internal {
            message: format!("\"{interface}\" disappeared from the schema"),
        });
    };
    let implementation = context.implementations.get(interface);
    let children = implementation.map(|implementation| implementation.children.len());

    if native_interfaces(ty)
        .iter()
        .any(|native| context.implementations.contains_key(native))
    {
        return Err(SingleTransformError::NativeImplementationInChain {
            kind: TypeKind::Interface,
            type_name: interface.clone(),
        });
    }

    let mut aliases = Vec::new();
    for alias in ty.directives().get_all(DISCRIMINATION_ALIAS_DIRECTIVE) {
        let value = alias
            .specified_argument_by_name("value")
            .and_then(|value| value.as_str());
        let target = alias
            .specified_argument_by_name("type")
            .and_then(|value| value.as_str())
            .and_then(|target| Name::new(target).ok());
        let (Some(value), Some(target)) = (value, target) else {
            return Err(SingleTransformError::InvalidDirectiveArgument {
                message: format!(
                    "The \"value\" and \"type\" arguments in `interface {interface} @discriminationAlias(value: ..., type: ...)` must be a string and a type name"
                ),
            });
        };
        aliases.push((value.to_string(), target));
    }

    let mut with = None;
    let mut opaque = None;
    match &directive {
        None => {
            if !aliases.is_empty() {
                return Err(SingleTransformError::AliasWithoutDiscriminates {
                    interface: interface.clone(),
                });
            }
            if children.is_some_and(|children| children > 1) {
                return Err(SingleTransformError::MissingDiscriminates {
                    interface: interface.clone(),
                });
            }
        }
        Some(directive) => {
            if implementation
                .and_then(|implementation| implementation.implements.as_ref())
                .is_none()
                && interface != NODE_INTERFACE
            {
                return Err(SingleTransformError::DiscriminatesWithoutImplements {
                    interface: interface.clone(),
                });
            }

            let explicit_opaque = directive
                .specified_argument_by_name("opaqueType")
                .and_then(|value| value.as_str());
            opaque = match explicit_opaque {
                Some(opaque) => Some(Name::new(opaque).map_err(|error| {
                    SingleTransformError::InvalidDirectiveArgument {
                        message: format!(
                            "The \"opaqueType\" argument in `interface {interface} @discriminates(opaqueType: \"{opaque}\")` is not a valid type name: {error}"
                        ),
                    }
                })?),
                None if context.options.generate_opaque_types => {
                    Name::new(&format!("Opaque{interface}")).ok()
                }
                None => None,
            };

            let native_implementations: Vec<Name> = context
                .schema
                .types
                .iter()
                .filter(|(name, ty)| {
                    matches!(ty, ExtendedType::Object(_))
                        && !context.generated.contains(*name)
                        && native_interfaces(ty).contains(interface)
                })
                .map(|(name, _)| name.clone())
                .collect();
            if !native_implementations.is_empty() {
                return Err(SingleTransformError::NativeImplementationOfDiscriminated {
                    interface: interface.clone(),
                    types: native_implementations,
                });
            }

            if opaque.is_none() && children == Some(0) {
                return Err(SingleTransformError::DiscriminatesWithoutImplementations {
                    interface: interface.clone(),
                });
            }
            if let Some(opaque) = opaque
                .as_ref()
                .filter(|opaque| context.schema.types.contains_key(*opaque))
            {
                return Err(if explicit_opaque.is_some() {
                    SingleTransformError::OpaqueTypeAlreadyDeclared {
                        interface: interface.clone(),
                        type_name: opaque.clone(),
                    }
                } else {
                    SingleTransformError::GeneratedOpaqueTypeAlreadyDeclared {
                        interface: interface.clone(),
                        type_name: opaque.clone(),
                    }
                });
            }

            match directive.specified_argument_by_name("with") {
                None => {
                    if children.is_some_and(|children| children > 1) {
                        return Err(SingleTransformError::MissingDiscriminatorForImplementations {
                            interface: interface.clone(),
                        });
                    }
                    if opaque.is_none() {
                        return Err(SingleTransformError::MissingDiscriminatorForFallback {
                            interface: interface.clone(),
                        });
                    }
                }
                Some(argument) => {
                    with = Some(FieldPaths::from_argument(argument).map_err(|_| {
                        SingleTransformError::InvalidDirectiveArgument {
                            message: format!(
                                "The \"with\" argument in `interface {interface} @discriminates(with: ...)` must be a string or an array of strings"
                            ),
                        }
                    })?);
                }
            }
        }
    }

    let mut by_value: IndexMap<String, Vec<Name>> = IndexMap::default();
    for (value, target) in aliases {
        by_value.entry(value).or_default().push(target);
    }
    let ambiguous: Vec<(String, Vec<Name>)> = by_value
        .iter()
        .filter(|(_, targets)| targets.len() > 1)
        .map(|(value, targets)| (value.clone(), targets.clone()))
        .collect();
    if !ambiguous.is_empty() {
        return Err(SingleTransformError::AmbiguousAlias { aliases: ambiguous });
    }
    let aliases: IndexMap<String, Name> = by_value
        .into_iter()
        .filter_map(|(value, targets)| targets.into_iter().next().map(|target| (value, target)))
        .collect();

    let not_composite: Vec<Name> = aliases
        .values()
        .filter(|target| {
            context.schema.types.get(*target).is_some_and(|ty| {
                !matches!(ty, ExtendedType::Object(_) | ExtendedType::Interface(_))
            })
        })
        .cloned()
        .collect();
    if !not_composite.is_empty() {
        return Err(SingleTransformError::AliasTargetNotComposite {
            interface: interface.clone(),
            types: not_composite,
        });
    }
    let not_implementing: Vec<Name> = aliases
        .values()
        .filter(|target| {
            context.schema.types.contains_key(*target)
                && context
                    .implementations
                    .get(*target)
                    .and_then(|implementation| implementation.implements.as_ref())
                    != Some(interface)
        })
        .cloned()
        .collect();
    if !not_implementing.is_empty() {
        return Err(SingleTransformError::AliasTargetNotImplementing {
            interface: interface.clone(),
            types: not_implementing,
        });
    }

    Ok(Discriminates {
        directive,
        with,
        aliases,
        opaque,
    })
}

/// The interfaces `type_name` inherits: its `@implements` chain nearest first, each followed by the
/// interfaces it declares natively.
pub(super) fn inherited_interfaces(context: &TransformContext, type_name: &Name) -> Vec<Name> {
    let mut interfaces = IndexSet::default();
    let mut current = type_name.clone();
    let mut natives = Vec::new();
    loop {
        if let Some(ty) = context.schema.types.get(&current) {
            natives.push(native_interfaces(ty));
        }
        let Some(parent) = context
            .implementations
            .get(&current)
            .and_then(|implementation| implementation.implements.clone())
        else {
            break;
        };
        if !interfaces.insert(parent.clone()) {
            break;
        }
        current = parent;
    }
    // Natives of the deepest ancestor come first, those of the type itself last.
    interfaces.extend(natives.into_iter().rev().flatten());
    interfaces.into_iter().collect()
}

/// Fields of `inherited`, farthest first, overridden by the fields of `type_name` itself. Each
/// field is paired with the type it was declared on.
pub(super) fn merged_fields(
    context: &TransformContext,
    type_name: &Name,
    inherited: &[Name],
) -> IndexMap<Name, (Component<FieldDefinition>, Name)> {
    let mut merged = IndexMap::default();
    for declaring in inherited.iter().rev().chain(std::iter::once(type_name)) {
        let Some(fields) = context.schema.types.get(declaring).and_then(fields_of) else {
            continue;
        };
        for (name, field) in fields {
            let field = if declaring == type_name {
                field.clone()
            } else {
                Component::new((*field.node).clone())
            };
            merged.insert(name.clone(), (field, declaring.clone()));
        }
    }
    merged
}

/// Rewrites `type_name` to implement `interfaces` with `fields`, inheriting the resolvers of the
/// fields it doesn't declare.
pub(super) fn rewrite_composite(
    context: &mut TransformContext,
    type_name: &Name,
    interfaces: &[Name],
    fields: IndexMap<Name, (Component<FieldDefinition>, Name)>,
) {
    for (field_name, (_, declaring)) in &fields {
        if declaring != type_name {
            context
                .field_resolvers
                .inherit(declaring, type_name, field_name);
        }
    }
    let implements_interfaces: IndexSet<ComponentName> = interfaces
        .iter()
        .cloned()
        .map(ComponentName::from)
        .collect();
    let fields: IndexMap<Name, Component<FieldDefinition>> = fields
        .into_iter()
        .map(|(name, (field, _))| (name, field))
        .collect();
    match context.schema.types.get_mut(type_name) {
        Some(ExtendedType::Interface(interface)) => {
            let interface = interface.make_mut();
            interface.implements_interfaces = implements_interfaces;
            interface.fields = fields;
        }
        Some(ExtendedType::Object(object)) => {
            let object = object.make_mut();
            object.implements_interfaces = implements_interfaces;
            object.fields = fields;
        }
        _ => {}
    }
}

fn merge_interface(context: &mut TransformContext, interface: &Name) {
    let inherited = inherited_interfaces(context, interface);
    let fields = merged_fields(context, interface, &inherited);
    rewrite_composite(context, interface, &inherited, fields);
}

fn generate_types(
    context: &mut TransformContext,
    interface: &Name,
    discriminates: &Discriminates,
) -> Result<(), SingleTransformError> {
    for target in discriminates.aliases.values() {
        if context.schema.types.contains_key(target) || discriminates.opaque.as_ref() == Some(target)
        {
            continue;
        }
        generate_implementation(context, interface, target)?;
    }

    let children = context
        .implementations
        .get(interface)
        .map(|implementation| implementation.children.len());
    if let (Some(directive), Some(opaque)) = (&discriminates.directive, &discriminates.opaque) {
        if children != Some(1) || directive.specified_argument_by_name("with").is_some() {
            generate_implementation(context, interface, opaque)?;
        }
    }
    Ok(())
}

/// Declares an object implementing `interface` and everything it inherits, with its fields.
fn generate_implementation(
    context: &mut TransformContext,
    interface: &Name,
    type_name: &Name,
) -> Result<(), SingleTransformError> {
    if context.schema.types.contains_key(type_name) {
        return Err(SingleTransformError::GeneratedTypeCollision {
            type_name: type_name.clone(),
        });
    }
    let Some(ExtendedType::Interface(definition)) = context.schema.types.get(interface) else {
        return Err(SingleTransformError::Internal {
            message: format!("\"{interface}\" is not an interface"),
        });
    };
    let object = ObjectType {
        description: definition.description.clone(),
        name: type_name.clone(),
        implements_interfaces: std::iter::once(ComponentName::from(interface.clone()))
            .chain(definition.implements_interfaces.iter().cloned())
            .collect(),
        directives: Default::default(),
        fields: definition
            .fields
            .iter()
            .map(|(name, field)| (name.clone(), Component::new((*field.node).clone())))
            .collect(),
    };
    for field_name in object.fields.keys() {
        context
            .field_resolvers
            .inherit(interface, type_name, field_name);
    }
    tracing::trace!(%interface, %type_name, "generating implementation");
    context
        .schema
        .types
        .insert(type_name.clone(), ExtendedType::Object(Node::new(object)));
    context.generated.insert(type_name.clone());
    Ok(())
}
