use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ExtendedType;

use super::TransformContext;
use super::fields_of;
use crate::error::MultipleTransformErrors;
use crate::error::SingleTransformError;
use crate::error::TransformError;
use crate::fragment::FieldSite;

/// Runs the registered directive handlers over every field of the objects and interfaces.
///
/// Types generated by a handler, like connections, are not revisited.
#[tracing::instrument(level = "trace", skip_all)]
pub(super) fn apply_field_directives(context: &mut TransformContext) -> Result<(), TransformError> {
    let mut errors = MultipleTransformErrors::new();

    for type_name in context.composite_type_names() {
        let field_names: Vec<_> = context
            .schema
            .types
            .get(&type_name)
            .and_then(fields_of)
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default();

        for field_name in field_names {
            let Some(field) = context
                .schema
                .types
                .get(&type_name)
                .and_then(fields_of)
                .and_then(|fields| fields.get(&field_name))
            else {
                continue;
            };

            let mut applicable: Vec<Node<Directive>> = Vec::new();
            for directive in field.directives.iter() {
                if context.directive_handlers.contains_key(&directive.name)
                    && !applicable.iter().any(|seen| seen.name == directive.name)
                {
                    applicable.push(directive.clone());
                }
            }
            let directive = match applicable.as_slice() {
                [] => continue,
                [directive] => directive.clone(),
                _ => {
                    errors.push(SingleTransformError::AmbiguousFieldDirectives {
                        type_name: type_name.clone(),
                        field_name,
                    });
                    continue;
                }
            };
            let Some(handler) = context.directive_handlers.get(&directive.name).cloned() else {
                continue;
            };

            let mut definition = (*field.node).clone();
            let mut site = FieldSite {
                type_name: &type_name,
                definition: &mut definition,
                resolver: context.field_resolvers.remove(&type_name, &field_name),
                schema: &mut context.schema,
                generated: &mut context.generated,
            };
            let applied = handler.apply(&mut site, &directive);
            let resolver = site.resolver.take();

            match applied {
                Ok(()) => {
                    tracing::trace!(%type_name, %field_name, directive = %directive.name, "applied field directive");
                    if let Some(fields) = fields_mut(context, &type_name) {
                        if let Some(field) = fields.get_mut(&field_name) {
                            *field.make_mut() = definition;
                        }
                    }
                }
                Err(message) => errors.push(SingleTransformError::FieldDirective {
                    directive: directive.name.clone(),
                    type_name: type_name.clone(),
                    field_name: field_name.clone(),
                    message,
                }),
            }
            if let Some(resolver) = resolver {
                context
                    .field_resolvers
                    .insert(type_name.clone(), field_name, resolver);
            }
        }
    }

    errors.into_result()
}

fn fields_mut<'a>(
    context: &'a mut TransformContext,
    type_name: &Name,
) -> Option<&'a mut IndexMap<Name, Component<FieldDefinition>>> {
    match context.schema.types.get_mut(type_name)? {
        ExtendedType::Object(object) => Some(&mut object.make_mut().fields),
        ExtendedType::Interface(interface) => Some(&mut interface.make_mut().fields),
        _ => None,
    }
}
