use apollo_compiler::schema::ExtendedType;
use indexmap::IndexSet;

use super::TransformContext;
use super::interfaces::merged_fields;
use super::interfaces::rewrite_composite;
use super::native_interfaces;
use crate::error::MultipleTransformErrors;
use crate::error::SingleTransformError;
use crate::error::TransformError;
use crate::error::TypeKind;

/// Merges the fields of the implemented interface into every object using `@implements`.
#[tracing::instrument(level = "trace", skip_all)]
pub(super) fn map_objects(context: &mut TransformContext) -> Result<(), TransformError> {
    let mut errors = MultipleTransformErrors::new();

    for object in context.type_names(|ty| matches!(ty, ExtendedType::Object(_))) {
        let Some(implemented) = context
            .implementations
            .get(&object)
            .and_then(|implementation| implementation.implements.clone())
        else {
            continue;
        };
        let (Some(ty), Some(ExtendedType::Interface(interface))) = (
            context.schema.types.get(&object),
            context.schema.types.get(&implemented),
        ) else {
            continue;
        };
        let natives = native_interfaces(ty);
        if natives
            .iter()
            .any(|native| context.implementations.contains_key(native))
        {
            errors.push(SingleTransformError::NativeImplementationInChain {
                kind: TypeKind::Object,
                type_name: object,
            });
            continue;
        }

        let mut interfaces = IndexSet::new();
        interfaces.insert(implemented.clone());
        interfaces.extend(
            interface
                .implements_interfaces
                .iter()
                .map(|interface| interface.name.clone()),
        );
        interfaces.extend(natives);
        let interfaces: Vec<_> = interfaces.into_iter().collect();

        // Only the implemented interface contributes fields: it already holds its whole chain.
        let fields = merged_fields(context, &object, &interfaces[..1]);
        tracing::trace!(%object, %implemented, fields = fields.len(), "merging implemented fields");
        rewrite_composite(context, &object, &interfaces, fields);
    }

    errors.into_result()
}
