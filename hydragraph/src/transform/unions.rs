use apollo_compiler::Name;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::name;
use apollo_compiler::schema::ComponentName;
use apollo_compiler::schema::ExtendedType;

use super::TransformContext;
use super::native_interfaces;
use crate::discrimination::TypeResolution;
use crate::error::MultipleTransformErrors;
use crate::error::TransformError;
use crate::error::TypeKind;

/// Replaces interface members of unions over `@implements` types by their implementations. These
/// unions resolve their members the way `Node` does.
#[tracing::instrument(level = "trace", skip_all)]
pub(super) fn map_unions(context: &mut TransformContext) -> Result<(), TransformError> {
    let mut errors = MultipleTransformErrors::new();

    for union_name in context.type_names(|ty| matches!(ty, ExtendedType::Union(_))) {
        let Some(ExtendedType::Union(union_type)) = context.schema.types.get(&union_name) else {
            continue;
        };
        if !union_type
            .members
            .iter()
            .any(|member| context.implementations.contains_key(&member.name))
        {
            continue;
        }
        if let Err(error) = context.check_resolver_authority(TypeKind::Union, &union_name) {
            errors.push(error);
            continue;
        }

        let mut members: IndexSet<ComponentName> = IndexSet::default();
        for member in &union_type.members {
            match context.schema.types.get(&member.name) {
                Some(ExtendedType::Interface(_)) => {
                    members.extend(
                        implementing_objects(context, &member.name)
                            .into_iter()
                            .map(ComponentName::from),
                    );
                }
                _ => {
                    members.insert(member.clone());
                }
            }
        }
        tracing::debug!(
            union = %union_name,
            members = members.len(),
            "union resolved through Node"
        );
        if let Some(ExtendedType::Union(union_type)) = context.schema.types.get_mut(&union_name) {
            union_type.make_mut().members = members;
        }
        context
            .resolutions
            .insert(union_name, TypeResolution::Delegate(name!("Node")));
    }

    errors.into_result()
}

fn implementing_objects(context: &TransformContext, interface: &Name) -> Vec<Name> {
    context
        .schema
        .types
        .iter()
        .filter(|(_, ty)| {
            matches!(ty, ExtendedType::Object(_)) && native_interfaces(ty).contains(interface)
        })
        .map(|(name, _)| name.clone())
        .collect()
}
