use apollo_compiler::Name;
use apollo_compiler::schema::ExtendedType;

use super::TransformContext;
use super::kind_of;
use super::native_interfaces;
use super::type_directive;
use crate::builtin::IMPLEMENTS_DIRECTIVE;
use crate::builtin::NODE_INTERFACE;
use crate::error::MultipleTransformErrors;
use crate::error::SingleTransformError;
use crate::error::TransformError;

/// Records the `@implements` edge of every object and interface.
#[tracing::instrument(level = "trace", skip_all)]
pub(super) fn collect_implements(context: &mut TransformContext) -> Result<(), TransformError> {
    let mut errors = MultipleTransformErrors::new();

    for type_name in context.composite_type_names() {
        let Some(ty) = context.schema.types.get(&type_name) else {
            continue;
        };
        let kind = kind_of(ty);
        if native_interfaces(ty)
            .iter()
            .any(|interface| interface == NODE_INTERFACE)
        {
            errors.push(SingleTransformError::NativeRootImplementation { kind, type_name });
            continue;
        }
        let Some(directive) = type_directive(ty, IMPLEMENTS_DIRECTIVE) else {
            continue;
        };
        let Some(interface) = directive
            .specified_argument_by_name("interface")
            .and_then(|value| value.as_str())
        else {
            errors.push(SingleTransformError::InvalidDirectiveArgument {
                message: format!(
                    "The \"interface\" argument in `{} {type_name} @implements(interface: ...)` must be a string",
                    kind.keyword()
                ),
            });
            continue;
        };
        let target = match context.schema.types.get_key_value(interface) {
            None => {
                errors.push(SingleTransformError::UndefinedImplementsTarget {
                    kind,
                    type_name,
                    interface: interface.to_string(),
                });
                continue;
            }
            Some((_, ty)) if !matches!(ty, ExtendedType::Interface(_)) => {
                errors.push(SingleTransformError::ImplementsTargetNotInterface {
                    kind,
                    type_name,
                    interface: interface.to_string(),
                });
                continue;
            }
            Some((target, _)) => target.clone(),
        };

        tracing::trace!(%type_name, %target, "collected @implements edge");
        context
            .implementations
            .entry(type_name.clone())
            .or_default()
            .implements = Some(target.clone());
        context
            .implementations
            .entry(target)
            .or_default()
            .children
            .insert(type_name);
    }

    errors.into_result()
}

/// Every type taking part in `@implements` must be reachable from `Node`.
pub(super) fn check_chain(context: &TransformContext) -> Result<(), TransformError> {
    let mut remaining: Vec<Name> = context
        .implementations
        .keys()
        .filter(|name| name.as_str() != NODE_INTERFACE)
        .cloned()
        .collect();

    let mut stack: Vec<&Name> = context
        .implementations
        .get(NODE_INTERFACE)
        .map(|node| node.children.iter().collect())
        .unwrap_or_default();
    while let Some(name) = stack.pop() {
        remaining.retain(|remaining| remaining != name);
        if let Some(implementation) = context.implementations.get(name) {
            stack.extend(implementation.children.iter());
        }
    }

    if remaining.is_empty() {
        Ok(())
    } else {
        Err(SingleTransformError::BrokenImplementsChain {
            interfaces: remaining,
        }
        .into())
    }
}
