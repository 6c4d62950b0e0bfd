use std::sync::Arc;

use apollo_compiler::ast::Directive;
use serde_json::Value;

use crate::error::ResolveError;
use crate::fragment::FieldDirectiveHandler;
use crate::fragment::FieldSite;
use crate::path::FieldPath;
use crate::path::FieldPaths;
use crate::resolvers::FieldResolver;
use crate::resolvers::Resolved;
use crate::resolvers::ResolverArgs;
use crate::utils::value::to_json;

/// `@field(at: ..., default: ...)`: reads the field from the backing record of its parent node.
pub(crate) struct FieldDirective;

struct FieldFromRecord {
    at: FieldPaths,
    default: Option<Value>,
    inner: Option<FieldResolver>,
}

impl FieldDirectiveHandler for FieldDirective {
    fn apply(&self, site: &mut FieldSite<'_>, directive: &Directive) -> Result<(), String> {
        let at = match directive.specified_argument_by_name("at") {
            Some(at) => FieldPaths::from_argument(at).map_err(|_| {
                String::from(
                    "The \"at\" argument of @field directive must be a string or an array of strings",
                )
            })?,
            None => FieldPaths::single(FieldPath::parse(site.field_name())?),
        };
        let default = directive
            .specified_argument_by_name("default")
            .map(|value| to_json(value))
            .transpose()
            .map_err(|error| format!("The \"default\" argument of @field directive is invalid: {error}"))?;

        let resolver = Arc::new(FieldFromRecord {
            at,
            default,
            inner: site.resolver.take(),
        });
        site.resolver = Some(FieldResolver::new(move |args| {
            let resolver = resolver.clone();
            async move { resolver.resolve(args).await }
        }));
        Ok(())
    }
}

impl FieldFromRecord {
    async fn resolve(&self, args: ResolverArgs) -> Result<Resolved, ResolveError> {
        let ResolverArgs {
            parent,
            args,
            context,
        } = args;
        let value = match &parent {
            Resolved::Node(id) => {
                // A node without a record doesn't exist, so it has no fields to default.
                let Some(record) = context.loader().load(id).await? else {
                    return Ok(Resolved::Null);
                };
                self.at.lookup(&record)
            }
            Resolved::Value(value) => self.at.get(value).cloned(),
            _ => None,
        };
        let value = value.or_else(|| self.default.clone());
        match &self.inner {
            Some(inner) => {
                inner
                    .call(ResolverArgs {
                        parent: value.map_or(Resolved::Null, Resolved::Value),
                        args,
                        context,
                    })
                    .await
            }
            None => Ok(value.map_or(Resolved::Null, Resolved::Value)),
        }
    }
}
