use std::collections::HashMap;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::collections::IndexSet;
use indexmap::IndexMap;

use crate::resolvers::FieldResolver;
use crate::resolvers::TypeResolver;

/// A field carrying a directive with a registered handler, as seen by that handler.
pub struct FieldSite<'a> {
    pub type_name: &'a Name,
    pub definition: &'a mut FieldDefinition,
    /// The resolver registered for this field before the handler ran, if any. Handlers wrap or
    /// replace it.
    pub resolver: Option<FieldResolver>,
    pub(crate) schema: &'a mut Schema,
    pub(crate) generated: &'a mut IndexSet<Name>,
}

impl FieldSite<'_> {
    pub fn field_name(&self) -> &Name {
        &self.definition.name
    }

    /// The schema being transformed.
    pub fn schema(&self) -> &Schema {
        self.schema
    }
}

/// Rewrites fields carrying one directive.
pub trait FieldDirectiveHandler: Send + Sync {
    /// Errors are reported as messages attached to the field and the directive.
    fn apply(&self, site: &mut FieldSite<'_>, directive: &Directive) -> Result<(), String>;
}

impl<F> FieldDirectiveHandler for F
where
    F: Fn(&mut FieldSite<'_>, &Directive) -> Result<(), String> + Send + Sync,
{
    fn apply(&self, site: &mut FieldSite<'_>, directive: &Directive) -> Result<(), String> {
        self(site, directive)
    }
}

/// A piece of the schema: SDL sources, the directive handlers it brings and the resolvers of its
/// fields and abstract types.
#[derive(Clone, Default)]
pub struct SchemaFragment {
    pub(crate) name: String,
    pub(crate) sources: Vec<(String, String)>,
    pub(crate) directive_handlers: IndexMap<Name, Arc<dyn FieldDirectiveHandler>>,
    pub(crate) field_resolvers: Vec<(Name, Name, FieldResolver)>,
    pub(crate) type_resolvers: HashMap<Name, TypeResolver>,
}

impl Debug for SchemaFragment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaFragment")
            .field("name", &self.name)
            .field(
                "sources",
                &self.sources.iter().map(|(path, _)| path).collect::<Vec<_>>(),
            )
            .field(
                "directive_handlers",
                &self.directive_handlers.keys().collect::<Vec<_>>(),
            )
            .field("field_resolvers", &self.field_resolvers.len())
            .field("type_resolvers", &self.type_resolvers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SchemaFragment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds SDL to this fragment. `path` is used in diagnostics.
    pub fn sdl(mut self, path: impl Into<String>, source: impl Into<String>) -> Self {
        self.sources.push((path.into(), source.into()));
        self
    }

    pub fn directive(
        mut self,
        directive: Name,
        handler: impl FieldDirectiveHandler + 'static,
    ) -> Self {
        self.directive_handlers.insert(directive, Arc::new(handler));
        self
    }

    pub fn field_resolver(mut self, type_name: Name, field_name: Name, resolver: FieldResolver) -> Self {
        self.field_resolvers.push((type_name, field_name, resolver));
        self
    }

    /// Registers the runtime type resolution of an interface or union. Types whose resolution is
    /// generated from `@implements` and `@discriminates` can't have one.
    pub fn type_resolver(mut self, type_name: Name, resolver: TypeResolver) -> Self {
        self.type_resolvers.insert(type_name, resolver);
        self
    }
}
