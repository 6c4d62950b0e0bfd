use std::fmt::Display;
use std::fmt::Formatter;

use apollo_compiler::Name;
use apollo_compiler::validation::DiagnosticList;
use apollo_compiler::validation::WithErrors;
use itertools::Itertools;

/// The kind of a type definition, as it is spelled in SDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Interface,
    Object,
    Union,
}

impl TypeKind {
    pub(crate) fn keyword(&self) -> &'static str {
        match self {
            TypeKind::Interface => "interface",
            TypeKind::Object => "type",
            TypeKind::Union => "union",
        }
    }

    pub(crate) fn capitalized(&self) -> &'static str {
        match self {
            TypeKind::Interface => "Interface",
            TypeKind::Object => "Type",
            TypeKind::Union => "Union",
        }
    }
}

/// A single problem found while assembling the executable graph.
#[derive(Debug, Clone, PartialEq, thiserror::Error, strum_macros::IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SingleTransformError {
    #[error("An internal error has occurred, please report this bug to us: {message}")]
    Internal { message: String },
    #[error("{message}")]
    InvalidGraphQL { message: String },
    #[error("The \"{directive}\" directive handler is registered more than once")]
    DuplicateDirectiveHandler { directive: Name },
    #[error("The \"resolveType\" function of \"{type_name}\" is registered more than once")]
    DuplicateTypeResolver { type_name: Name },
    #[error("The resolver for the field \"{field_name}\" of \"{type_name}\" is registered more than once")]
    DuplicateFieldResolver { type_name: Name, field_name: Name },
    #[error(
        "The \"{interface}\" in `{} {type_name} @implements(interface: \"{interface}\")` is not defined in the schema",
        .kind.keyword()
    )]
    UndefinedImplementsTarget {
        kind: TypeKind,
        type_name: Name,
        interface: String,
    },
    #[error(
        "The \"{interface}\" in `{} {type_name} @implements(interface: \"{interface}\")` is not an interface type",
        .kind.keyword()
    )]
    ImplementsTargetNotInterface {
        kind: TypeKind,
        type_name: Name,
        interface: String,
    },
    #[error(
        "{} \"{type_name}\" cannot implement \"Node\" interface directly. Please use @implements directive instead",
        .kind.capitalized()
    )]
    NativeRootImplementation { kind: TypeKind, type_name: Name },
    #[error(
        "The \"{type_name}\" {} implements some interface without @implements directive",
        .kind.keyword()
    )]
    NativeImplementationInChain { kind: TypeKind, type_name: Name },
    #[error(
        "The following interfaces are not in @implements chain from \"Node\": {}",
        .interfaces.iter().join(", ")
    )]
    BrokenImplementsChain { interfaces: Vec<Name> },
    #[error(
        "It's ambiguous how to resolve the field \"{field_name}\" of \"{type_name}\" type with more than one directives on it"
    )]
    AmbiguousFieldDirectives { type_name: Name, field_name: Name },
    #[error(
        "Error while processing {directive} directive on the field \"{field_name}\" of \"{type_name}\":\n{message}"
    )]
    FieldDirective {
        directive: Name,
        type_name: Name,
        field_name: Name,
        message: String,
    },
    #[error("{message}")]
    InvalidDirectiveArgument { message: String },
    #[error(
        "The \"{interface}\" interface has @discriminationAlias directive but doesn't have @discriminates directive"
    )]
    AliasWithoutDiscriminates { interface: Name },
    #[error(
        "The \"{interface}\" interface has multiple implementations but doesn't have @discriminates directive"
    )]
    MissingDiscriminates { interface: Name },
    #[error(
        "The \"{interface}\" interface has @discriminates directive but doesn't implement any interface"
    )]
    DiscriminatesWithoutImplements { interface: Name },
    #[error(
        "The following type(-s) {} must implement \"{interface}\" interface by using @implements directive",
        .types.iter().map(|t| format!("\"{t}\"")).join(", ")
    )]
    NativeImplementationOfDiscriminated { interface: Name, types: Vec<Name> },
    #[error(
        "The \"{interface}\" interface has @discriminates directive but doesn't have any implementations"
    )]
    DiscriminatesWithoutImplementations { interface: Name },
    #[error(
        "The \"{type_name}\" type in `interface {interface} @discriminates(opaqueType: \"...\")` is already declared in the schema"
    )]
    OpaqueTypeAlreadyDeclared { interface: Name, type_name: Name },
    #[error(
        "The \"{type_name}\" type is already declared in the schema. Please specify a different name for a opaque type (eg. `interface {interface} @discriminates(opaqueType: \"...\")`)"
    )]
    GeneratedOpaqueTypeAlreadyDeclared { interface: Name, type_name: Name },
    #[error(
        "The \"with\" argument in `interface {interface} @discriminates(with: ...)` must be specified if the interface has multiple implementations"
    )]
    MissingDiscriminatorForImplementations { interface: Name },
    #[error(
        "The \"with\" argument in `interface {interface} @discriminates(with: ...)` must be specified if \"generateOpaqueTypes\" is false and \"opaqueType\" is not specified"
    )]
    MissingDiscriminatorForFallback { interface: Name },
    #[error(
        "The following discrimination aliases are ambiguous: {}",
        .aliases.iter().map(|(value, types)| format!("\"{value}\" => {}", types.iter().map(|t| format!("\"{t}\"")).join(" | "))).join(", ")
    )]
    AmbiguousAlias { aliases: Vec<(String, Vec<Name>)> },
    #[error(
        "Type(-s) {} in `interface {interface} @discriminationAlias(value: ..., type: ...)` are not object types or interfaces",
        .types.iter().map(|t| format!("\"{t}\"")).join(", ")
    )]
    AliasTargetNotComposite { interface: Name, types: Vec<Name> },
    #[error(
        "Type(-s) {} in `interface {interface} @discriminationAlias(value: ..., type: ...)` must implement \"{interface}\" interface by using @implements directive",
        .types.iter().map(|t| format!("\"{t}\"")).join(", ")
    )]
    AliasTargetNotImplementing { interface: Name, types: Vec<Name> },
    #[error(
        "The \"resolveType\" function has already been implemented for \"{type_name}\" {} which may lead to undefined behavior",
        .kind.keyword()
    )]
    ConflictingTypeResolver { kind: TypeKind, type_name: Name },
    #[error("The \"{type_name}\" type is already declared in the schema and can't be generated")]
    GeneratedTypeCollision { type_name: Name },
}

impl SingleTransformError {
    pub fn code(&self) -> &'static str {
        self.into()
    }
}

/// Every problem found by one stage of the pipeline.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultipleTransformErrors {
    pub errors: Vec<SingleTransformError>,
}

impl MultipleTransformErrors {
    pub fn new() -> Self {
        Self { errors: vec![] }
    }

    pub fn push(&mut self, error: SingleTransformError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns `Ok(())` if no error was collected.
    pub fn into_result(mut self) -> Result<(), TransformError> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0).into()),
            _ => Err(self.into()),
        }
    }

    pub(crate) fn from_diagnostics(diagnostics: &DiagnosticList) -> Self {
        diagnostics
            .iter()
            .map(|diagnostic| SingleTransformError::InvalidGraphQL {
                message: diagnostic.error.to_string(),
            })
            .collect()
    }
}

impl FromIterator<SingleTransformError> for MultipleTransformErrors {
    fn from_iter<T: IntoIterator<Item = SingleTransformError>>(iter: T) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl Display for MultipleTransformErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.errors.iter().join("\n"))
    }
}

/// Schema assembly failed. The graph is never partially built.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransformError {
    #[error(transparent)]
    Single(#[from] SingleTransformError),
    #[error("{0}")]
    Multiple(MultipleTransformErrors),
}

impl From<MultipleTransformErrors> for TransformError {
    fn from(errors: MultipleTransformErrors) -> Self {
        TransformError::Multiple(errors)
    }
}

impl<T> From<WithErrors<T>> for TransformError {
    fn from(value: WithErrors<T>) -> Self {
        MultipleTransformErrors::from_diagnostics(&value.errors).into()
    }
}

impl TransformError {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        SingleTransformError::Internal {
            message: message.into(),
        }
        .into()
    }

    /// All collected errors, in the order they were found.
    pub fn errors(&self) -> Vec<&SingleTransformError> {
        match self {
            TransformError::Single(error) => vec![error],
            TransformError::Multiple(errors) => errors.errors.iter().collect(),
        }
    }
}

/// A token that can't be decoded into a node identity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("Malformed node id \"{id}\": {reason}")]
    MalformedIdentity { id: String, reason: String },
}

/// Failure reported by a source's batch fetch function.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A field-scoped failure raised while resolving a single field or abstract type.
#[derive(Debug, Clone, PartialEq, thiserror::Error, strum_macros::IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolveError {
    #[error(transparent)]
    MalformedIdentity(#[from] IdentityError),
    #[error("There is no loader for the source: '{source_name}'")]
    NoLoaderForSource { source_name: String },
    #[error("Failed to load node from the '{source_name}' source: {error}")]
    Fetch {
        source_name: String,
        error: FetchError,
    },
    #[error(
        "The \"at\" argument of @resolve directive for \"{field_name}\" field must be resolved to {expected}, but got \"{observed}\""
    )]
    InvalidReferenceShape {
        field_name: Name,
        expected: &'static str,
        observed: &'static str,
    },
    #[error(
        "Can't resolve type for node with \"{id}\" id. The `{value}` value which was discriminated by {interface} interface must be a string"
    )]
    DiscriminatorNotString {
        id: String,
        interface: Name,
        value: serde_json::Value,
    },
    #[error(
        "Can't resolve type for node with \"{id}\" id. The \"{type_name}\" type which was discriminated by {interface} interface is not defined in the schema"
    )]
    UnknownDiscriminatedType {
        id: String,
        interface: Name,
        type_name: String,
    },
    #[error(
        "Can't resolve type for node with \"{id}\" id. The \"{type_name}\" type which was discriminated by {interface} interface is not an object type or interface"
    )]
    DiscriminatedTypeNotComposite {
        id: String,
        interface: Name,
        type_name: Name,
    },
    #[error(
        "Can't resolve type for node with \"{id}\" id. The \"{type_name}\" type which was discriminated by {interface} interface does not implement the \"{interface}\" interface"
    )]
    DiscriminatedTypeNotImplementing {
        id: String,
        interface: Name,
        type_name: Name,
    },
    #[error(
        "Can't resolve type for node with \"{id}\" id. The \"{type_name}\" type which was discriminated by {interface} interface does not equal to the encoded type \"{encoded}\" or implement it"
    )]
    DiscriminatedTypeUnrelated {
        id: String,
        interface: Name,
        type_name: Name,
        encoded: String,
    },
    #[error("Argument \"{argument}\" must be a non-negative integer")]
    InvalidPaginationArgument { argument: &'static str },
    #[error("The loader was dropped before the node with \"{id}\" id was loaded")]
    LoaderDropped { id: String },
    #[error("{0}")]
    Resolver(String),
}

impl ResolveError {
    pub fn code(&self) -> &'static str {
        self.into()
    }
}

/// A batch fetch function can't be registered under the given name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceRegistrationError {
    #[error("The source name \"{0}\" must be non-empty and must not contain '@'")]
    InvalidName(String),
    #[error("The source \"{0}\" is already registered")]
    Duplicate(String),
}
