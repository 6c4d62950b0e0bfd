//! ## Usage
//!
//! Hydragraph assembles one executable GraphQL graph out of schema fragments annotated with a small
//! set of directives, and loads the nodes of that graph from any number of backing sources.
//!
//! - `@implements(interface: "...")` builds an inheritance tree of interfaces and objects rooted at
//!   `Node`. Inherited fields are merged into every type of the tree.
//! - `@discriminates(with: "...")` and `@discriminationAlias(value: "...", type: "...")` tell which
//!   concrete type a node is, by reading a value of its backing record.
//! - `@field(at: "...")` reads a field from the backing record of its node.
//! - `@resolve(at: "...", from: "...")` turns references found in the backing record into nodes,
//!   one, a list, or a paginated connection of them.
//!
//! Nodes are addressed by opaque ids (see [`identity`]) and fetched through a per-request
//! [`loader::Loader`] which batches and deduplicates the fetches of every source.
//!
//! ```no_run
//! use hydragraph::SchemaFragment;
//! use hydragraph::config::TransformOptions;
//!
//! let graph = hydragraph::transform_schema(
//!     vec![SchemaFragment::new("catalog").sdl(
//!         "catalog.graphql",
//!         r#"
//!         type Entity @implements(interface: "Node") {
//!           name: String! @field(at: "metadata.name")
//!         }
//!         "#,
//!     )],
//!     &TransformOptions::default(),
//! )?;
//! # Ok::<(), hydragraph::error::TransformError>(())
//! ```

#![warn(
    rustdoc::broken_intra_doc_links,
    unreachable_pub,
    unreachable_patterns,
    unused,
    unused_qualifications,
    dead_code,
    while_true,
    unconditional_panic,
    clippy::all
)]

mod builtin;
pub mod config;
pub mod connection;
mod discrimination;
pub mod error;
pub mod fragment;
mod graph;
pub mod identity;
pub mod loader;
pub mod path;
pub mod resolvers;
mod transform;
pub(crate) mod utils;

pub use crate::builtin::CORE_SDL;
pub use crate::builtin::NODE_INTERFACE;
pub use crate::builtin::core_fragment;
pub use crate::fragment::FieldDirectiveHandler;
pub use crate::fragment::FieldSite;
pub use crate::fragment::SchemaFragment;
pub use crate::graph::ExecutableGraph;
pub use crate::identity::NodeId;
pub use crate::identity::NodeQuery;
pub use crate::loader::Loader;
pub use crate::loader::LoaderFactory;
pub use crate::resolvers::RequestContext;
pub use crate::resolvers::Resolved;

use crate::config::TransformOptions;
use crate::error::TransformError;
use crate::transform::TransformContext;

/// Assembles `fragments` on top of the [`core_fragment`] into one validated graph.
///
/// Fails with every error found by the first failing stage of the pipeline. No partially
/// transformed graph is ever returned.
#[tracing::instrument(level = "trace", skip_all)]
pub fn transform_schema(
    fragments: Vec<SchemaFragment>,
    options: &TransformOptions,
) -> Result<ExecutableGraph, TransformError> {
    tracing::debug!(
        fragments = fragments.len(),
        generate_opaque_types = options.generate_opaque_types,
        "transforming schema"
    );
    let fragments = std::iter::once(core_fragment()).chain(fragments).collect();
    TransformContext::assemble(fragments, options.clone())?.run()
}
