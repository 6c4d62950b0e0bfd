/// A wrapper around `tracing::trace!`, not to be confused with snapshot testing. It tags a trace
/// event with the name of a data structure and a rendering of it, so the evolution of the type
/// map can be followed stage by stage. The data must implement `tracing::Value`:
/// ```ignore
/// snapshot!("Schema", schema.to_string(), "transformed schema");
/// // trace!(snapshot = "Schema", data = "type Query { .. }", "transformed schema");
/// ```
macro_rules! snapshot {
    ($name:literal, $value:expr, $msg:literal) => {
        #[cfg(feature = "snapshot_tracing")]
        tracing::trace!(snapshot = $name, data = $value, $msg);
    };
}

pub(crate) use snapshot;
