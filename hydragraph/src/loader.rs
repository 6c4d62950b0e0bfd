//! Per-request batching node loader.
//!
//! Loads issued back to back, before any of them is awaited, form one wave. When the wave is
//! dispatched its node ids are grouped by source and every source's batch fetch function is called
//! once, concurrently with the other sources. Loaders are created per request by a
//! [`LoaderFactory`] and never share cached results with each other.

use std::collections::HashMap;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::JoinAll;
use futures::future::Shared;
use futures::future::join_all;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::config::LoaderOptions;
use crate::error::FetchError;
use crate::error::ResolveError;
use crate::error::SourceRegistrationError;
use crate::identity::NodeId;
use crate::identity::NodeQuery;
use crate::identity::SEPARATOR;
use crate::identity::decode_id;

/// A loaded backing record, tagged with the source it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub source: Arc<str>,
    pub data: Value,
}

/// The outcome of a batch fetch: one entry per query, in query order. `Ok(None)` (or a JSON null)
/// marks a node that doesn't exist.
pub type BatchResult = Result<Vec<Result<Option<Value>, FetchError>>, FetchError>;

pub type LoadResult = Result<Option<Arc<Record>>, ResolveError>;

pub type LoadFuture = Shared<BoxFuture<'static, LoadResult>>;

/// Fetches a batch of nodes from one source.
#[async_trait]
pub trait BatchLoadFn<C>: Send + Sync {
    async fn load(&self, queries: Vec<NodeQuery>, context: &C) -> BatchResult;
}

#[async_trait]
impl<C: Sync, T: BatchLoadFn<C> + ?Sized> BatchLoadFn<C> for Arc<T> {
    async fn load(&self, queries: Vec<NodeQuery>, context: &C) -> BatchResult {
        (**self).load(queries, context).await
    }
}

/// The registered sources, shared by every loader it creates.
pub struct LoaderFactory<C> {
    sources: Arc<IndexMap<String, Arc<dyn BatchLoadFn<C>>>>,
    options: LoaderOptions,
}

impl<C> Clone for LoaderFactory<C> {
    fn clone(&self) -> Self {
        Self {
            sources: self.sources.clone(),
            options: self.options.clone(),
        }
    }
}

impl<C> Debug for LoaderFactory<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderFactory")
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .field("options", &self.options)
            .finish()
    }
}

impl<C: Send + Sync + 'static> LoaderFactory<C> {
    pub fn builder() -> LoaderFactoryBuilder<C> {
        LoaderFactoryBuilder {
            sources: IndexMap::new(),
            options: LoaderOptions::default(),
        }
    }

    /// Creates the loader of one request. `context` is handed to every batch fetch function.
    pub fn create(&self, context: C) -> Loader {
        Loader {
            inner: Arc::new(LoaderInner {
                sources: Box::new(RequestSources {
                    sources: self.sources.clone(),
                    context,
                }),
                options: self.options.clone(),
                state: Mutex::new(LoaderState::default()),
            }),
        }
    }
}

pub struct LoaderFactoryBuilder<C> {
    sources: IndexMap<String, Arc<dyn BatchLoadFn<C>>>,
    options: LoaderOptions,
}

impl<C: Send + Sync + 'static> LoaderFactoryBuilder<C> {
    pub fn options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn source(
        mut self,
        name: impl Into<String>,
        fetch: impl BatchLoadFn<C> + 'static,
    ) -> Result<Self, SourceRegistrationError> {
        let name = name.into();
        if name.is_empty() || name.contains(SEPARATOR) {
            return Err(SourceRegistrationError::InvalidName(name));
        }
        if self.sources.contains_key(&name) {
            return Err(SourceRegistrationError::Duplicate(name));
        }
        self.sources.insert(name, Arc::new(fetch));
        Ok(self)
    }

    pub fn build(self) -> LoaderFactory<C> {
        LoaderFactory {
            sources: Arc::new(self.sources),
            options: self.options,
        }
    }
}

/// Erases the request context type of the sources.
trait SourceSet: Send + Sync {
    fn fetch(&self, source: &str, queries: Vec<NodeQuery>) -> Option<BoxFuture<'_, BatchResult>>;
}

struct RequestSources<C> {
    sources: Arc<IndexMap<String, Arc<dyn BatchLoadFn<C>>>>,
    context: C,
}

impl<C: Send + Sync> SourceSet for RequestSources<C> {
    fn fetch(&self, source: &str, queries: Vec<NodeQuery>) -> Option<BoxFuture<'_, BatchResult>> {
        let fetch = self.sources.get(source)?;
        Some(fetch.load(queries, &self.context))
    }
}

struct PendingLoad {
    id: String,
    sender: oneshot::Sender<LoadResult>,
}

#[derive(Default)]
struct LoaderState {
    cache: HashMap<String, LoadFuture>,
    wave: Vec<PendingLoad>,
    scheduled: bool,
}

struct LoaderInner {
    sources: Box<dyn SourceSet>,
    options: LoaderOptions,
    state: Mutex<LoaderState>,
}

/// The node loader of one request. Cloning it shares the cache and the current wave.
#[derive(Clone)]
pub struct Loader {
    inner: Arc<LoaderInner>,
}

impl Debug for Loader {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Loader")
            .field("cached", &state.cache.len())
            .field("pending", &state.wave.len())
            .finish()
    }
}

impl Loader {
    /// Loads the node with the given id.
    ///
    /// The load joins the current wave as soon as this is called, so futures of sibling loads can
    /// be created first and awaited together. Must be called within a tokio runtime.
    pub fn load(&self, id: &str) -> LoadFuture {
        let mut state = self.inner.state.lock();
        if self.inner.options.cache {
            if let Some(load) = state.cache.get(id) {
                return load.clone();
            }
        }

        let (sender, receiver) = oneshot::channel();
        let dropped_id = id.to_string();
        let load = receiver
            .map(move |result| {
                result.unwrap_or(Err(ResolveError::LoaderDropped { id: dropped_id }))
            })
            .boxed()
            .shared();
        if self.inner.options.cache {
            state.cache.insert(id.to_string(), load.clone());
        }
        state.wave.push(PendingLoad {
            id: id.to_string(),
            sender,
        });

        let full = self
            .inner
            .options
            .max_batch_size
            .is_some_and(|max| state.wave.len() >= max.get());
        if full {
            let wave = std::mem::take(&mut state.wave);
            tokio::spawn(dispatch(self.inner.clone(), wave));
        } else if !state.scheduled {
            state.scheduled = true;
            tokio::spawn(dispatch_after_window(self.inner.clone()));
        }
        load
    }

    /// Loads several nodes, results in the order of `ids`.
    pub fn load_many<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> JoinAll<LoadFuture> {
        join_all(ids.into_iter().map(|id| self.load(id)))
    }

    /// Forgets the cached outcome for `id`, so the next load fetches it again.
    pub fn clear(&self, id: &str) {
        self.inner.state.lock().cache.remove(id);
    }
}

async fn dispatch_after_window(inner: Arc<LoaderInner>) {
    let window = inner.options.batch_window;
    if window.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(window).await;
    }
    let wave = {
        let mut state = inner.state.lock();
        state.scheduled = false;
        std::mem::take(&mut state.wave)
    };
    dispatch(inner, wave).await;
}

async fn dispatch(inner: Arc<LoaderInner>, wave: Vec<PendingLoad>) {
    if wave.is_empty() {
        return;
    }
    let mut by_source: IndexMap<String, Vec<(NodeQuery, oneshot::Sender<LoadResult>)>> =
        IndexMap::new();
    for PendingLoad { id, sender } in wave {
        match decode_id(&id) {
            Ok(NodeId { source, query, .. }) => {
                by_source.entry(source).or_default().push((query, sender));
            }
            Err(error) => {
                let _ = sender.send(Err(error.into()));
            }
        }
    }
    tracing::debug!(sources = by_source.len(), "dispatching node load wave");
    join_all(
        by_source
            .into_iter()
            .map(|(source, loads)| fetch_batch(inner.sources.as_ref(), source, loads)),
    )
    .await;
}

async fn fetch_batch(
    sources: &dyn SourceSet,
    source: String,
    loads: Vec<(NodeQuery, oneshot::Sender<LoadResult>)>,
) {
    let (queries, senders): (Vec<_>, Vec<_>) = loads.into_iter().unzip();
    let Some(fetch) = sources.fetch(&source, queries) else {
        tracing::debug!(source = %source, "no loader registered for source");
        for sender in senders {
            let _ = sender.send(Err(ResolveError::NoLoaderForSource {
                source_name: source.clone(),
            }));
        }
        return;
    };

    tracing::debug!(source = %source, batch_size = senders.len(), "fetching node batch");
    let fail_all = |senders: Vec<oneshot::Sender<LoadResult>>, error: FetchError| {
        for sender in senders {
            let _ = sender.send(Err(ResolveError::Fetch {
                source_name: source.clone(),
                error: error.clone(),
            }));
        }
    };
    match fetch.await {
        Ok(results) if results.len() == senders.len() => {
            let tag: Arc<str> = Arc::from(source.as_str());
            for (sender, result) in senders.into_iter().zip(results) {
                let outcome = match result {
                    Ok(Some(Value::Null)) | Ok(None) => Ok(None),
                    Ok(Some(data)) => Ok(Some(Arc::new(Record {
                        source: tag.clone(),
                        data,
                    }))),
                    Err(error) => Err(ResolveError::Fetch {
                        source_name: source.clone(),
                        error,
                    }),
                };
                let _ = sender.send(outcome);
            }
        }
        Ok(results) => {
            let error = FetchError::new(format!(
                "the batch function returned {} results for {} queries",
                results.len(),
                senders.len()
            ));
            tracing::warn!(source = %source, %error, "malformed batch result");
            fail_all(senders, error);
        }
        Err(error) => {
            tracing::debug!(source = %source, %error, "batch fetch failed");
            fail_all(senders, error);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::num::NonZeroUsize;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    /// Answers every query with `{"ref": ..., "args": ...}` unless the ref is "missing" or "broken".
    #[derive(Default)]
    pub(crate) struct EchoSource {
        pub(crate) batches: Mutex<Vec<Vec<NodeQuery>>>,
    }

    #[async_trait]
    impl BatchLoadFn<()> for EchoSource {
        async fn load(&self, queries: Vec<NodeQuery>, _context: &()) -> BatchResult {
            self.batches.lock().push(queries.clone());
            Ok(queries
                .into_iter()
                .map(|query| match query.reference.as_deref() {
                    Some("missing") => Ok(None),
                    Some("broken") => Err(FetchError::new("boom")),
                    _ => Ok(Some(json!({ "ref": query.reference, "args": query.args }))),
                })
                .collect())
        }
    }

    struct FailingSource(AtomicUsize);

    #[async_trait]
    impl BatchLoadFn<()> for FailingSource {
        async fn load(&self, _queries: Vec<NodeQuery>, _context: &()) -> BatchResult {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::new("unavailable"))
        }
    }

    struct ShortSource;

    #[async_trait]
    impl BatchLoadFn<()> for ShortSource {
        async fn load(&self, _queries: Vec<NodeQuery>, _context: &()) -> BatchResult {
            Ok(vec![])
        }
    }

    fn id(source: &str, reference: &str) -> String {
        NodeId::new(source, "Node", NodeQuery::by_ref(reference)).encode()
    }

    fn factory(echo: &Arc<EchoSource>, options: LoaderOptions) -> LoaderFactory<()> {
        LoaderFactory::builder()
            .options(options)
            .source("Catalog", echo.clone())
            .unwrap()
            .source("Short", ShortSource)
            .unwrap()
            .build()
    }

    #[tokio::test]
    async fn identical_loads_share_one_fetch() {
        let echo = Arc::new(EchoSource::default());
        let loader = factory(&echo, LoaderOptions::default()).create(());
        let first = loader.load(&id("Catalog", "a"));
        let second = loader.load(&id("Catalog", "a"));
        let (first, second) = futures::join!(first, second);
        assert_eq!(first, second);
        assert_eq!(echo.batches.lock().len(), 1);
        assert_eq!(echo.batches.lock()[0], vec![NodeQuery::by_ref("a")]);

        // Cached for the rest of the request.
        loader.load(&id("Catalog", "a")).await.unwrap();
        assert_eq!(echo.batches.lock().len(), 1);
    }

    #[tokio::test]
    async fn loads_are_grouped_by_source_in_order() {
        let echo = Arc::new(EchoSource::default());
        let loader = factory(&echo, LoaderOptions::default()).create(());
        let results = loader
            .load_many([
                id("Catalog", "a").as_str(),
                id("Unknown", "b").as_str(),
                id("Catalog", "c").as_str(),
                "not an id",
                id("Catalog", "missing").as_str(),
            ])
            .await;

        assert_eq!(
            echo.batches.lock().clone(),
            vec![vec![
                NodeQuery::by_ref("a"),
                NodeQuery::by_ref("c"),
                NodeQuery::by_ref("missing")
            ]]
        );
        let record = results[0].clone().unwrap().unwrap();
        assert_eq!(&*record.source, "Catalog");
        assert_eq!(record.data, json!({ "ref": "a", "args": null }));
        assert_eq!(
            results[1],
            Err(ResolveError::NoLoaderForSource {
                source_name: "Unknown".into()
            })
        );
        assert_eq!(
            results[2].clone().unwrap().unwrap().data["ref"],
            json!("c")
        );
        assert!(matches!(results[3], Err(ResolveError::MalformedIdentity(_))));
        assert_eq!(results[4], Ok(None));
    }

    #[tokio::test]
    async fn item_failures_are_isolated() {
        let echo = Arc::new(EchoSource::default());
        let failing = Arc::new(FailingSource(AtomicUsize::new(0)));
        let loader = LoaderFactory::builder()
            .source("Catalog", echo.clone())
            .unwrap()
            .source("Down", failing.clone())
            .unwrap()
            .build()
            .create(());
        let results = loader
            .load_many([
                id("Catalog", "broken").as_str(),
                id("Catalog", "ok").as_str(),
                id("Down", "x").as_str(),
                id("Down", "y").as_str(),
            ])
            .await;

        assert_eq!(
            results[0],
            Err(ResolveError::Fetch {
                source_name: "Catalog".into(),
                error: FetchError::new("boom")
            })
        );
        assert!(results[1].clone().unwrap().is_some());
        assert_eq!(failing.0.load(Ordering::SeqCst), 1);
        for result in &results[2..] {
            assert_eq!(
                result.clone().unwrap_err().to_string(),
                "Failed to load node from the 'Down' source: unavailable"
            );
        }
    }

    #[tokio::test]
    async fn result_count_mismatch_fails_the_batch() {
        let echo = Arc::new(EchoSource::default());
        let loader = factory(&echo, LoaderOptions::default()).create(());
        let error = loader.load(&id("Short", "a")).await.unwrap_err();
        assert_eq!(
            error.to_string(),
            "Failed to load node from the 'Short' source: the batch function returned 0 results for 1 queries"
        );
    }

    #[tokio::test]
    async fn sequential_waves_fetch_separately() {
        let echo = Arc::new(EchoSource::default());
        let loader = factory(&echo, LoaderOptions::default()).create(());
        loader.load(&id("Catalog", "a")).await.unwrap();
        loader.load(&id("Catalog", "b")).await.unwrap();
        assert_eq!(echo.batches.lock().len(), 2);
    }

    #[tokio::test]
    async fn without_cache_identical_loads_fetch_again() {
        let echo = Arc::new(EchoSource::default());
        let options = LoaderOptions {
            cache: false,
            ..Default::default()
        };
        let loader = factory(&echo, options).create(());
        loader.load(&id("Catalog", "a")).await.unwrap();
        loader.load(&id("Catalog", "a")).await.unwrap();
        assert_eq!(echo.batches.lock().len(), 2);
    }

    #[tokio::test]
    async fn cleared_ids_are_fetched_again() {
        let echo = Arc::new(EchoSource::default());
        let loader = factory(&echo, LoaderOptions::default()).create(());
        loader.load(&id("Catalog", "a")).await.unwrap();
        loader.clear(&id("Catalog", "a"));
        loader.load(&id("Catalog", "a")).await.unwrap();
        assert_eq!(echo.batches.lock().len(), 2);
    }

    #[tokio::test]
    async fn full_waves_dispatch_early() {
        let echo = Arc::new(EchoSource::default());
        let options = LoaderOptions {
            max_batch_size: NonZeroUsize::new(2),
            ..Default::default()
        };
        let loader = factory(&echo, options).create(());
        let results = loader
            .load_many([
                id("Catalog", "a").as_str(),
                id("Catalog", "b").as_str(),
                id("Catalog", "c").as_str(),
            ])
            .await;
        assert!(results.iter().all(|result| result.is_ok()));
        let mut sizes: Vec<usize> = echo.batches.lock().iter().map(Vec::len).collect();
        sizes.sort();
        assert_eq!(sizes, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_window_collects_later_loads() {
        let echo = Arc::new(EchoSource::default());
        let options = LoaderOptions {
            batch_window: Duration::from_millis(10),
            ..Default::default()
        };
        let loader = factory(&echo, options).create(());
        let first = loader.load(&id("Catalog", "a"));
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = loader.load(&id("Catalog", "b"));
        let (first, second) = futures::join!(first, second);
        assert!(first.is_ok() && second.is_ok());
        assert_eq!(echo.batches.lock().len(), 1);
    }

    #[test]
    fn rejects_invalid_source_names() {
        let echo = Arc::new(EchoSource::default());
        let error = LoaderFactory::<()>::builder()
            .source("a@b", echo.clone())
            .err()
            .unwrap();
        assert_eq!(error, SourceRegistrationError::InvalidName("a@b".into()));
        let error = LoaderFactory::<()>::builder()
            .source("Catalog", echo.clone())
            .unwrap()
            .source("Catalog", echo)
            .err()
            .unwrap();
        assert_eq!(error, SourceRegistrationError::Duplicate("Catalog".into()));
    }
}
