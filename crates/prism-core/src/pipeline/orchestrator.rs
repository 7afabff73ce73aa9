//! Pipeline orchestration: wires the stages together for one batch at a time.

use reqwest::Url;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::{CacheStore, DiskCache};
use crate::config::{Config, LimitsConfig};
use crate::download::{Downloader, HttpDownloader};
use crate::error::{FailureKind, PrismError, Result};
use crate::filters::{build_filters, ImageFilter};
use crate::join::{join_all, Joined};
use crate::pending::PendingResult;
use crate::pool::WorkerPool;
use crate::store::OutputStore;
use crate::types::{BatchFailure, BatchSummary, PersistedOutput};

use super::bind::FilterBinder;
use super::decode::ImageDecoder;
use super::fetch::Fetcher;
use super::gate::{CacheDecision, CacheGate};
use super::run::FilterRunner;

/// Outcome of one URL's branch.
#[derive(Debug, Clone)]
enum Branch {
    Cached,
    Processed(Joined<PersistedOutput>),
}

/// The batch pipeline. Cheap to clone; clones share the pool and collaborators.
#[derive(Clone)]
pub struct Pipeline {
    pool: WorkerPool,
    gate: CacheGate,
    fetcher: Fetcher,
    binder: FilterBinder,
    runner: FilterRunner,
}

impl Pipeline {
    /// Assemble a pipeline from explicit collaborators.
    pub fn new(
        pool: WorkerPool,
        cache: Arc<dyn CacheStore>,
        downloader: Arc<dyn Downloader>,
        filters: Vec<Arc<dyn ImageFilter>>,
        limits: &LimitsConfig,
    ) -> Self {
        Self {
            gate: CacheGate::new(pool.clone(), cache),
            fetcher: Fetcher::new(
                pool.clone(),
                downloader,
                ImageDecoder::new(limits.clone()),
            ),
            binder: FilterBinder::new(filters),
            runner: FilterRunner::new(
                pool.clone(),
                Some(Duration::from_millis(limits.filter_timeout_ms)),
            ),
            pool,
        }
    }

    /// Assemble the default pipeline: disk cache, HTTP downloader, and the
    /// configured filters writing under the output directory.
    pub fn from_config(config: &Config, pool: WorkerPool) -> Result<Self> {
        let store = OutputStore::from_config(config)?;
        let filters = build_filters(config)?;
        let cache = DiskCache::new(store, config.filters.enabled.clone());
        let downloader = HttpDownloader::new(config.fetch.clone())?;

        tracing::debug!(
            "Pipeline: {} workers, filters [{}]",
            pool.workers(),
            config.filters.enabled.join(", ")
        );
        Ok(Self::new(
            pool,
            Arc::new(cache),
            Arc::new(downloader),
            filters,
            &config.limits,
        ))
    }

    /// Filter names in the order they are applied.
    pub fn filter_names(&self) -> Vec<&str> {
        self.binder.filter_names()
    }

    /// The worker pool running this pipeline.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Process one batch and wait for every task in it to finish.
    ///
    /// Individual fetch or filter failures are reported in the summary. Only a
    /// worker pool failure makes the whole batch fail.
    pub async fn process_batch(&self, urls: &[Url]) -> Result<BatchSummary> {
        if self.pool.is_closed() {
            return Err(PrismError::Pool("worker pool is closed".to_string()));
        }
        let start = Instant::now();

        let branches: Vec<PendingResult<Branch>> = urls.iter().map(|url| self.branch(url)).collect();
        let joined = join_all(&self.pool, branches)
            .wait()
            .await
            .map_err(|e| PrismError::Pool(e.to_string()))?;

        let mut summary = BatchSummary::new(urls.len());
        let mut failures = joined.failures.into_iter().peekable();
        let mut successes = joined.successes.into_iter();

        for (index, url) in urls.iter().enumerate() {
            if let Some((_, cause)) = failures.next_if(|(i, _)| *i == index) {
                if cause.kind() == FailureKind::Pool {
                    return Err(PrismError::Pool(cause.to_string()));
                }
                tracing::error!("{cause}");
                summary.failures.push(BatchFailure::new(url.as_str(), cause));
                continue;
            }

            match successes.next() {
                Some(Branch::Cached) => summary.cached_count += 1,
                Some(Branch::Processed(outputs)) => {
                    for (_, cause) in outputs.failures {
                        if cause.kind() == FailureKind::Pool {
                            return Err(PrismError::Pool(cause.to_string()));
                        }
                        tracing::error!("{cause}");
                        summary.failures.push(BatchFailure::new(url.as_str(), cause));
                    }
                    summary.processed_count += outputs.successes.len();
                    summary.outputs.extend(outputs.successes);
                }
                None => break,
            }
        }

        summary.elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            "Batch of {}: {} outputs, {} cached, {} failures in {}ms",
            summary.input_count,
            summary.processed_count,
            summary.cached_count,
            summary.failures.len(),
            summary.elapsed_ms
        );
        Ok(summary)
    }

    /// Chain gate → fetch → bind → run for one URL without waiting on any stage.
    ///
    /// The branch resolves only after every filter task for the URL has.
    fn branch(&self, url: &Url) -> PendingResult<Branch> {
        let pool = self.pool.clone();
        let fetcher = self.fetcher.clone();
        let binder = self.binder.clone();
        let runner = self.runner.clone();

        self.gate.check(url).then_compose(move |decision| match decision {
            CacheDecision::Cached => PendingResult::completed(&pool, Branch::Cached),
            CacheDecision::NeedsFetch(url) => fetcher.fetch(url).then_compose(move |image| {
                let tasks = binder
                    .bind(image)
                    .into_iter()
                    .map(|task| runner.run(task))
                    .collect();
                join_all(&pool, tasks).then(Branch::Processed)
            }),
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("pool", &self.pool)
            .field("filters", &self.filter_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PipelineError, PipelineResult};
    use crate::pipeline::decode::tests::png_bytes;
    use crate::pipeline::Image;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct SetCache(HashSet<String>);

    #[async_trait]
    impl CacheStore for SetCache {
        async fn contains(&self, url: &Url) -> PipelineResult<bool> {
            Ok(self.0.contains(url.as_str()))
        }
    }

    /// Closes the pool the first time it is asked anything.
    struct ClosingCache(WorkerPool);

    #[async_trait]
    impl CacheStore for ClosingCache {
        async fn contains(&self, _url: &Url) -> PipelineResult<bool> {
            self.0.close();
            Ok(false)
        }
    }

    /// Panics on lookups for the listed URLs, answers "not cached" otherwise.
    struct PanickingCache(HashSet<String>);

    #[async_trait]
    impl CacheStore for PanickingCache {
        async fn contains(&self, url: &Url) -> PipelineResult<bool> {
            if self.0.contains(url.as_str()) {
                panic!("cache index corrupted for {url}");
            }
            Ok(false)
        }
    }

    /// Panics while filtering the listed URLs.
    struct PanickingFilter {
        name: &'static str,
        panics_on: HashSet<String>,
    }

    #[async_trait]
    impl ImageFilter for PanickingFilter {
        fn name(&self) -> &str {
            self.name
        }

        async fn apply(&self, image: Arc<Image>) -> PipelineResult<PersistedOutput> {
            if self.panics_on.contains(image.url.as_str()) {
                panic!("{} overflowed on {}", self.name, image.url);
            }
            Ok(PersistedOutput {
                url: image.url.to_string(),
                filter: self.name.to_string(),
                path: format!("/out/{}/{}.png", self.name, image.file_name).into(),
                width: image.width(),
                height: image.height(),
                bytes_written: image.byte_len,
            })
        }
    }

    #[derive(Default)]
    struct MockDownloader {
        failing: HashSet<String>,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Downloader for MockDownloader {
        fn name(&self) -> &str {
            "mock"
        }

        async fn download_bytes(&self, url: &Url) -> PipelineResult<Vec<u8>> {
            self.requested.lock().unwrap().push(url.to_string());
            if self.failing.contains(url.as_str()) {
                return Err(PipelineError::Fetch {
                    url: url.to_string(),
                    message: "connection failed: reset by peer".to_string(),
                    status_code: None,
                });
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
            Ok(png_bytes(6, 4))
        }
    }

    struct MockFilter {
        name: &'static str,
        failing: HashSet<String>,
        applied: AtomicUsize,
    }

    impl MockFilter {
        fn new(name: &'static str) -> Arc<Self> {
            Self::failing_on(name, &[])
        }

        fn failing_on(name: &'static str, urls: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                name,
                failing: urls.iter().map(|u| u.to_string()).collect(),
                applied: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ImageFilter for MockFilter {
        fn name(&self) -> &str {
            self.name
        }

        async fn apply(&self, image: Arc<Image>) -> PipelineResult<PersistedOutput> {
            self.applied.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(image.url.as_str()) {
                return Err(PipelineError::Filter {
                    url: image.url.to_string(),
                    filter: self.name.to_string(),
                    message: "encoder exploded".to_string(),
                });
            }
            Ok(PersistedOutput {
                url: image.url.to_string(),
                filter: self.name.to_string(),
                path: format!("/out/{}/{}.png", self.name, image.file_name).into(),
                width: image.width(),
                height: image.height(),
                bytes_written: image.byte_len,
            })
        }
    }

    fn url(name: &str) -> Url {
        Url::parse(&format!("https://example.com/{name}.png")).unwrap()
    }

    fn pipeline(
        pool: &WorkerPool,
        cached: &[&Url],
        downloader: Arc<MockDownloader>,
        filters: Vec<Arc<MockFilter>>,
    ) -> Pipeline {
        let cache = SetCache(cached.iter().map(|u| u.to_string()).collect());
        let filters = filters
            .into_iter()
            .map(|f| f as Arc<dyn ImageFilter>)
            .collect();
        Pipeline::new(
            pool.clone(),
            Arc::new(cache),
            downloader,
            filters,
            &LimitsConfig::default(),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_uncached_and_cached_url() {
        let pool = WorkerPool::current(4).unwrap();
        let (url1, url2) = (url("one"), url("two"));
        let downloader = Arc::new(MockDownloader::default());
        let (f1, f2) = (MockFilter::new("f1"), MockFilter::new("f2"));
        let pipeline = pipeline(
            &pool,
            &[&url2],
            Arc::clone(&downloader),
            vec![Arc::clone(&f1), Arc::clone(&f2)],
        );

        let summary = pipeline.process_batch(&[url1.clone(), url2]).await.unwrap();

        assert_eq!(summary.processed_count, 2);
        assert_eq!(summary.input_count, 2);
        assert_eq!(summary.cached_count, 1);
        assert!(summary.failures.is_empty());
        assert_eq!(*downloader.requested.lock().unwrap(), vec![url1.to_string()]);
        assert_eq!(f1.applied.load(Ordering::SeqCst), 1);
        assert_eq!(f2.applied.load(Ordering::SeqCst), 1);
        assert!(summary.outputs.iter().all(|o| o.url == url1.as_str()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fetch_failure_recorded_once() {
        let pool = WorkerPool::current(4).unwrap();
        let (url1, url2) = (url("broken"), url("fine"));
        let downloader = Arc::new(MockDownloader {
            failing: [url1.to_string()].into_iter().collect(),
            ..MockDownloader::default()
        });
        let f1 = MockFilter::new("f1");
        let f2 = MockFilter::new("f2");
        let pipeline = pipeline(&pool, &[], downloader, vec![Arc::clone(&f1), f2]);

        let summary = pipeline.process_batch(&[url1.clone(), url2]).await.unwrap();

        assert_eq!(summary.failures.len(), 1);
        let failure = &summary.failures[0];
        assert_eq!(failure.url, url1.as_str());
        assert_eq!(failure.filter, None);
        assert_eq!(failure.kind, FailureKind::Fetch);
        assert_eq!(summary.processed_count, 2);
        // Only the good URL reached the filters.
        assert_eq!(f1.applied.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_filter_failure_is_isolated() {
        let pool = WorkerPool::current(4).unwrap();
        let url1 = url("one");
        let f1 = MockFilter::new("f1");
        let f2 = MockFilter::failing_on("f2", &[url1.as_str()]);
        let pipeline = pipeline(&pool, &[], Arc::new(MockDownloader::default()), vec![f1, f2]);

        let summary = pipeline.process_batch(std::slice::from_ref(&url1)).await.unwrap();

        assert_eq!(summary.processed_count, 1);
        assert_eq!(summary.outputs.len(), 1);
        assert_eq!(summary.outputs[0].filter, "f1");
        assert_eq!(summary.failures.len(), 1);
        let failure = &summary.failures[0];
        assert_eq!(failure.url, url1.as_str());
        assert_eq!(failure.filter.as_deref(), Some("f2"));
        assert_eq!(failure.kind, FailureKind::Filter);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_every_task_accounted_for() {
        let pool = WorkerPool::current(3).unwrap();
        let urls: Vec<Url> = (0..8).map(|i| url(&format!("img{i}"))).collect();
        let cached = [&urls[1], &urls[4]];
        let downloader = Arc::new(MockDownloader {
            failing: [urls[6].to_string()].into_iter().collect(),
            ..MockDownloader::default()
        });
        let filters = vec![
            MockFilter::new("a"),
            MockFilter::failing_on("b", &[urls[0].as_str(), urls[7].as_str()]),
            MockFilter::failing_on("c", &[urls[7].as_str()]),
        ];
        let filter_count = filters.len();
        let pipeline = pipeline(&pool, &cached, downloader, filters);

        let summary = pipeline.process_batch(&urls).await.unwrap();

        let fetch_failures = summary
            .failures
            .iter()
            .filter(|f| f.kind == FailureKind::Fetch)
            .count();
        let filter_failures = summary.failures.len() - fetch_failures;
        let non_cached = urls.len() - cached.len();

        assert_eq!(summary.cached_count, 2);
        assert_eq!(fetch_failures, 1);
        assert_eq!(filter_failures, 3);
        assert_eq!(
            summary.processed_count + filter_failures + fetch_failures * filter_count,
            non_cached * filter_count
        );
        // Failures are reported in submission order.
        let failed_urls: Vec<&str> = summary.failures.iter().map(|f| f.url.as_str()).collect();
        assert_eq!(
            failed_urls,
            vec![
                urls[0].as_str(),
                urls[6].as_str(),
                urls[7].as_str(),
                urls[7].as_str()
            ]
        );
    }

    #[tokio::test]
    async fn test_fully_cached_batch() {
        let pool = WorkerPool::current(2).unwrap();
        let urls = vec![url("a"), url("b"), url("c")];
        let downloader = Arc::new(MockDownloader::default());
        let f1 = MockFilter::new("f1");
        let pipeline = pipeline(
            &pool,
            &urls.iter().collect::<Vec<_>>(),
            Arc::clone(&downloader),
            vec![Arc::clone(&f1)],
        );

        for _ in 0..2 {
            let summary = pipeline.process_batch(&urls).await.unwrap();
            assert_eq!(summary.processed_count, 0);
            assert_eq!(summary.input_count, 3);
            assert!(summary.failures.is_empty());
        }
        assert!(downloader.requested.lock().unwrap().is_empty());
        assert_eq!(f1.applied.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let pool = WorkerPool::current(2).unwrap();
        let pipeline = pipeline(
            &pool,
            &[],
            Arc::new(MockDownloader::default()),
            vec![MockFilter::new("f1")],
        );
        let summary = pipeline.process_batch(&[]).await.unwrap();
        assert_eq!(summary, BatchSummary { elapsed_ms: summary.elapsed_ms, ..BatchSummary::new(0) });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_batches_are_isolated() {
        let pool = WorkerPool::current(4).unwrap();
        let pipeline = pipeline(
            &pool,
            &[],
            Arc::new(MockDownloader::default()),
            vec![MockFilter::new("f1"), MockFilter::new("f2")],
        );
        let left: Vec<Url> = (0..5).map(|i| url(&format!("left{i}"))).collect();
        let right: Vec<Url> = (0..3).map(|i| url(&format!("right{i}"))).collect();

        let (a, b) = tokio::join!(pipeline.process_batch(&left), pipeline.process_batch(&right));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.processed_count, 10);
        assert_eq!(b.processed_count, 6);
        assert!(a.outputs.iter().all(|o| o.url.contains("left")));
        assert!(b.outputs.iter().all(|o| o.url.contains("right")));
    }

    #[tokio::test]
    async fn test_closed_pool_fails_batch() {
        let pool = WorkerPool::current(2).unwrap();
        let pipeline = pipeline(
            &pool,
            &[],
            Arc::new(MockDownloader::default()),
            vec![MockFilter::new("f1")],
        );
        pool.close();
        let err = pipeline.process_batch(&[url("a")]).await.unwrap_err();
        assert!(matches!(err, PrismError::Pool(_)));
    }

    #[tokio::test]
    async fn test_pool_closed_mid_batch_fails_batch() {
        let pool = WorkerPool::current(2).unwrap();
        let pipeline = Pipeline::new(
            pool.clone(),
            Arc::new(ClosingCache(pool.clone())),
            Arc::new(MockDownloader::default()),
            vec![MockFilter::new("f1") as Arc<dyn ImageFilter>],
            &LimitsConfig::default(),
        );
        let err = pipeline
            .process_batch(&[url("a"), url("b")])
            .await
            .unwrap_err();
        assert!(matches!(err, PrismError::Pool(_)), "got {err:?}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_panicking_filter_is_isolated() {
        let pool = WorkerPool::current(4).unwrap();
        let (good, bad) = (url("good"), url("bad"));
        let f2 = PanickingFilter {
            name: "f2",
            panics_on: [bad.to_string()].into_iter().collect(),
        };
        let pipeline = Pipeline::new(
            pool.clone(),
            Arc::new(SetCache(HashSet::new())),
            Arc::new(MockDownloader::default()),
            vec![
                MockFilter::new("f1") as Arc<dyn ImageFilter>,
                Arc::new(f2) as Arc<dyn ImageFilter>,
            ],
            &LimitsConfig::default(),
        );

        let summary = pipeline
            .process_batch(&[good.clone(), bad.clone()])
            .await
            .unwrap();

        assert_eq!(summary.processed_count, 3);
        assert_eq!(summary.failures.len(), 1);
        let failure = &summary.failures[0];
        assert_eq!(failure.url, bad.as_str());
        assert_eq!(failure.filter.as_deref(), Some("f2"));
        assert_eq!(failure.kind, FailureKind::Filter);
        assert!(!pool.is_closed());

        // The pool keeps serving later batches.
        let again = pipeline.process_batch(std::slice::from_ref(&good)).await.unwrap();
        assert_eq!(again.processed_count, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_panicking_cache_lookup_is_a_miss() {
        let pool = WorkerPool::current(4).unwrap();
        let (good, bad) = (url("good"), url("bad"));
        let downloader = Arc::new(MockDownloader::default());
        let pipeline = Pipeline::new(
            pool,
            Arc::new(PanickingCache([bad.to_string()].into_iter().collect())),
            Arc::clone(&downloader) as Arc<dyn Downloader>,
            vec![MockFilter::new("f1") as Arc<dyn ImageFilter>],
            &LimitsConfig::default(),
        );

        let summary = pipeline
            .process_batch(&[good.clone(), bad.clone()])
            .await
            .unwrap();

        assert_eq!(summary.processed_count, 2);
        assert_eq!(summary.cached_count, 0);
        assert!(summary.failures.is_empty());
        let mut requested = downloader.requested.lock().unwrap().clone();
        requested.sort();
        assert_eq!(requested, vec![bad.to_string(), good.to_string()]);
    }

    #[test]
    fn test_from_config_uses_configured_filters() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.general.output_dir = dir.path().to_path_buf();
        config.filters.enabled = vec!["thumbnail".to_string(), "invert".to_string()];

        let pipeline = Pipeline::from_config(&config, WorkerPool::with_handle(rt.handle().clone(), 2))
            .unwrap();
        assert_eq!(pipeline.filter_names(), vec!["thumbnail", "invert"]);
    }
}
