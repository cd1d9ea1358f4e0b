//! Concurrency-bounded batch scheduling across pages.
//!
//! Sequential mode walks pages in index order, one model call at a time.
//! Concurrent mode splits the page list into consecutive batches of
//! `num_workers` pages: within a batch every page runs concurrently and the
//! batch joins before the next one starts; batches never interleave, and a
//! short fixed pause separates them to stay polite to rate-limited APIs.
//! `try_join_all` preserves per-batch order and fails the whole run on the
//! first page error, so the output is either the complete, index-ordered
//! page list or nothing.

use crate::config::ConversionConfig;
use crate::error::VisionMdError;
use crate::output::PageResult;
use crate::pipeline::extract::ExtractionOrchestrator;
use crate::pipeline::source::PageSource;
use futures::future::try_join_all;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// Pause between consecutive batches.
const BATCH_PAUSE: Duration = Duration::from_millis(500);

/// Process every page of the document. Results are always in page order,
/// for any worker count, with concurrency on or off.
pub(crate) async fn run(
    source: &PageSource,
    orchestrator: &ExtractionOrchestrator,
    config: &ConversionConfig,
) -> Result<Vec<PageResult>, VisionMdError> {
    let page_count = source.page_count();
    let mut results = Vec::with_capacity(page_count);

    if !config.enable_concurrency {
        for page_index in 0..page_count {
            results.push(process_page(source, orchestrator, page_index).await?);
        }
        info!(pages = results.len(), "conversion complete");
        return Ok(results);
    }

    let batch_size = config.num_workers.max(1);
    let mut next = 0usize;
    while next < page_count {
        let batch_end = (next + batch_size).min(page_count);
        debug!(from = next + 1, to = batch_end, "processing batch");
        let batch = try_join_all(
            (next..batch_end).map(|page_index| process_page(source, orchestrator, page_index)),
        )
        .await?;
        results.extend(batch);
        next = batch_end;
        if next < page_count {
            sleep(BATCH_PAUSE).await;
        }
    }

    info!(pages = results.len(), "conversion complete");
    Ok(results)
}

async fn process_page(
    source: &PageSource,
    orchestrator: &ExtractionOrchestrator,
    page_index: usize,
) -> Result<PageResult, VisionMdError> {
    let raster = source
        .rasterize(page_index)
        .await
        .map_err(|e| e.on_page(page_index + 1))?;
    orchestrator.extract_page(raster).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelError, StructuredDescription, VisionModel};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Stub model that tracks call concurrency and finishes later calls
    /// first within a batch, to prove the join re-establishes page order.
    struct TrackingModel {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        fail_on_call: Option<usize>,
    }

    impl TrackingModel {
        fn new(fail_on_call: Option<usize>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                fail_on_call,
            }
        }
    }

    #[async_trait]
    impl VisionModel for TrackingModel {
        fn name(&self) -> &str {
            "tracking"
        }

        async fn structured_call(
            &self,
            _png_base64: &str,
            _prompt: &str,
        ) -> Result<StructuredDescription, ModelError> {
            Ok(StructuredDescription::fallback())
        }

        async fn freeform_call(
            &self,
            _png_base64: &str,
            _prompt: &str,
        ) -> Result<String, ModelError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            // later-started calls sleep less, so completion order inverts
            let delay = 50u64.saturating_sub((call as u64 % 10) * 5);
            sleep(Duration::from_millis(delay)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail_on_call == Some(call) {
                return Err(ModelError::SchemaValidation {
                    detail: "injected failure".into(),
                });
            }
            Ok(format!("call {call}"))
        }
    }

    fn config(concurrent: bool, workers: usize) -> ConversionConfig {
        ConversionConfig::builder()
            .enable_concurrency(concurrent)
            .num_workers(workers)
            .build()
            .expect("config")
    }

    async fn run_with(
        pages: usize,
        config: &ConversionConfig,
        model: Arc<TrackingModel>,
    ) -> Result<Vec<PageResult>, VisionMdError> {
        let source = PageSource::stub(pages);
        let orchestrator = ExtractionOrchestrator::new(model, config.clone());
        run(&source, &orchestrator, config).await
    }

    #[tokio::test]
    async fn sequential_mode_is_ordered_and_serial() {
        let model = Arc::new(TrackingModel::new(None));
        let results = run_with(5, &config(false, 4), model.clone()).await.unwrap();

        let indices: Vec<usize> = results.iter().map(|r| r.page_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(model.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_mode_preserves_page_order() {
        let model = Arc::new(TrackingModel::new(None));
        let results = run_with(10, &config(true, 4), model.clone()).await.unwrap();

        assert_eq!(results.len(), 10);
        let indices: Vec<usize> = results.iter().map(|r| r.page_index).collect();
        assert_eq!(indices, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn batches_never_exceed_the_worker_count() {
        let model = Arc::new(TrackingModel::new(None));
        run_with(10, &config(true, 4), model.clone()).await.unwrap();

        let max = model.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 4, "saw {max} concurrent calls with 4 workers");
        assert!(max > 1, "expected genuine concurrency within a batch");
    }

    #[tokio::test]
    async fn single_page_failure_aborts_the_whole_run() {
        let model = Arc::new(TrackingModel::new(Some(2)));
        let err = run_with(6, &config(true, 2), model.clone()).await.unwrap_err();
        assert!(matches!(err, VisionMdError::Conversion { .. }));

        // later batches never started
        assert!(model.calls.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn worker_count_of_one_degenerates_to_sequential_batches() {
        let model = Arc::new(TrackingModel::new(None));
        let results = run_with(3, &config(true, 1), model.clone()).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(model.max_in_flight.load(Ordering::SeqCst), 1);
    }
}
