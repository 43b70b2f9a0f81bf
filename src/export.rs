//! Export orchestrator: resolve -> wait -> capture each -> submit once.

use crate::assembly::AssemblyClient;
use crate::capture::{CapturedSlide, SlideCapturer, SlideRasterizer};
use crate::dom::Document;
use crate::readiness::{ImageStates, ReadinessBarrier};
use crate::rendering::BoxRasterizer;
use crate::resolver::ResourceResolver;
use crate::{Error, ExportBatch, ExportConfig, ExportResult, Result, SlideDescriptor};
use std::sync::Arc;
use std::time::Duration;

type OnStateHandler = Arc<dyn Fn(&ExportState) + Send + Sync>;

/// Progress of one export run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    ResolvingImages,
    AwaitingReady,
    Capturing { index: usize, total: usize },
    Submitting,
    Done,
    Failed,
}

pub struct Exporter {
    config: ExportConfig,
    resolver: ResourceResolver,
    barrier: ReadinessBarrier,
    assembly: AssemblyClient,
    rasterizer: Box<dyn SlideRasterizer>,
    on_state: Option<OnStateHandler>,
}

impl Exporter {
    pub fn new(config: ExportConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            resolver: ResourceResolver::from_config(&config, client.clone()),
            barrier: ReadinessBarrier::new(client.clone(), config.image_timeout_ms),
            assembly: AssemblyClient::new(client, &config.assembly_endpoint, config.headers.clone()),
            rasterizer: Box::new(BoxRasterizer::new(config.jpeg_quality)),
            config,
            on_state: None,
        })
    }

    /// Swap the slide rasterizer (the box renderer is the default)
    pub fn with_rasterizer<R: SlideRasterizer + 'static>(mut self, rasterizer: R) -> Self {
        self.rasterizer = Box::new(rasterizer);
        self
    }

    /// Swap the resource resolver, e.g. to change its tier order
    pub fn with_resolver(mut self, resolver: ResourceResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Register a callback invoked on every state transition
    pub fn on_state<F>(&mut self, cb: F)
    where
        F: Fn(&ExportState) + Send + Sync + 'static,
    {
        self.on_state = Some(Arc::new(cb));
    }

    fn transition(&self, state: ExportState) {
        log::info!("export state: {:?}", state);
        if let Some(cb) = &self.on_state {
            cb(&state);
        }
    }

    /// Run the whole pipeline. Only `EmptyBatchError` and `SubmissionError`
    /// can come back from here.
    pub async fn export_all(
        &self,
        doc: &mut Document,
        descriptors: &[SlideDescriptor],
        presentation_title: &str,
    ) -> Result<ExportResult> {
        self.transition(ExportState::Idle);
        let images = self.prepare(doc).await;

        let slides = self.capture_all(doc, &images, descriptors);
        let batch = match ExportBatch::new(presentation_title, slides) {
            Ok(batch) => batch,
            Err(e) => {
                log::error!("none of {} slide elements were found", descriptors.len());
                self.transition(ExportState::Failed);
                return Err(e);
            }
        };

        match self.submit(&batch).await {
            Ok(result) => {
                self.transition(ExportState::Done);
                Ok(result)
            }
            Err(e) => {
                log::error!("{}", e);
                self.transition(ExportState::Failed);
                Err(e)
            }
        }
    }

    /// Resolve and apply cross-origin images (unless disabled), then wait for
    /// every image in the document to settle.
    pub async fn prepare(&self, doc: &mut Document) -> ImageStates {
        if self.config.inline_images {
            self.transition(ExportState::ResolvingImages);
            let resolved = self.resolver.resolve_all(doc).await;
            let changed = doc.apply_resolved(&resolved);
            log::debug!("inlined {} image sources", changed);
        } else {
            log::debug!("image inlining disabled");
        }

        self.transition(ExportState::AwaitingReady);
        self.barrier.await_all_images_settled(doc).await
    }

    /// Capture descriptors strictly in order, one at a time. Absent slides
    /// are skipped.
    pub fn capture_all(&self, doc: &Document, images: &ImageStates, descriptors: &[SlideDescriptor]) -> Vec<CapturedSlide> {
        let capturer = SlideCapturer::new(self.rasterizer.as_ref(), &self.config);
        let total = descriptors.len();
        let mut slides = Vec::with_capacity(total);
        for (index, descriptor) in descriptors.iter().enumerate() {
            self.transition(ExportState::Capturing { index, total });
            if let Some(slide) = capturer.capture_slide(doc, images, descriptor) {
                slides.push(slide);
            }
        }
        log::info!("captured {} of {} slides", slides.len(), total);
        slides
    }

    /// Submit a batch to the assembly endpoint
    pub async fn submit(&self, batch: &ExportBatch) -> Result<ExportResult> {
        self.transition(ExportState::Submitting);
        self.assembly.submit(batch).await
    }
}
