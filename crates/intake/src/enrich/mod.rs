//! Kind-specific enrichment.
//!
//! An enricher turns an acquired resource into thumbnails and per-kind
//! metadata. Dispatch picks the first registered enricher that accepts the
//! record's kind; the generic enricher accepts everything and goes last.

pub mod generic;
pub mod image;
pub mod pdf;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use intake_common::api::{ClassifiedKind, KindMetadata};
use intake_common::config::IntakeConfig;

use crate::resources::ResourceRegistry;

pub use generic::GenericEnricher;
pub use image::ImageEnricher;
pub use pdf::PdfEnricher;

/// Everything an enricher may look at for one file.
pub struct EnrichContext {
    pub name: String,
    pub kind: ClassifiedKind,
    pub resource_uri: String,
    pub content_type: String,
    pub registry: Arc<ResourceRegistry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub thumbnails: Vec<String>,
    pub cover_image: Option<String>,
    pub metadata: KindMetadata,
}

impl Enrichment {
    /// Cover is the first thumbnail, if any.
    pub fn from_thumbnails(thumbnails: Vec<String>, metadata: KindMetadata) -> Self {
        let cover_image = thumbnails.first().cloned();
        Self { thumbnails, cover_image, metadata }
    }
}

#[async_trait]
pub trait Enricher: Send + Sync {
    fn accepts(&self, kind: ClassifiedKind) -> bool;

    /// An `Err` marks the record degraded; it never aborts the batch.
    async fn enrich(&self, ctx: &EnrichContext) -> Result<Enrichment>;
}

#[derive(Clone, Default)]
pub struct EnricherSet {
    enrichers: Vec<Arc<dyn Enricher>>,
}

impl EnricherSet {
    /// Image, PDF, then the generic fallback.
    pub fn standard(config: &IntakeConfig) -> Self {
        Self::default()
            .with(ImageEnricher::from_config(&config.image))
            .with(PdfEnricher::from_config(&config.pdf))
            .with(GenericEnricher)
    }

    /// Append an enricher. Earlier entries win.
    pub fn with(mut self, enricher: impl Enricher + 'static) -> Self {
        self.enrichers.push(Arc::new(enricher));
        self
    }

    /// Insert an enricher ahead of all existing ones.
    pub fn preferring(mut self, enricher: impl Enricher + 'static) -> Self {
        self.enrichers.insert(0, Arc::new(enricher));
        self
    }

    pub fn for_kind(&self, kind: ClassifiedKind) -> Option<Arc<dyn Enricher>> {
        self.enrichers.iter().find(|e| e.accepts(kind)).cloned()
    }
}
