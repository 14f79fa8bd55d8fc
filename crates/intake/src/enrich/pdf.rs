use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

use intake_common::api::{ClassifiedKind, KindMetadata};
use intake_common::config::PdfConfig;
use intake_extract_pdf::{
    default_inspector, inspect, is_likely_pitch_deck, PdfInspection, PdfInspector, ThumbnailSpec,
};

use super::{EnrichContext, Enricher, Enrichment};
use crate::lazy_header;

/// Page count, document info and up to `max_thumbnails` page thumbnails.
///
/// A document the reader cannot open degrades to one page with no
/// thumbnails and no metadata. That is a success, not a record error.
pub struct PdfEnricher {
    inspector: Arc<dyn PdfInspector>,
    max_thumbnails: u32,
    spec: ThumbnailSpec,
    pitch_deck_keywords: Vec<String>,
}

impl PdfEnricher {
    pub fn from_config(cfg: &PdfConfig) -> Self {
        Self::with_inspector(default_inspector(), cfg)
    }

    pub fn with_inspector(inspector: Arc<dyn PdfInspector>, cfg: &PdfConfig) -> Self {
        Self {
            inspector,
            max_thumbnails: cfg.max_thumbnails,
            spec: ThumbnailSpec { scale: cfg.thumbnail_scale, max_px: cfg.max_thumbnail_px },
            pitch_deck_keywords: cfg.pitch_deck_keywords.clone(),
        }
    }

    async fn inspect(&self, ctx: &EnrichContext) -> Result<PdfInspection> {
        let bytes = ctx.registry.read(&ctx.resource_uri).await?;
        let inspector = Arc::clone(&self.inspector);
        let name = ctx.name.clone();
        let max = self.max_thumbnails;
        let spec = self.spec;
        tokio::task::spawn_blocking(move || {
            lazy_header::with_pending(&name, || inspect(inspector.as_ref(), &bytes, max, &spec))
        })
        .await
        .context("PDF inspection task failed")?
    }
}

#[async_trait]
impl Enricher for PdfEnricher {
    fn accepts(&self, kind: ClassifiedKind) -> bool {
        kind == ClassifiedKind::Pdf
    }

    async fn enrich(&self, ctx: &EnrichContext) -> Result<Enrichment> {
        let is_likely_pitch_deck = is_likely_pitch_deck(&ctx.name, &self.pitch_deck_keywords);

        let inspection = match self.inspect(ctx).await {
            Ok(inspection) => inspection,
            Err(e) => {
                warn!("{}: PDF could not be read, using defaults: {e:#}", ctx.name);
                return Ok(Enrichment::from_thumbnails(
                    Vec::new(),
                    KindMetadata::Pdf {
                        page_count: 1,
                        title: None,
                        author: None,
                        created_at: None,
                        is_likely_pitch_deck,
                    },
                ));
            }
        };

        let thumbnails = inspection
            .thumbnails
            .into_iter()
            .map(|png| ctx.registry.acquire_bytes(png, "image/png"))
            .collect();
        let meta = inspection.metadata;
        Ok(Enrichment::from_thumbnails(
            thumbnails,
            KindMetadata::Pdf {
                page_count: inspection.page_count,
                title: meta.title,
                author: meta.author,
                created_at: meta.created_at,
                is_likely_pitch_deck,
            },
        ))
    }
}
