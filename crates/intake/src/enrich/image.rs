use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

use intake_common::api::{ClassifiedKind, KindMetadata};
use intake_common::config::ImageConfig;
use intake_extract_media::ImageFacts;

use super::{EnrichContext, Enricher, Enrichment};
use crate::lazy_header;

/// Natural dimensions and EXIF facts. The image is its own thumbnail.
///
/// An image that cannot be decoded still enriches successfully with 0×0
/// dimensions; the record is not marked degraded.
///
/// The timeout bounds how long a record waits, not the decode itself: a decode
/// that overruns keeps its blocking thread until it returns. The decoder's
/// own allocation and size limits (`intake_extract_media::decode_limits`)
/// keep that work finite.
pub struct ImageEnricher {
    timeout: Duration,
}

impl ImageEnricher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_config(cfg: &ImageConfig) -> Self {
        Self::new(Duration::from_millis(cfg.decode_timeout_ms))
    }

    async fn read_facts(&self, ctx: &EnrichContext) -> Result<ImageFacts> {
        let bytes = ctx.registry.read(&ctx.resource_uri).await?;
        let name = ctx.name.clone();
        let task = tokio::task::spawn_blocking(move || {
            lazy_header::with_pending(&name, || intake_extract_media::read_facts(&bytes))
        });
        tokio::time::timeout(self.timeout, task)
            .await
            .with_context(|| format!("timed out after {:?}", self.timeout))?
            .context("image decode task failed")?
    }
}

#[async_trait]
impl Enricher for ImageEnricher {
    fn accepts(&self, kind: ClassifiedKind) -> bool {
        kind == ClassifiedKind::Image
    }

    async fn enrich(&self, ctx: &EnrichContext) -> Result<Enrichment> {
        let facts = match self.read_facts(ctx).await {
            Ok(facts) => facts,
            Err(e) => {
                warn!("{}: could not read image dimensions: {e:#}", ctx.name);
                ImageFacts::default()
            }
        };
        let metadata = KindMetadata::Image {
            width: facts.width,
            height: facts.height,
            taken_at: facts.taken_at,
            camera: facts.camera,
        };
        Ok(Enrichment::from_thumbnails(vec![ctx.resource_uri.clone()], metadata))
    }
}
