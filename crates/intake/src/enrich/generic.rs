use anyhow::Result;
use async_trait::async_trait;

use intake_common::api::{placeholder_icon, ClassifiedKind, KindMetadata};

use super::{EnrichContext, Enricher, Enrichment};

/// Placeholder icon for kinds with no richer handling. Never fails.
pub struct GenericEnricher;

#[async_trait]
impl Enricher for GenericEnricher {
    fn accepts(&self, _kind: ClassifiedKind) -> bool {
        true
    }

    async fn enrich(&self, ctx: &EnrichContext) -> Result<Enrichment> {
        let icon = placeholder_icon(ctx.kind).to_string();
        Ok(Enrichment::from_thumbnails(
            vec![icon.clone()],
            KindMetadata::Generic { icon },
        ))
    }
}
