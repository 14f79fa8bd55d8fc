pub mod batch;
pub mod enrich;
pub mod input;
pub mod lazy_header;
pub mod resources;
pub mod router;
pub mod scan;
pub mod session;
pub mod urls;

pub use batch::{BatchOutcome, BatchProcessor, ProgressEvent, ProgressSink};
pub use enrich::{EnrichContext, Enricher, EnricherSet, Enrichment};
pub use input::{FileSource, RawFileInput};
pub use resources::ResourceRegistry;
pub use router::select_strategy;
pub use session::{IntakeSession, SubmitOutcome};
pub use urls::UrlResolver;
