//! One-shot file header for third-party warnings.
//!
//! Parsers such as `lopdf` log warnings with no idea which file they are
//! reading. Enrichers mark the file they are about to hand to a parser with
//! [`set_pending`]; the first WARN-or-above event on that thread from outside
//! this crate is then preceded by a single `INFO Processing <name>` line.
//!
//! Usage:
//!   1. Register [`FileHeaderLayer`] in the subscriber stack (`intake-scan`
//!      does this in its `main`).
//!   2. Wrap each parser call in [`with_pending`], or pair [`set_pending`]
//!      and [`clear_pending`] around it yourself.
//!
//! Parsing runs inside `spawn_blocking`, so the pending name is thread-local
//! and must be set and cleared on the blocking thread itself. Events from
//! this crate already name their file and never get a header.

use std::cell::RefCell;

use tracing::{Event, Subscriber};
use tracing_subscriber::{layer::Context, Layer};

struct Pending {
    name: String,
    emitted: bool,
}

thread_local! {
    static PENDING: RefCell<Option<Pending>> = const { RefCell::new(None) };
    // Set while emitting the header so the layer ignores its own event.
    static IN_HEADER: RefCell<bool> = const { RefCell::new(false) };
}

pub fn set_pending(name: &str) {
    PENDING.with(|p| {
        *p.borrow_mut() = Some(Pending { name: name.to_owned(), emitted: false });
    });
}

pub fn clear_pending() {
    PENDING.with(|p| *p.borrow_mut() = None);
}

/// Run `f` with `name` pending on the current thread, clearing it afterwards
/// even if `f` panics.
pub fn with_pending<T>(name: &str, f: impl FnOnce() -> T) -> T {
    struct Clear;
    impl Drop for Clear {
        fn drop(&mut self) {
            clear_pending();
        }
    }
    set_pending(name);
    let _clear = Clear;
    f()
}

pub struct FileHeaderLayer;

impl<S: Subscriber> Layer<S> for FileHeaderLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() > tracing::Level::WARN {
            return;
        }
        // Our own warnings already name the file.
        if event.metadata().target().starts_with("intake") {
            return;
        }
        if IN_HEADER.with(|h| *h.borrow()) {
            return;
        }

        let name = PENDING.with(|p| {
            let mut pending = p.borrow_mut();
            match pending.as_mut() {
                Some(hdr) if !hdr.emitted => {
                    hdr.emitted = true;
                    Some(hdr.name.clone())
                }
                _ => None,
            }
        });

        if let Some(name) = name {
            IN_HEADER.with(|h| *h.borrow_mut() = true);
            tracing::info!(target: "intake::enrich", "Processing {name}");
            IN_HEADER.with(|h| *h.borrow_mut() = false);
        }
    }
}
