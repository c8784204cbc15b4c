use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of unique analyzer names.
#[derive(Debug, Default)]
pub struct NameCounter {
    next: AtomicUsize,
}

impl NameCounter {
    pub const fn new() -> Self {
        Self {
            next: AtomicUsize::new(0),
        }
    }

    /// Returns the current count as a name and advances the counter.
    pub fn next_name(&self) -> String {
        self.next.fetch_add(1, Ordering::SeqCst).to_string()
    }

    pub fn peek(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.next.store(0, Ordering::SeqCst);
    }
}

static ANALYZER_NAMES: NameCounter = NameCounter::new();

/// Process-wide counter shared by every analyzer built without a name.
pub fn analyzer_names() -> &'static NameCounter {
    &ANALYZER_NAMES
}
