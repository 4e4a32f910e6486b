use super::ConstraintId;
use uuid::Uuid;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Produces a sequence of ConstraintIds from a namespace and a counter.
///
/// Two generators built from the same seed yield the same sequence, which
/// keeps replays and tests deterministic. `random()` picks a fresh namespace.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    namespace: Uuid,
    counter: Arc<AtomicUsize>,
}

impl IdGenerator {
    /// Create a new generator from a string seed (e.g. a drawing name).
    pub fn new(seed: &str) -> Self {
        Self::with_namespace(Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()))
    }

    pub fn random() -> Self {
        Self::with_namespace(Uuid::new_v4())
    }

    fn with_namespace(namespace: Uuid) -> Self {
        Self {
            namespace,
            counter: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn next_id(&self) -> ConstraintId {
        let count = self.counter.fetch_add(1, Ordering::SeqCst);
        let uuid = Uuid::new_v5(&self.namespace, &count.to_be_bytes());
        ConstraintId::from_uuid(uuid)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::random()
    }
}
