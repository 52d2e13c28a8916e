//! Event type → ordered projections.

use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::{EventLike, Projection};

/// Lookup table from event type to the projections that handle it, in
/// registration order.
pub struct ProjectionRegistry<E: EventLike> {
    handlers: HashMap<String, Vec<Arc<dyn Projection<E>>>>,
}

impl<E: EventLike> ProjectionRegistry<E> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a projection for every type it declares in `handles()`.
    pub fn register<P: Projection<E> + 'static>(&mut self, projection: P) -> &mut Self {
        let projection: Arc<dyn Projection<E>> = Arc::new(projection);
        for event_type in projection.handles() {
            self.register_for(event_type, projection.clone());
        }
        self
    }

    /// Register a projection for one event type.
    pub fn register_for(&mut self, event_type: &str, projection: Arc<dyn Projection<E>>) -> &mut Self {
        self.handlers
            .entry(event_type.to_string())
            .or_default()
            .push(projection);
        self
    }

    /// Projections for `event_type`, in registration order. Empty if none.
    pub fn handlers_for(&self, event_type: &str) -> &[Arc<dyn Projection<E>>] {
        self.handlers
            .get(event_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Names of the projections registered for `event_type`, in order.
    pub fn projection_names(&self, event_type: &str) -> Vec<&'static str> {
        self.handlers_for(event_type).iter().map(|p| p.name()).collect()
    }
}

impl<E: EventLike> Default for ProjectionRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}
