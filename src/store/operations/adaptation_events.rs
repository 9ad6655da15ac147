use crate::selection::adaptive::AdaptationEvent;
use crate::store::keys;
use crate::store::{Store, StoreError};

impl Store {
    pub fn append_adaptation_event(&self, event: &AdaptationEvent) -> Result<(), StoreError> {
        let key = keys::adaptation_event_key(
            &event.learner_id,
            event.created_at.timestamp_millis(),
            &event.id,
        )?;
        self.adaptation_events
            .insert(key.as_bytes(), Self::serialize(event)?)?;
        Ok(())
    }

    /// Newest first.
    pub fn list_learner_adaptation_events(
        &self,
        learner_id: &str,
        limit: usize,
    ) -> Result<Vec<AdaptationEvent>, StoreError> {
        let prefix = keys::adaptation_event_prefix(learner_id)?;
        let mut events = Vec::new();
        for item in self.adaptation_events.scan_prefix(prefix.as_bytes()).take(limit) {
            let (_, value) = item?;
            events.push(Self::deserialize::<AdaptationEvent>(&value)?);
        }
        Ok(events)
    }
}
