use std::collections::HashMap;
use std::sync::Arc;

use cmi_core::model::{Capabilities, Objective, ObjectiveDraft};
use tracing::debug;

use crate::accessor::RuntimeAccessor;
use crate::error::AdapterError;

const OBJECTIVES_COUNT: &str = "cmi.objectives._count";

/// Writes objectives into `cmi.objectives.N.*`, one slot per identifier.
///
/// The identifier → slot index is seeded from the objectives the LMS already
/// holds and only grows afterwards.
pub struct ObjectiveRecorder {
    accessor: Arc<RuntimeAccessor>,
    supported: bool,
    slots: HashMap<String, usize>,
}

impl ObjectiveRecorder {
    /// Build a recorder, reading existing objective ids from the LMS.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the existing objectives cannot be read.
    pub fn load(
        accessor: Arc<RuntimeAccessor>,
        capabilities: &Capabilities,
    ) -> Result<Self, AdapterError> {
        let mut recorder = Self {
            accessor,
            supported: capabilities.supports_objectives(),
            slots: HashMap::new(),
        };
        if recorder.supported {
            recorder
                .seed()
                .map_err(|e| e.context("unable to load existing objectives from LMS"))?;
        }
        Ok(recorder)
    }

    fn seed(&mut self) -> Result<(), AdapterError> {
        let count = self.host_count()?;
        for slot in 0..count {
            let id = self.accessor.get(&format!("cmi.objectives.{slot}.id"))?;
            if !id.is_empty() {
                self.slots.insert(id, slot);
            }
        }
        debug!(count, "seeded objective index from LMS");
        Ok(())
    }

    fn host_count(&self) -> Result<usize, AdapterError> {
        let raw = self.accessor.get(OBJECTIVES_COUNT)?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(0);
        }
        trimmed.parse().map_err(|_| AdapterError::InvalidCount {
            key: OBJECTIVES_COUNT.into(),
            raw,
        })
    }

    fn next_local_slot(&self) -> usize {
        self.slots.values().max().map_or(0, |slot| slot + 1)
    }

    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// Slot currently assigned to `id`, if any.
    #[must_use]
    pub fn slot_of(&self, id: &str) -> Option<usize> {
        self.slots.get(id).copied()
    }

    /// Number of objectives tracked locally.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Validate and record an objective.
    ///
    /// Returns the slot written, or `None` when the LMS has no objective
    /// support (nothing is validated or written in that case).
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the status is invalid or a write fails.
    pub fn add(&mut self, draft: ObjectiveDraft) -> Result<Option<usize>, AdapterError> {
        if !self.supported {
            return Ok(None);
        }
        let objective = draft
            .validate()
            .map_err(|e| AdapterError::from(e).context("error adding objective"))?;
        self.record(&objective).map(Some)
    }

    /// Record an already-validated objective, reusing its slot if known.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the slot cannot be allocated or a write fails.
    pub fn record(&mut self, objective: &Objective) -> Result<usize, AdapterError> {
        self.write(objective)
            .map_err(|e| e.context("error adding objective"))
    }

    fn write(&mut self, objective: &Objective) -> Result<usize, AdapterError> {
        let slot = match self.slots.get(&objective.id) {
            Some(slot) => *slot,
            None => {
                // A host without a readable count must not hand out slot 0 twice.
                let slot = self.host_count()?.max(self.next_local_slot());
                self.slots.insert(objective.id.clone(), slot);
                debug!(id = %objective.id, slot, "allocated objective slot");
                slot
            }
        };

        let prefix = format!("cmi.objectives.{slot}");
        self.accessor.set(&format!("{prefix}.id"), &objective.id)?;
        self.accessor
            .set(&format!("{prefix}.status"), objective.status.as_str())?;
        self.accessor
            .set(&format!("{prefix}.score.min"), &objective.score_min.to_string())?;
        self.accessor
            .set(&format!("{prefix}.score.max"), &objective.score_max.to_string())?;
        self.accessor
            .set(&format!("{prefix}.score.raw"), &objective.score_raw.to_string())?;
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::host::{HostApi, InMemoryHost};

    fn recorder_for(host: &InMemoryHost) -> ObjectiveRecorder {
        let accessor = Arc::new(RuntimeAccessor::new(Arc::new(host.clone())));
        accessor.connect().unwrap();
        let caps = Capabilities {
            objectives: Capabilities::parse_children("id,score,status"),
            ..Capabilities::default()
        };
        ObjectiveRecorder::load(accessor, &caps).unwrap()
    }

    #[test]
    fn repeated_id_updates_the_same_slot() {
        let host = InMemoryHost::scorm_12();
        let mut recorder = recorder_for(&host);

        let first = recorder
            .add(ObjectiveDraft::new("L1", "incomplete"))
            .unwrap();
        let second = recorder
            .add(ObjectiveDraft::new("L1", "passed").with_scores(0.0, 10.0, 9.0))
            .unwrap();

        assert_eq!(first, Some(0));
        assert_eq!(second, Some(0));
        assert_eq!(recorder.len(), 1);
        assert_eq!(host.get_value("cmi.objectives._count").unwrap(), "1");
        assert_eq!(
            host.value("cmi.objectives.0.status").as_deref(),
            Some("passed")
        );
        assert_eq!(host.value("cmi.objectives.0.score.raw").as_deref(), Some("9"));
        assert!(host.value("cmi.objectives.1.id").is_none());
    }

    #[test]
    fn writes_fields_in_order() {
        let host = InMemoryHost::scorm_12();
        let mut recorder = recorder_for(&host);
        recorder
            .add(ObjectiveDraft::new("L7", "failed").with_scores(0.0, 5.0, 2.5))
            .unwrap();

        let keys: Vec<String> = host.writes().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                "cmi.objectives.0.id",
                "cmi.objectives.0.status",
                "cmi.objectives.0.score.min",
                "cmi.objectives.0.score.max",
                "cmi.objectives.0.score.raw",
            ]
        );
        assert_eq!(host.value("cmi.objectives.0.score.raw").as_deref(), Some("2.5"));
    }

    #[test]
    fn index_is_seeded_from_existing_objectives() {
        let host = InMemoryHost::scorm_12()
            .with_value("cmi.objectives.0.id", "intro")
            .with_value("cmi.objectives.1.id", "quiz");
        let mut recorder = recorder_for(&host);
        assert_eq!(recorder.slot_of("quiz"), Some(1));

        let slot = recorder.add(ObjectiveDraft::new("quiz", "passed")).unwrap();
        assert_eq!(slot, Some(1));
        let slot = recorder.add(ObjectiveDraft::new("outro", "browsed")).unwrap();
        assert_eq!(slot, Some(2));
    }

    #[test]
    fn unreadable_count_still_allocates_distinct_slots() {
        let host = InMemoryHost::scorm_12().with_read_error("cmi.objectives._count", "401");
        let mut recorder = recorder_for(&host);

        assert_eq!(recorder.add(ObjectiveDraft::new("A", "passed")).unwrap(), Some(0));
        assert_eq!(recorder.add(ObjectiveDraft::new("B", "failed")).unwrap(), Some(1));
        assert_eq!(recorder.add(ObjectiveDraft::new("A", "passed")).unwrap(), Some(0));

        assert_eq!(host.value("cmi.objectives.0.id").as_deref(), Some("A"));
        assert_eq!(host.value("cmi.objectives.1.id").as_deref(), Some("B"));
    }

    #[test]
    fn invalid_status_is_rejected_before_writing() {
        let host = InMemoryHost::scorm_12();
        let mut recorder = recorder_for(&host);
        let err = recorder
            .add(ObjectiveDraft::new("L1", "done"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(host.writes().is_empty());
    }

    #[test]
    fn unsupported_lms_is_a_no_op() {
        let host = InMemoryHost::new();
        let accessor = Arc::new(RuntimeAccessor::new(Arc::new(host.clone())));
        accessor.connect().unwrap();
        let mut recorder = ObjectiveRecorder::load(accessor, &Capabilities::default()).unwrap();
        assert!(!recorder.is_supported());
        assert_eq!(recorder.add(ObjectiveDraft::new("L1", "nonsense")).unwrap(), None);
        assert!(host.writes().is_empty());
    }
}
