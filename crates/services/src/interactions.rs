use std::sync::Arc;

use cmi_core::model::{Capabilities, Interaction, InteractionDraft, ObjectiveDraft};
use tracing::debug;

use crate::accessor::RuntimeAccessor;
use crate::error::AdapterError;
use crate::objectives::ObjectiveRecorder;

const INTERACTIONS_COUNT: &str = "cmi.interactions._count";

/// Appends quiz interactions to `cmi.interactions.N.*`.
///
/// When the LMS supports objectives, each interaction also records an
/// objective with the same identifier so reports can link the two.
pub struct InteractionRecorder {
    accessor: Arc<RuntimeAccessor>,
    objectives: ObjectiveRecorder,
    supported_elements: Vec<String>,
}

impl InteractionRecorder {
    #[must_use]
    pub fn new(
        accessor: Arc<RuntimeAccessor>,
        objectives: ObjectiveRecorder,
        capabilities: &Capabilities,
    ) -> Self {
        Self {
            accessor,
            objectives,
            supported_elements: capabilities.interactions.clone(),
        }
    }

    /// Element names listed in `cmi.interactions._children`.
    #[must_use]
    pub fn supported_elements(&self) -> &[String] {
        &self.supported_elements
    }

    #[must_use]
    pub fn objectives(&self) -> &ObjectiveRecorder {
        &self.objectives
    }

    pub fn objectives_mut(&mut self) -> &mut ObjectiveRecorder {
        &mut self.objectives
    }

    /// Validate and record one interaction.
    ///
    /// Returns `false` without writing when the LMS does not report a usable
    /// interaction count. Writes are not transactional: a failure part way
    /// leaves the earlier fields in place.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the draft is invalid or any write fails.
    pub fn add(
        &mut self,
        draft: InteractionDraft,
        inside_assessment: bool,
    ) -> Result<bool, AdapterError> {
        self.write(draft, inside_assessment)
            .map_err(|e| e.context("unable to add interaction"))
    }

    fn write(
        &mut self,
        draft: InteractionDraft,
        inside_assessment: bool,
    ) -> Result<bool, AdapterError> {
        let interaction = draft.validate()?;

        let raw_count = self.accessor.get(INTERACTIONS_COUNT)?;
        let Ok(position) = raw_count.trim().parse::<usize>() else {
            debug!(raw = %raw_count, "LMS does not support interactions");
            return Ok(false);
        };

        if self.objectives.is_supported() {
            let status = interaction.result().objective_status(inside_assessment);
            let objective = ObjectiveDraft::new(interaction.id(), status.as_str())
                .with_scores(
                    interaction.score_min(),
                    interaction.score_max(),
                    interaction.score_raw(),
                )
                .validate()?;
            self.objectives.record(&objective)?;
            self.accessor.set(
                &format!("cmi.interactions.{position}.objectives.0.id"),
                &objective.id,
            )?;
        }

        self.write_fields(position, &interaction)?;
        debug!(id = interaction.id(), position, "recorded interaction");
        Ok(true)
    }

    fn write_fields(&self, position: usize, interaction: &Interaction) -> Result<(), AdapterError> {
        let prefix = format!("cmi.interactions.{position}");
        self.accessor.set(&format!("{prefix}.id"), interaction.id())?;
        self.accessor
            .set(&format!("{prefix}.type"), interaction.kind().as_str())?;
        self.accessor.set(&format!("{prefix}.time"), interaction.time())?;
        self.accessor
            .set(&format!("{prefix}.latency"), interaction.latency())?;
        self.accessor
            .set(&format!("{prefix}.result"), interaction.result().as_str())?;

        for (slot, pattern) in interaction.correct_response_patterns().iter().enumerate() {
            self.accessor.set(
                &format!("{prefix}.correct_responses.{slot}.pattern"),
                pattern,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::host::InMemoryHost;

    fn recorder_for(host: &InMemoryHost, caps: &Capabilities) -> InteractionRecorder {
        let accessor = Arc::new(RuntimeAccessor::new(Arc::new(host.clone())));
        accessor.connect().unwrap();
        let objectives = ObjectiveRecorder::load(Arc::clone(&accessor), caps).unwrap();
        InteractionRecorder::new(accessor, objectives, caps)
    }

    fn interactions_only() -> Capabilities {
        Capabilities {
            interactions: Capabilities::parse_children("id,type,result"),
            ..Capabilities::default()
        }
    }

    #[test]
    fn writes_fields_then_patterns() {
        let host = InMemoryHost::new().with_value("cmi.interactions._children", "id,type");
        let mut recorder = recorder_for(&host, &interactions_only());

        let mut draft = InteractionDraft::new("Question 1", "true-false", "correct")
            .with_correct_responses(["True"]);
        draft.time = "10:15:00".into();
        draft.latency = "0000:00:12.00".into();
        assert!(recorder.add(draft, false).unwrap());

        let writes = host.writes();
        let keys: Vec<&str> = writes.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "cmi.interactions.0.id",
                "cmi.interactions.0.type",
                "cmi.interactions.0.time",
                "cmi.interactions.0.latency",
                "cmi.interactions.0.result",
                "cmi.interactions.0.correct_responses.0.pattern",
            ]
        );
        assert_eq!(host.value("cmi.interactions.0.id").as_deref(), Some("Question_1"));
        assert_eq!(
            host.value("cmi.interactions.0.correct_responses.0.pattern")
                .as_deref(),
            Some("1")
        );
    }

    #[test]
    fn second_interaction_takes_next_slot() {
        let host = InMemoryHost::new().with_value("cmi.interactions._children", "id,type");
        let mut recorder = recorder_for(&host, &interactions_only());
        recorder
            .add(InteractionDraft::new("q1", "likert", "neutral"), false)
            .unwrap();
        recorder
            .add(
                InteractionDraft::new("q2", "choice", "wrong").with_correct_responses(["ab,cd", "x"]),
                false,
            )
            .unwrap();

        assert_eq!(host.value("cmi.interactions.1.id").as_deref(), Some("q2"));
        assert_eq!(
            host.value("cmi.interactions.1.correct_responses.0.pattern")
                .as_deref(),
            Some("a,c")
        );
        assert_eq!(
            host.value("cmi.interactions.1.correct_responses.1.pattern")
                .as_deref(),
            Some("x")
        );
    }

    #[test]
    fn lms_without_interaction_count_returns_false() {
        let host = InMemoryHost::new();
        let mut recorder = recorder_for(&host, &Capabilities::default());
        let added = recorder
            .add(InteractionDraft::new("q1", "fill-in", "correct"), true)
            .unwrap();
        assert!(!added);
        assert!(host.writes().is_empty());
    }

    #[test]
    fn invalid_drafts_never_reach_the_host() {
        let host = InMemoryHost::scorm_12();
        let mut recorder = recorder_for(&host, &interactions_only());

        let err = recorder
            .add(InteractionDraft::new("q1", "essay", "correct"), false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = recorder
            .add(InteractionDraft::new("q1", "choice", "unanticipated"), false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = recorder
            .add(
                InteractionDraft::new("q1", "true-false", "correct").with_correct_responses(["t", "f"]),
                false,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(host.writes().is_empty());
    }

    #[test]
    fn blank_names_are_rejected_before_any_write() {
        let host = InMemoryHost::scorm_12();
        let caps = Capabilities {
            interactions: Capabilities::parse_children("id,objectives,type,result"),
            objectives: Capabilities::parse_children("id,score,status"),
            ..Capabilities::default()
        };
        let mut recorder = recorder_for(&host, &caps);

        for name in ["", "   "] {
            let err = recorder
                .add(InteractionDraft::new(name, "fill-in", "correct"), true)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert!(host.writes().is_empty());
        assert!(recorder.objectives().is_empty());
    }

    #[test]
    fn failed_write_keeps_earlier_fields() {
        let host = InMemoryHost::new()
            .with_value("cmi.interactions._children", "id,type,time,latency")
            .refusing_writes_to("cmi.interactions.0.time");
        let mut recorder = recorder_for(&host, &interactions_only());

        let mut draft = InteractionDraft::new("q1", "likert", "neutral");
        draft.time = "09:30:00".into();
        draft.latency = "0000:00:05.00".into();
        let err = recorder.add(draft, false).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::HostProtocol);
        assert!(err.to_string().contains("unable to add interaction"));
        assert_eq!(host.value("cmi.interactions.0.id").as_deref(), Some("q1"));
        assert_eq!(host.value("cmi.interactions.0.type").as_deref(), Some("likert"));
        assert!(host.value("cmi.interactions.0.latency").is_none());
    }

    #[test]
    fn companion_objective_is_written_first() {
        let host = InMemoryHost::scorm_12();
        let caps = Capabilities {
            interactions: Capabilities::parse_children("id,objectives,type,result"),
            objectives: Capabilities::parse_children("id,score,status"),
            ..Capabilities::default()
        };
        let mut recorder = recorder_for(&host, &caps);

        let mut draft = InteractionDraft::new("L 1234", "matching", "wrong")
            .with_correct_responses(["1.a", "2.b"]);
        draft.score_max = 1.0;
        assert!(recorder.add(draft, true).unwrap());

        let writes = host.writes();
        assert_eq!(writes[0], ("cmi.objectives.0.id".into(), "L_1234".into()));
        assert_eq!(writes[1], ("cmi.objectives.0.status".into(), "failed".into()));
        assert_eq!(
            writes[5],
            ("cmi.interactions.0.objectives.0.id".into(), "L_1234".into())
        );
        assert_eq!(writes[6], ("cmi.interactions.0.id".into(), "L_1234".into()));
        assert_eq!(
            host.value("cmi.interactions.0.correct_responses.0.pattern")
                .as_deref(),
            Some("1.a,2.b")
        );
        assert_eq!(recorder.objectives().slot_of("L_1234"), Some(0));
    }
}
