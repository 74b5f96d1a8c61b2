/// What the LMS said it supports, probed once through the `._children` keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub core: Vec<String>,
    pub student_data: Vec<String>,
    pub interactions: Vec<String>,
    pub objectives: Vec<String>,
}

impl Capabilities {
    /// Split a `._children` value (`"id,status,score"`) into element names.
    #[must_use]
    pub fn parse_children(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect()
    }

    #[must_use]
    pub fn supports_interactions(&self) -> bool {
        !self.interactions.is_empty()
    }

    #[must_use]
    pub fn supports_objectives(&self) -> bool {
        !self.objectives.is_empty()
    }

    #[must_use]
    pub fn supports_core(&self, element: &str) -> bool {
        self.core.iter().any(|e| e == element)
    }

    #[must_use]
    pub fn supports_student_data(&self, element: &str) -> bool {
        self.student_data.iter().any(|e| e == element)
    }
}
