use std::fmt;

use thiserror::Error;

use crate::model::LessonStatus;

/// Longest identifier the CMI data model accepts.
pub const MAX_IDENTIFIER_CHARS: usize = 255;

/// Most choices a single `choice` response field may hold.
pub const MAX_CHOICES: usize = 26;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum InteractionError {
    #[error("interaction name cannot be empty")]
    EmptyName,

    #[error("invalid interaction type: {0:?}")]
    InvalidType(String),

    #[error("invalid interaction result {0:?}; result must be correct, wrong or neutral")]
    InvalidResult(String),

    #[error("a true-false interaction takes exactly one correct response, got {0}")]
    TrueFalsePatternCount(usize),

    #[error("invalid response value for true-false interaction: {0:?}")]
    InvalidTrueFalse(String),

    #[error(
        "more than 26 possible choices is not allowed in a choice interaction ({0}); \
         use a performance interaction instead"
    )]
    TooManyChoices(usize),
}

//
// ─── VOCABULARIES ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionType {
    TrueFalse,
    Choice,
    FillIn,
    Matching,
    Performance,
    Sequencing,
    Likert,
    Numeric,
}

impl InteractionType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionType::TrueFalse => "true-false",
            InteractionType::Choice => "choice",
            InteractionType::FillIn => "fill-in",
            InteractionType::Matching => "matching",
            InteractionType::Performance => "performance",
            InteractionType::Sequencing => "sequencing",
            InteractionType::Likert => "likert",
            InteractionType::Numeric => "numeric",
        }
    }

    /// # Errors
    ///
    /// Returns `InteractionError::InvalidType` for anything outside the eight types.
    pub fn parse(value: &str) -> Result<Self, InteractionError> {
        match value.trim().to_lowercase().as_str() {
            "true-false" => Ok(Self::TrueFalse),
            "choice" => Ok(Self::Choice),
            "fill-in" => Ok(Self::FillIn),
            "matching" => Ok(Self::Matching),
            "performance" => Ok(Self::Performance),
            "sequencing" => Ok(Self::Sequencing),
            "likert" => Ok(Self::Likert),
            "numeric" => Ok(Self::Numeric),
            _ => Err(InteractionError::InvalidType(value.to_owned())),
        }
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionResult {
    Correct,
    Wrong,
    Unanticipated,
    Neutral,
}

impl InteractionResult {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionResult::Correct => "correct",
            InteractionResult::Wrong => "wrong",
            InteractionResult::Unanticipated => "unanticipated",
            InteractionResult::Neutral => "neutral",
        }
    }

    /// # Errors
    ///
    /// Returns `InteractionError::InvalidResult` for values outside the vocabulary.
    pub fn parse(value: &str) -> Result<Self, InteractionError> {
        match value.trim().to_lowercase().as_str() {
            "correct" => Ok(Self::Correct),
            "wrong" => Ok(Self::Wrong),
            "unanticipated" => Ok(Self::Unanticipated),
            "neutral" => Ok(Self::Neutral),
            _ => Err(InteractionError::InvalidResult(value.to_owned())),
        }
    }

    /// Status of the objective synthesized for an interaction with this result.
    #[must_use]
    pub fn objective_status(self, inside_assessment: bool) -> LessonStatus {
        match (self, inside_assessment) {
            (InteractionResult::Correct, true) => LessonStatus::Passed,
            (InteractionResult::Wrong, true) => LessonStatus::Failed,
            (InteractionResult::Correct | InteractionResult::Wrong, false)
            | (InteractionResult::Neutral, _) => LessonStatus::Completed,
            (InteractionResult::Unanticipated, _) => LessonStatus::Incomplete,
        }
    }
}

impl fmt::Display for InteractionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── DRAFT / VALIDATED INTERACTION ─────────────────────────────────────────────
//

/// A quiz event as content authors describe it, before validation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InteractionDraft {
    pub name: String,
    pub kind: String,
    pub result: String,
    pub time: String,
    pub latency: String,
    pub score_raw: f64,
    pub score_min: f64,
    pub score_max: f64,
    pub correct_responses: Vec<String>,
    pub student_response: Vec<String>,
}

/// A validated interaction ready to be written to `cmi.interactions.N.*`.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    id: String,
    kind: InteractionType,
    result: InteractionResult,
    time: String,
    latency: String,
    score_raw: f64,
    score_min: f64,
    score_max: f64,
    patterns: Vec<String>,
}

impl InteractionDraft {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            result: result.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_correct_responses<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.correct_responses = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Validate type and result and encode the correct-response patterns.
    ///
    /// # Errors
    ///
    /// Returns `InteractionError` if the name is blank, the type or result is
    /// out of domain, or the patterns cannot be encoded for the interaction type.
    pub fn validate(self) -> Result<Interaction, InteractionError> {
        if self.name.trim().is_empty() {
            return Err(InteractionError::EmptyName);
        }
        let kind = InteractionType::parse(&self.kind)?;
        let result = InteractionResult::parse(&self.result)?;
        if result == InteractionResult::Unanticipated {
            return Err(InteractionError::InvalidResult(self.result));
        }
        let patterns = encode_correct_responses(kind, &self.correct_responses)?;

        Ok(Interaction {
            id: interaction_id(&self.name),
            kind,
            result,
            time: self.time,
            latency: self.latency,
            score_raw: self.score_raw,
            score_min: self.score_min,
            score_max: self.score_max,
            patterns,
        })
    }
}

impl Interaction {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn kind(&self) -> InteractionType {
        self.kind
    }

    #[must_use]
    pub fn result(&self) -> InteractionResult {
        self.result
    }

    #[must_use]
    pub fn time(&self) -> &str {
        &self.time
    }

    #[must_use]
    pub fn latency(&self) -> &str {
        &self.latency
    }

    #[must_use]
    pub fn score_raw(&self) -> f64 {
        self.score_raw
    }

    #[must_use]
    pub fn score_min(&self) -> f64 {
        self.score_min
    }

    #[must_use]
    pub fn score_max(&self) -> f64 {
        self.score_max
    }

    /// Encoded patterns, one per `correct_responses.N.pattern` slot.
    #[must_use]
    pub fn correct_response_patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// Spaces become underscores and the result is cut to the CMI identifier limit.
#[must_use]
pub fn interaction_id(name: &str) -> String {
    name.replace(' ', "_")
        .chars()
        .take(MAX_IDENTIFIER_CHARS)
        .collect()
}

//
// ─── CORRECT RESPONSE ENCODING ─────────────────────────────────────────────────
//

/// Encode authored patterns into the per-type CMI response format.
///
/// Performance, numeric and likert interactions produce no patterns.
///
/// # Errors
///
/// Returns `InteractionError` for an unencodable true-false or choice pattern.
pub fn encode_correct_responses(
    kind: InteractionType,
    patterns: &[String],
) -> Result<Vec<String>, InteractionError> {
    let Some(first) = patterns.first() else {
        return Ok(Vec::new());
    };

    match kind {
        InteractionType::TrueFalse => {
            if patterns.len() > 1 {
                return Err(InteractionError::TrueFalsePatternCount(patterns.len()));
            }
            Ok(vec![encode_true_false(first)?])
        }
        InteractionType::Choice => patterns.iter().map(|p| encode_choice(p)).collect(),
        InteractionType::FillIn => Ok(vec![first.clone()]),
        InteractionType::Matching | InteractionType::Sequencing => Ok(vec![patterns.join(",")]),
        InteractionType::Performance | InteractionType::Numeric | InteractionType::Likert => {
            Ok(Vec::new())
        }
    }
}

fn encode_true_false(pattern: &str) -> Result<String, InteractionError> {
    let first: String = pattern.chars().take(1).flat_map(char::to_lowercase).collect();
    match first.as_str() {
        "t" | "1" => Ok("1".to_owned()),
        "f" | "0" => Ok("0".to_owned()),
        _ => Err(InteractionError::InvalidTrueFalse(pattern.to_owned())),
    }
}

// Only the first character of each label is significant.
fn encode_choice(pattern: &str) -> Result<String, InteractionError> {
    let labels: Vec<&str> = pattern.split(',').collect();
    if labels.len() > MAX_CHOICES {
        return Err(InteractionError::TooManyChoices(labels.len()));
    }
    if let Some(long) = labels.iter().find(|l| l.chars().count() > MAX_CHOICES) {
        return Err(InteractionError::TooManyChoices(long.chars().count()));
    }

    let encoded: Vec<String> = labels
        .iter()
        .map(|label| label.chars().take(1).collect())
        .collect();
    Ok(encoded.join(","))
}
