mod capabilities;
mod interaction;
mod objective;
mod session;
mod status;

pub use capabilities::Capabilities;
pub use interaction::{
    Interaction, InteractionDraft, InteractionError, InteractionResult, InteractionType,
    MAX_CHOICES, MAX_IDENTIFIER_CHARS, encode_correct_responses, interaction_id,
};
pub use objective::{Objective, ObjectiveDraft, ObjectiveError};
pub use session::{LOCATION_SENTINEL, SessionState, parse_leading_int, parse_score};
pub use status::{Entry, ExitStatus, LessonStatus, StatusError};
