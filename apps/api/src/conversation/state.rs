//! Conversation State Tracker.
//!
//! The state lives with the client and is re-derived on every turn by the pure
//! `transition` function from what was just said, plus the CV classifier verdict.

use serde::{Deserialize, Serialize};

use crate::chains::CvDecision;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    CollectingAnswers,
    #[serde(rename_all = "camelCase")]
    AwaitingResume { resume_url: Option<String> },
    #[serde(rename_all = "camelCase")]
    AwaitingPhoto { resume_url: String },
    #[serde(rename_all = "camelCase")]
    ReadyToFinish {
        resume_url: String,
        photo_url: Option<String>,
    },
    Completed,
}

/// What happened since the state was last evaluated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TurnObservation {
    pub assistant_text: Option<String>,
    pub user_text: Option<String>,
    pub cv_request: Option<CvDecision>,
    pub resume_url: Option<String>,
    pub photo_url: Option<String>,
    pub finalized: bool,
}

/// Which controls the chat UI should offer in a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiAffordances {
    pub resume_upload: bool,
    pub photo_upload: bool,
    pub finish: bool,
    pub accepts_input: bool,
}

impl ConversationState {
    pub fn is_completed(&self) -> bool {
        matches!(self, ConversationState::Completed)
    }

    pub fn affordances(&self) -> UiAffordances {
        let (resume_upload, photo_upload, finish) = match self {
            ConversationState::CollectingAnswers => (false, false, false),
            ConversationState::AwaitingResume { .. } => (true, false, false),
            ConversationState::AwaitingPhoto { .. } => (false, true, false),
            ConversationState::ReadyToFinish { .. } => (false, false, true),
            ConversationState::Completed => (false, false, false),
        };
        UiAffordances {
            resume_upload,
            photo_upload,
            finish,
            accepts_input: !self.is_completed(),
        }
    }
}

/// `(state, latest observations) -> state`. Completed is terminal.
pub fn transition(state: ConversationState, observation: &TurnObservation) -> ConversationState {
    use ConversationState::*;

    match state {
        Completed => Completed,

        CollectingAnswers => match observation.cv_request {
            Some(CvDecision::Yes) => AwaitingResume {
                resume_url: observation.resume_url.clone(),
            },
            _ => CollectingAnswers,
        },

        AwaitingResume { resume_url } => {
            let resume_url = observation.resume_url.clone().or(resume_url);
            match resume_url {
                Some(url)
                    if observation
                        .assistant_text
                        .as_deref()
                        .is_some_and(offers_photo_upload) =>
                {
                    AwaitingPhoto { resume_url: url }
                }
                // The upload request turned out to be a misfire.
                None if observation.cv_request == Some(CvDecision::No) => CollectingAnswers,
                resume_url => AwaitingResume { resume_url },
            }
        }

        AwaitingPhoto { resume_url } => {
            if let Some(photo) = observation.photo_url.clone() {
                ReadyToFinish {
                    resume_url,
                    photo_url: Some(photo),
                }
            } else if observation
                .user_text
                .as_deref()
                .is_some_and(declines_photo)
            {
                ReadyToFinish {
                    resume_url,
                    photo_url: None,
                }
            } else {
                AwaitingPhoto { resume_url }
            }
        }

        ReadyToFinish {
            resume_url,
            photo_url,
        } => {
            if observation.finalized {
                Completed
            } else {
                ReadyToFinish {
                    resume_url,
                    photo_url: observation.photo_url.clone().or(photo_url),
                }
            }
        }
    }
}

/// The assistant offers an optional photo: "profile picture" plus a yes/skip choice.
pub fn offers_photo_upload(assistant_text: &str) -> bool {
    let text = assistant_text.to_lowercase();
    let words = words(&text);
    text.contains("profile picture")
        && words.iter().any(|w| *w == "yes" || *w == "skip")
}

/// The applicant turns the photo offer down.
pub fn declines_photo(user_text: &str) -> bool {
    let text = user_text.to_lowercase();
    let words = words(&text);
    match words.first() {
        Some(&"skip") | Some(&"no") | Some(&"nope") => true,
        _ => words.contains(&"skip"),
    }
}

fn words(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}
