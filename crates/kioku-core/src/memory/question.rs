//! Question rendering
//!
//! Turns a learning state and the content of its knowledge unit into a prompt.
//! Rendering is a pure function: it reads the state's facet and never touches
//! scheduling fields.

use serde::{Deserialize, Serialize};

use super::{Facet, LearningState};

/// Content of a knowledge unit, supplied by the content layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeUnitDetails {
    pub ku_id: String,
    /// The thing being learned (a word, kanji, phrase...)
    pub subject: String,
    #[serde(default)]
    pub meanings: Vec<String>,
    #[serde(default)]
    pub readings: Vec<String>,
    /// Example sentence with the subject, used for cloze prompts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloze: Option<String>,
}

/// A prompt shown to the learner plus its accepted answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub ku_id: String,
    pub facet: Facet,
    pub prompt: String,
    pub answers: Vec<String>,
}

impl Question {
    /// Trimmed, case-insensitive match against any accepted answer
    pub fn accepts(&self, answer: &str) -> bool {
        let answer = answer.trim().to_lowercase();
        !answer.is_empty()
            && self
                .answers
                .iter()
                .any(|a| a.trim().to_lowercase() == answer)
    }
}

const CLOZE_BLANK: &str = "＿＿";

/// Render the question for a state's facet
pub fn render(state: &LearningState, details: &KnowledgeUnitDetails) -> Question {
    let (prompt, answers) = match &state.facet {
        Facet::Meaning => (
            format!("What does {} mean?", details.subject),
            details.meanings.clone(),
        ),
        Facet::Reading => (
            format!("How is {} read?", details.subject),
            details.readings.clone(),
        ),
        Facet::Cloze => match &details.cloze {
            Some(sentence) if sentence.contains(&details.subject) => (
                format!(
                    "Fill in the blank: {}",
                    sentence.replacen(&details.subject, CLOZE_BLANK, 1)
                ),
                vec![details.subject.clone()],
            ),
            // No usable sentence: fall back to recalling the subject from its meaning
            _ => (
                format!("Which word means \"{}\"?", details.meanings.join(", ")),
                vec![details.subject.clone()],
            ),
        },
        Facet::Other(name) => (
            format!("{} ({})", details.subject, name),
            details
                .meanings
                .iter()
                .chain(details.readings.iter())
                .cloned()
                .collect(),
        ),
    };

    Question {
        ku_id: state.ku_id.clone(),
        facet: state.facet.clone(),
        prompt,
        answers,
    }
}
