use serde::{Deserialize, Serialize};

use crate::domain::{AnswerOutcome, GameId, LeaderboardEntry, PlayerId, Question, QuestionId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub player_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResponse {
    pub player_id: PlayerId,
    pub game_id: GameId,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRequest {
    pub game_id: GameId,
    pub player_id: PlayerId,
}

/// Every field defaults so the end-of-questions sentinel deserializes
/// regardless of which fields the service omits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionCard {
    #[serde(default)]
    pub question_id: QuestionId,
    #[serde(default)]
    pub question_text: String,
    #[serde(default)]
    pub options: Vec<String>,
}

impl QuestionCard {
    /// `None` when the card carries the end-of-questions sentinel.
    pub fn into_question(self) -> Option<Question> {
        if self.question_text.is_empty() {
            return None;
        }
        Some(Question {
            question_id: self.question_id,
            text: self.question_text,
            options: self.options,
        })
    }
}

/// `answer_timestamp` is unix epoch milliseconds captured at submit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub question_id: QuestionId,
    pub selected_option: String,
    pub answer_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResult {
    pub correct: bool,
    pub points_awarded: u32,
    #[serde(default)]
    pub explanation: String,
}

impl From<AnswerResult> for AnswerOutcome {
    fn from(result: AnswerResult) -> Self {
        Self {
            correct: result.correct,
            points_awarded: result.points_awarded,
            explanation: result.explanation,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardSnapshot {
    pub entries: Vec<LeaderboardEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_card_with_text_becomes_a_question() {
        let card = QuestionCard {
            question_id: QuestionId::new("q1"),
            question_text: "2+2?".to_string(),
            options: vec!["3".to_string(), "4".to_string()],
        };

        let question = card.into_question().expect("question");
        assert_eq!(question.question_id, QuestionId::new("q1"));
        assert_eq!(question.text, "2+2?");
        assert_eq!(question.options, vec!["3", "4"]);
    }

    #[test]
    fn empty_question_text_is_the_end_sentinel() {
        assert!(QuestionCard::default().into_question().is_none());
    }

    #[test]
    fn answer_result_maps_onto_outcome() {
        let outcome: AnswerOutcome = AnswerResult {
            correct: true,
            points_awarded: 10,
            explanation: "Basic math".to_string(),
        }
        .into();

        assert!(outcome.correct);
        assert_eq!(outcome.points_awarded, 10);
        assert_eq!(outcome.explanation, "Basic math");
    }
}
