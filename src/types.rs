use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{serde::rfc3339, OffsetDateTime};
use uuid::Uuid;

pub type UserId = Uuid;

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// The four steps every module walks through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    SocraticDialogue,
    PromptWriting,
    ComparisonLab,
    ReflectionJournal,
}

text_enum!(StepType, "step type", {
    SocraticDialogue => "socratic_dialogue",
    PromptWriting => "prompt_writing",
    ComparisonLab => "comparison_lab",
    ReflectionJournal => "reflection_journal",
});

impl StepType {
    pub const ORDER: [StepType; 4] = [
        StepType::SocraticDialogue,
        StepType::PromptWriting,
        StepType::ComparisonLab,
        StepType::ReflectionJournal,
    ];

    pub fn index(self) -> usize {
        match self {
            StepType::SocraticDialogue => 0,
            StepType::PromptWriting => 1,
            StepType::ComparisonLab => 2,
            StepType::ReflectionJournal => 3,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            StepType::SocraticDialogue => "소크라테스 대화",
            StepType::PromptWriting => "프롬프트 작성",
            StepType::ComparisonLab => "비교 실험실",
            StepType::ReflectionJournal => "성찰 저널",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

text_enum!(ProgressStatus, "progress status", {
    NotStarted => "not_started",
    InProgress => "in_progress",
    Completed => "completed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Tutor,
    Student,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Exploration,
    Clarification,
    Assumption,
    Consequence,
    Reflection,
}

text_enum!(QuestionType, "question type", {
    Exploration => "exploration",
    Clarification => "clarification",
    Assumption => "assumption",
    Consequence => "consequence",
    Reflection => "reflection",
});

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub title_en: Option<String>,
    pub description: Option<String>,
    pub description_en: Option<String>,
    pub techniques: Vec<String>,
    pub policy_context: String,
    pub order_index: i32,
    pub is_active: bool,
    pub prerequisite_module_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub title_en: Option<String>,
    pub category: String,
    pub context: String,
    pub context_en: Option<String>,
    pub is_active: bool,
}

/// One scripted question of a module's Socratic dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocraticQuestion {
    pub module_id: Uuid,
    pub order_index: i32,
    pub question_type: QuestionType,
    pub question_text: String,
}

/// A learner's progress through one module.
///
/// `current_step` is `None` both before the module is started and after it
/// has been completed; `status` tells the two apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub id: Uuid,
    pub user_id: UserId,
    pub module_id: Uuid,
    pub current_step: Option<StepType>,
    pub status: ProgressStatus,
    #[serde(with = "rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(with = "rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    pub score: Option<i32>,
}

impl UserProgress {
    pub fn is_completed(&self) -> bool {
        self.status == ProgressStatus::Completed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_type: Option<QuestionType>,
    #[serde(with = "rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl Message {
    pub fn tutor(content: impl Into<String>, question_type: QuestionType) -> Self {
        Self {
            role: MessageRole::Tutor,
            content: content.into(),
            question_type: Some(question_type),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn student(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Student,
            content: content.into(),
            question_type: None,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dialogue {
    pub id: Uuid,
    pub progress_id: Uuid,
    pub messages: Vec<Message>,
    pub is_completed: bool,
    #[serde(with = "rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Dialogue {
    pub fn student_turns(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == MessageRole::Student)
            .count()
    }

    pub fn first_tutor_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.role == MessageRole::Tutor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechniqueBadge {
    pub user_id: UserId,
    pub technique: String,
    pub module_id: Uuid,
    #[serde(with = "rfc3339")]
    pub earned_at: OffsetDateTime,
}

/// A prompt-writing draft or reflection-journal entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: Uuid,
    pub progress_id: Uuid,
    pub user_id: UserId,
    pub module_id: Uuid,
    pub step_type: StepType,
    pub content: String,
    #[serde(with = "rfc3339")]
    pub created_at: OffsetDateTime,
}
