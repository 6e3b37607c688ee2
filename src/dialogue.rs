//! The Socratic dialogue of a module's first step.
//!
//! A dialogue is a transcript that opens with a tutor question and grows by
//! one student/tutor pair per [`send_message`]. The module's scripted
//! questions drive the conversation: after each student turn the next
//! question sits at `floor(messages.len() / 2)` of the script.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::store::Store;
use crate::tutor::{Tutor, TutorReply, TutorTurn};
use crate::types::{
    Dialogue, Message, MessageRole, QuestionType, SocraticQuestion, UserId, UserProgress,
};

pub const FALLBACK_OPENING_QUESTION: &str =
    "AI에게 질문할 때 무엇이 결과에 영향을 준다고 생각하나요?";

const TUTOR_UNAVAILABLE_NOTICE: &str =
    "죄송합니다. 지금은 답변을 준비하지 못했어요. 잠시 후 다시 답변을 보내주세요.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogueSettings {
    /// Student turns required before the dialogue may end.
    pub min_student_turns: usize,
}

impl Default for DialogueSettings {
    fn default() -> Self {
        Self {
            min_student_turns: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueState {
    Created,
    Active,
    Eligible,
    Completed,
}

impl DialogueState {
    pub fn of(dialogue: &Dialogue, settings: &DialogueSettings) -> Self {
        let turns = dialogue.student_turns();
        if dialogue.is_completed {
            DialogueState::Completed
        } else if turns == 0 {
            DialogueState::Created
        } else if turns < settings.min_student_turns {
            DialogueState::Active
        } else {
            DialogueState::Eligible
        }
    }
}

/// The tutor message a dialogue opens with.
pub fn opening_question(questions: &[SocraticQuestion]) -> Message {
    match questions.first() {
        Some(first) => Message::tutor(first.question_text.clone(), first.question_type),
        None => Message::tutor(FALLBACK_OPENING_QUESTION, QuestionType::Exploration),
    }
}

/// The scripted question to ask once the transcript holds `message_count`
/// messages.
pub fn next_question(questions: &[SocraticQuestion], message_count: usize) -> Option<&SocraticQuestion> {
    questions.get(message_count / 2)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedDialogue {
    pub dialogue_id: Uuid,
    pub initial_message: Message,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub user_message: Message,
    pub tutor_response: Message,
    pub is_completed: bool,
    pub can_proceed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueView {
    pub dialogue_id: Uuid,
    pub messages: Vec<Message>,
    pub is_completed: bool,
    pub state: DialogueState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDialogueRequest {
    pub progress_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

async fn owned_progress(
    store: &dyn Store,
    progress_id: Uuid,
    actor: UserId,
) -> Result<UserProgress, AppError> {
    let progress = store
        .progress(progress_id)
        .await?
        .ok_or(AppError::NotFound("progress"))?;
    if progress.user_id != actor {
        return Err(AppError::Forbidden("this progress belongs to another learner"));
    }
    Ok(progress)
}

async fn owned_dialogue(
    store: &dyn Store,
    dialogue_id: Uuid,
    actor: UserId,
) -> Result<(Dialogue, UserProgress), AppError> {
    let dialogue = store
        .dialogue(dialogue_id)
        .await?
        .ok_or(AppError::NotFound("dialogue"))?;
    let progress = store
        .progress(dialogue.progress_id)
        .await?
        .ok_or(AppError::NotFound("dialogue"))?;
    if progress.user_id != actor {
        return Err(AppError::Forbidden("this dialogue belongs to another learner"));
    }
    Ok((dialogue, progress))
}

pub async fn create_dialogue(
    store: &dyn Store,
    progress_id: Uuid,
    actor: UserId,
) -> Result<CreatedDialogue, AppError> {
    let progress = owned_progress(store, progress_id, actor).await?;

    if let Some(existing) = store.dialogue_for_progress(progress.id).await? {
        let initial_message = match existing.first_tutor_message() {
            Some(message) => message.clone(),
            None => opening_question(&store.socratic_questions(progress.module_id).await?),
        };
        return Ok(CreatedDialogue {
            dialogue_id: existing.id,
            initial_message,
        });
    }

    let questions = store.socratic_questions(progress.module_id).await?;
    let dialogue = store
        .insert_dialogue(progress.id, opening_question(&questions))
        .await?;

    info!(user_id = %actor, progress_id = %progress.id, dialogue_id = %dialogue.id, "dialogue created");

    let initial_message = dialogue
        .first_tutor_message()
        .cloned()
        .unwrap_or_else(|| opening_question(&questions));
    Ok(CreatedDialogue {
        dialogue_id: dialogue.id,
        initial_message,
    })
}

fn recovery_reply(next: Option<&SocraticQuestion>) -> TutorReply {
    let content = match next {
        Some(question) => format!("{TUTOR_UNAVAILABLE_NOTICE} {}", question.question_text),
        None => TUTOR_UNAVAILABLE_NOTICE.to_string(),
    };
    TutorReply {
        content,
        ready: false,
    }
}

pub async fn send_message(
    store: &dyn Store,
    tutor: &dyn Tutor,
    settings: &DialogueSettings,
    dialogue_id: Uuid,
    content: &str,
    actor: UserId,
) -> Result<SentMessage, AppError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("message content must not be empty".into()));
    }

    let (mut dialogue, progress) = owned_dialogue(store, dialogue_id, actor).await?;
    if dialogue.is_completed {
        return Err(AppError::InvalidState("dialogue already completed"));
    }

    let questions = store.socratic_questions(progress.module_id).await?;
    let module_slug = store
        .module(progress.module_id)
        .await?
        .map(|module| module.slug)
        .unwrap_or_default();

    let user_message = Message::student(content);
    dialogue.messages.push(user_message.clone());

    let next = next_question(&questions, dialogue.messages.len());
    let can_proceed = dialogue.student_turns() >= settings.min_student_turns;
    let history_len = dialogue.messages.len() - 1;

    let turn = TutorTurn {
        module_slug: &module_slug,
        history: &dialogue.messages[..history_len],
        student_message: &user_message.content,
        next_question: next,
        wrap_up: can_proceed,
    };

    let (reply, failed) = match tutor.reply(turn).await {
        Ok(reply) => (reply, false),
        Err(e) => {
            warn!(dialogue_id = %dialogue.id, tutor = tutor.name(), error = %e, "tutor reply failed");
            (recovery_reply(next), true)
        }
    };

    let is_completed = !failed && can_proceed && (next.is_none() || reply.ready);
    let question_type = next
        .map(|question| question.question_type)
        .unwrap_or(QuestionType::Reflection);
    let tutor_response = Message::tutor(reply.content, question_type);

    dialogue.messages.push(tutor_response.clone());
    dialogue.is_completed = is_completed;
    dialogue.updated_at = OffsetDateTime::now_utc();
    store.save_dialogue(&dialogue).await?;

    if is_completed {
        info!(user_id = %actor, dialogue_id = %dialogue.id, "dialogue completed");
    }

    Ok(SentMessage {
        user_message,
        tutor_response,
        is_completed,
        can_proceed,
    })
}

pub async fn get_dialogue(
    store: &dyn Store,
    settings: &DialogueSettings,
    dialogue_id: Uuid,
    actor: UserId,
) -> Result<DialogueView, AppError> {
    let (dialogue, _) = owned_dialogue(store, dialogue_id, actor).await?;
    let state = DialogueState::of(&dialogue, settings);
    Ok(DialogueView {
        dialogue_id: dialogue.id,
        messages: dialogue.messages,
        is_completed: dialogue.is_completed,
        state,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptEntry {
    pub role: ChatRole,
    pub content: String,
}

impl TranscriptEntry {
    fn into_message(self) -> Message {
        match self.role {
            ChatRole::User => Message::student(self.content),
            ChatRole::Assistant => Message {
                role: MessageRole::Tutor,
                content: self.content,
                question_type: None,
                timestamp: OffsetDateTime::now_utc(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocraticTurnRequest {
    pub module_id: Uuid,
    pub user_message: String,
    #[serde(default)]
    pub conversation_history: Vec<TranscriptEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocraticTurn {
    pub message: String,
    pub can_proceed: bool,
}

/// Answer one turn of a transcript the client keeps itself. Nothing is
/// stored, and a tutor failure is returned to the caller.
pub async fn socratic_turn(
    store: &dyn Store,
    tutor: &dyn Tutor,
    settings: &DialogueSettings,
    request: SocraticTurnRequest,
    actor: UserId,
) -> Result<SocraticTurn, AppError> {
    let student_message = request.user_message.trim();
    if student_message.is_empty() {
        return Err(AppError::Validation("userMessage must not be empty".into()));
    }

    let module = store
        .module(request.module_id)
        .await?
        .filter(|m| m.is_active)
        .ok_or(AppError::NotFound("module"))?;
    let questions = store.socratic_questions(module.id).await?;

    let history: Vec<Message> = request
        .conversation_history
        .into_iter()
        .map(TranscriptEntry::into_message)
        .collect();
    let student_turns = history
        .iter()
        .filter(|m| m.role == MessageRole::Student)
        .count()
        + 1;

    let reply = tutor
        .reply(TutorTurn {
            module_slug: &module.slug,
            history: &history,
            student_message,
            next_question: next_question(&questions, history.len() + 1),
            wrap_up: student_turns >= settings.min_student_turns,
        })
        .await?;

    info!(user_id = %actor, module_id = %module.id, tutor = tutor.name(), ready = reply.ready, "socratic turn answered");
    Ok(SocraticTurn {
        message: reply.content,
        can_proceed: reply.ready,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::tutor::{AiError, ScriptedTutor};
    use crate::types::{MessageRole, Module};
    use async_trait::async_trait;

    struct FailingTutor;

    #[async_trait]
    impl Tutor for FailingTutor {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn reply(&self, _turn: TutorTurn<'_>) -> Result<TutorReply, AiError> {
            Err(AiError::EmptyReply)
        }
    }

    struct EagerTutor;

    #[async_trait]
    impl Tutor for EagerTutor {
        fn name(&self) -> &'static str {
            "eager"
        }

        async fn reply(&self, _turn: TutorTurn<'_>) -> Result<TutorReply, AiError> {
            Ok(TutorReply {
                content: "잘 하셨어요.".into(),
                ready: true,
            })
        }
    }

    const TYPES: [QuestionType; 4] = [
        QuestionType::Exploration,
        QuestionType::Clarification,
        QuestionType::Assumption,
        QuestionType::Consequence,
    ];

    async fn seeded(question_count: usize) -> (MemoryStore, UserId, Uuid) {
        let store = MemoryStore::new();
        let module_id = Uuid::new_v4();
        store
            .upsert_module(&Module {
                id: module_id,
                slug: "good-questions".into(),
                title: "좋은 질문이 좋은 답을 만든다".into(),
                title_en: None,
                description: None,
                description_en: None,
                techniques: vec!["명확성".into()],
                policy_context: "test".into(),
                order_index: 1,
                is_active: true,
                prerequisite_module_id: None,
            })
            .await
            .unwrap();

        let questions: Vec<SocraticQuestion> = (0..question_count)
            .map(|i| SocraticQuestion {
                module_id,
                order_index: i as i32 + 1,
                question_type: TYPES[i % TYPES.len()],
                question_text: format!("질문 {}", i + 1),
            })
            .collect();
        store.replace_questions(module_id, &questions).await.unwrap();

        let user = Uuid::new_v4();
        let progress = store
            .insert_progress(user, module_id, OffsetDateTime::now_utc())
            .await
            .unwrap();
        (store, user, progress.id)
    }

    #[tokio::test]
    async fn create_is_idempotent_and_opens_with_first_question() {
        let (store, user, progress_id) = seeded(4).await;

        let first = create_dialogue(&store, progress_id, user).await.unwrap();
        let second = create_dialogue(&store, progress_id, user).await.unwrap();

        assert_eq!(first.dialogue_id, second.dialogue_id);
        assert_eq!(first.initial_message.content, "질문 1");
        assert_eq!(second.initial_message.content, "질문 1");
    }

    #[tokio::test]
    async fn create_falls_back_without_script() {
        let (store, user, progress_id) = seeded(0).await;
        let created = create_dialogue(&store, progress_id, user).await.unwrap();
        assert_eq!(created.initial_message.content, FALLBACK_OPENING_QUESTION);
        assert_eq!(
            created.initial_message.question_type,
            Some(QuestionType::Exploration)
        );
    }

    #[tokio::test]
    async fn other_learners_are_forbidden() {
        let (store, user, progress_id) = seeded(4).await;
        let created = create_dialogue(&store, progress_id, user).await.unwrap();
        let stranger = Uuid::new_v4();

        assert!(matches!(
            create_dialogue(&store, progress_id, stranger).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            send_message(&store, &ScriptedTutor, &DialogueSettings::default(), created.dialogue_id, "hi", stranger).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            get_dialogue(&store, &DialogueSettings::default(), Uuid::new_v4(), user).await,
            Err(AppError::NotFound("dialogue"))
        ));
    }

    #[tokio::test]
    async fn scripted_dialogue_runs_to_completion() {
        let (store, user, progress_id) = seeded(4).await;
        let settings = DialogueSettings::default();
        let id = create_dialogue(&store, progress_id, user).await.unwrap().dialogue_id;

        let mut results = Vec::new();
        for turn in 1..=4 {
            let sent = send_message(&store, &ScriptedTutor, &settings, id, &format!("답변 {turn}"), user)
                .await
                .unwrap();
            results.push((sent.can_proceed, sent.is_completed));
            if turn < 4 {
                assert!(sent.tutor_response.content.ends_with(&format!("질문 {}", turn + 1)));
            }
        }

        assert_eq!(
            results,
            vec![(false, false), (false, false), (true, false), (true, true)]
        );

        let view = get_dialogue(&store, &settings, id, user).await.unwrap();
        assert!(view.is_completed);
        assert_eq!(view.state, DialogueState::Completed);
        assert_eq!(view.messages.len(), 9);
        assert_eq!(view.messages[0].role, MessageRole::Tutor);
        assert_eq!(view.messages[8].question_type, Some(QuestionType::Reflection));

        assert!(matches!(
            send_message(&store, &ScriptedTutor, &settings, id, "more", user).await,
            Err(AppError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn ready_signal_only_counts_after_minimum_turns() {
        let (store, user, progress_id) = seeded(10).await;
        let settings = DialogueSettings::default();
        let id = create_dialogue(&store, progress_id, user).await.unwrap().dialogue_id;

        for _ in 0..2 {
            let sent = send_message(&store, &EagerTutor, &settings, id, "답변", user).await.unwrap();
            assert!(!sent.is_completed);
        }
        let third = send_message(&store, &EagerTutor, &settings, id, "답변", user).await.unwrap();
        assert!(third.can_proceed);
        assert!(third.is_completed);
    }

    #[tokio::test]
    async fn tutor_failure_keeps_dialogue_open() {
        let (store, user, progress_id) = seeded(1).await;
        let settings = DialogueSettings { min_student_turns: 1 };
        let id = create_dialogue(&store, progress_id, user).await.unwrap().dialogue_id;

        let sent = send_message(&store, &FailingTutor, &settings, id, "답변", user).await.unwrap();
        assert!(sent.can_proceed);
        assert!(!sent.is_completed);
        assert!(sent.tutor_response.content.starts_with(TUTOR_UNAVAILABLE_NOTICE));

        let view = get_dialogue(&store, &settings, id, user).await.unwrap();
        assert_eq!(view.messages.len(), 3);
        assert_eq!(view.state, DialogueState::Eligible);
    }

    #[tokio::test]
    async fn blank_messages_are_rejected() {
        let (store, user, progress_id) = seeded(4).await;
        let id = create_dialogue(&store, progress_id, user).await.unwrap().dialogue_id;
        assert!(matches!(
            send_message(&store, &ScriptedTutor, &DialogueSettings::default(), id, "   ", user).await,
            Err(AppError::Validation(_))
        ));
    }

    fn turn_request(module_id: Uuid, user_message: &str) -> SocraticTurnRequest {
        serde_json::from_value(serde_json::json!({
            "moduleId": module_id,
            "userMessage": user_message,
            "conversationHistory": [
                { "role": "assistant", "content": "질문 1" },
                { "role": "user", "content": "맥락이요" },
            ],
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn standalone_turn_follows_the_script_without_storing() {
        let (store, user, progress_id) = seeded(4).await;
        let module_id = store.progress(progress_id).await.unwrap().unwrap().module_id;
        let settings = DialogueSettings::default();

        let turn = socratic_turn(&store, &ScriptedTutor, &settings, turn_request(module_id, "예시요"), user)
            .await
            .unwrap();
        assert!(turn.message.ends_with("질문 2"));
        assert!(!turn.can_proceed);
        assert!(store.dialogue_for_progress(progress_id).await.unwrap().is_none());

        let turn = socratic_turn(&store, &EagerTutor, &settings, turn_request(module_id, "예시요"), user)
            .await
            .unwrap();
        assert!(turn.can_proceed);

        assert!(matches!(
            socratic_turn(&store, &FailingTutor, &settings, turn_request(module_id, "예시요"), user).await,
            Err(AppError::Ai(_))
        ));
        assert!(matches!(
            socratic_turn(&store, &ScriptedTutor, &settings, turn_request(module_id, "  "), user).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            socratic_turn(&store, &ScriptedTutor, &settings, turn_request(Uuid::new_v4(), "예시요"), user).await,
            Err(AppError::NotFound("module"))
        ));
    }

    #[test]
    fn next_question_indexes_by_half_the_transcript() {
        let questions: Vec<SocraticQuestion> = (0..3)
            .map(|i| SocraticQuestion {
                module_id: Uuid::nil(),
                order_index: i,
                question_type: QuestionType::Exploration,
                question_text: format!("q{i}"),
            })
            .collect();

        assert_eq!(next_question(&questions, 2).unwrap().question_text, "q1");
        assert_eq!(next_question(&questions, 4).unwrap().question_text, "q2");
        assert!(next_question(&questions, 6).is_none());
    }
}
