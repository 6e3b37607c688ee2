//! Tutor reply generation.
//!
//! Two strategies sit behind the [`Tutor`] trait: [`ScriptedTutor`] walks the
//! module's question script with a randomized acknowledgment, and
//! [`ClaudeTutor`] asks a hosted model for a reply, using the script as
//! guidance. `ClaudeTutor` also implements [`PromptCoach`] for the
//! prompt-writing and comparison-lab steps.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::config::AnthropicConfig;
use crate::prompts::{
    guide_hint, socratic_system_prompt, wrap_up_hint, PROMPT_ANALYSIS_PROMPT,
    PROMPT_COMPARISON_PROMPT, READY_SENTINEL,
};
use crate::types::{Message, MessageRole, SocraticQuestion};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const SESSION_OPENER: &str = "안녕하세요, 시작할게요.";

pub const ACKNOWLEDGMENTS: &[&str] = &[
    "좋은 생각이네요.",
    "흥미로운 관점입니다.",
    "그렇게 생각하시는군요.",
    "네, 이해했습니다.",
    "좋은 포인트입니다.",
];

pub const CLOSING_REMARK: &str = "지금까지의 대화를 통해 프롬프트 작성에 대한 좋은 인사이트를 \
     얻으셨을 것 같습니다. 이제 다음 단계인 프롬프트 작성으로 넘어가볼까요?";

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("ANTHROPIC_API_KEY is not set")]
    MissingKey,

    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model returned no text")]
    EmptyReply,
}

/// Everything a tutor needs to produce the reply to one student turn.
pub struct TutorTurn<'a> {
    pub module_slug: &'a str,
    /// Transcript before the student's new message.
    pub history: &'a [Message],
    pub student_message: &'a str,
    pub next_question: Option<&'a SocraticQuestion>,
    /// The student has taken enough turns for the dialogue to end.
    pub wrap_up: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TutorReply {
    pub content: String,
    /// The tutor judged the learner ready for the next step.
    pub ready: bool,
}

#[async_trait]
pub trait Tutor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn reply(&self, turn: TutorTurn<'_>) -> Result<TutorReply, AiError>;
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedTutor;

impl ScriptedTutor {
    pub fn compose(next_question: Option<&SocraticQuestion>) -> String {
        let ack = ACKNOWLEDGMENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(ACKNOWLEDGMENTS[0]);

        match next_question {
            Some(question) => format!("{ack} {}", question.question_text),
            None => format!("{ack} {CLOSING_REMARK}"),
        }
    }
}

#[async_trait]
impl Tutor for ScriptedTutor {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn reply(&self, turn: TutorTurn<'_>) -> Result<TutorReply, AiError> {
        Ok(TutorReply {
            content: Self::compose(turn.next_question),
            ready: false,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptAnalysis {
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub score: u32,
    pub feedback: String,
}

impl PromptAnalysis {
    fn unavailable() -> Self {
        Self {
            strengths: vec!["프롬프트 분석 중 오류 발생".into()],
            improvements: vec!["다시 시도해주세요".into()],
            score: 50,
            feedback: "프롬프트 분석에 실패했습니다.".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetterPrompt {
    A,
    B,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptComparison {
    pub response_a: String,
    pub response_b: String,
    pub analysis: String,
    pub better_prompt: BetterPrompt,
}

impl PromptComparison {
    fn unavailable() -> Self {
        Self {
            response_a: "응답 생성 실패".into(),
            response_b: "응답 생성 실패".into(),
            analysis: "비교 분석에 실패했습니다.".into(),
            better_prompt: BetterPrompt::A,
        }
    }
}

#[async_trait]
pub trait PromptCoach: Send + Sync {
    async fn analyze_prompt(
        &self,
        prompt: &str,
        scenario_context: Option<&str>,
    ) -> Result<PromptAnalysis, AiError>;

    async fn compare_prompts(
        &self,
        prompt_a: &str,
        prompt_b: &str,
    ) -> Result<PromptComparison, AiError>;
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatMessage {
    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct StructuredReply {
    reply: String,
    #[serde(default)]
    ready_for_next_step: bool,
}

/// Tutor and prompt coach backed by the Anthropic Messages API.
pub struct ClaudeTutor {
    client: reqwest::Client,
    api_key: String,
    model: String,
    messages_url: String,
}

impl ClaudeTutor {
    pub fn new(config: &AnthropicConfig) -> Result<Self, AiError> {
        let api_key = config.api_key.clone().ok_or(AiError::MissingKey)?;
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            messages_url: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
        })
    }

    async fn complete(
        &self,
        system: &str,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
    ) -> Result<String, AiError> {
        let response = self
            .client
            .post(&self.messages_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&MessagesRequest {
                model: &self.model,
                max_tokens,
                system,
                messages,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: MessagesResponse = response.json().await?;
        body.content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or(AiError::EmptyReply)
    }
}

fn conversation(turn: &TutorTurn<'_>) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(turn.history.len() + 2);

    // The API expects the learner to speak first.
    if turn
        .history
        .first()
        .is_some_and(|m| m.role == MessageRole::Tutor)
    {
        messages.push(ChatMessage::user(SESSION_OPENER));
    }

    for message in turn.history {
        messages.push(ChatMessage {
            role: match message.role {
                MessageRole::Tutor => "assistant",
                MessageRole::Student => "user",
            },
            content: message.content.clone(),
        });
    }

    let next_text = turn.next_question.map(|q| q.question_text.as_str());
    let hint = if turn.wrap_up {
        wrap_up_hint(next_text)
    } else {
        next_text.map(guide_hint).unwrap_or_default()
    };
    messages.push(ChatMessage::user(format!("{}{hint}", turn.student_message)));
    messages
}

#[async_trait]
impl Tutor for ClaudeTutor {
    fn name(&self) -> &'static str {
        "claude"
    }

    async fn reply(&self, turn: TutorTurn<'_>) -> Result<TutorReply, AiError> {
        let system = socratic_system_prompt(turn.module_slug);
        let raw = self.complete(&system, conversation(&turn), 1024).await?;
        parse_tutor_reply(&raw)
    }
}

#[async_trait]
impl PromptCoach for ClaudeTutor {
    async fn analyze_prompt(
        &self,
        prompt: &str,
        scenario_context: Option<&str>,
    ) -> Result<PromptAnalysis, AiError> {
        let mut request = format!("다음 프롬프트를 분석해주세요:\n\n{prompt}");
        if let Some(context) = scenario_context {
            request.push_str(&format!("\n\n시나리오 맥락: {context}"));
        }

        let raw = self
            .complete(PROMPT_ANALYSIS_PROMPT, vec![ChatMessage::user(request)], 1024)
            .await?;
        Ok(parse_analysis(&raw))
    }

    async fn compare_prompts(
        &self,
        prompt_a: &str,
        prompt_b: &str,
    ) -> Result<PromptComparison, AiError> {
        let request = format!(
            "다음 두 프롬프트를 비교 분석해주세요:\n\n**프롬프트 A:**\n{prompt_a}\n\n**프롬프트 B:**\n{prompt_b}"
        );

        let raw = self
            .complete(PROMPT_COMPARISON_PROMPT, vec![ChatMessage::user(request)], 2048)
            .await?;
        Ok(parse_comparison(&raw))
    }
}

/// The outermost `{...}` span of a model reply.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Read a tutor reply, preferring the structured JSON form and falling back
/// to plain text carrying the ready sentinel.
pub fn parse_tutor_reply(raw: &str) -> Result<TutorReply, AiError> {
    if let Some(reply) = extract_json(raw)
        .and_then(|json| serde_json::from_str::<StructuredReply>(json).ok())
    {
        let ready = reply.ready_for_next_step || reply.reply.contains(READY_SENTINEL);
        let content = reply.reply.replace(READY_SENTINEL, "").trim().to_string();
        return match (content.is_empty(), ready) {
            (false, _) => Ok(TutorReply { content, ready }),
            (true, true) => Ok(TutorReply {
                content: CLOSING_REMARK.to_string(),
                ready,
            }),
            (true, false) => Err(AiError::EmptyReply),
        };
    }

    let content = raw.replace(READY_SENTINEL, "").trim().to_string();
    if content.is_empty() {
        return Err(AiError::EmptyReply);
    }
    Ok(TutorReply {
        ready: raw.contains(READY_SENTINEL),
        content,
    })
}

fn parse_analysis(raw: &str) -> PromptAnalysis {
    extract_json(raw)
        .and_then(|json| serde_json::from_str::<PromptAnalysis>(json).ok())
        .map(|mut analysis| {
            analysis.score = analysis.score.min(100);
            analysis
        })
        .unwrap_or_else(PromptAnalysis::unavailable)
}

fn parse_comparison(raw: &str) -> PromptComparison {
    extract_json(raw)
        .and_then(|json| serde_json::from_str(json).ok())
        .unwrap_or_else(PromptComparison::unavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QuestionType;
    use std::time::Duration;
    use uuid::Uuid;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn question(text: &str) -> SocraticQuestion {
        SocraticQuestion {
            module_id: Uuid::nil(),
            order_index: 1,
            question_type: QuestionType::Clarification,
            question_text: text.into(),
        }
    }

    fn config(base_url: String) -> AnthropicConfig {
        AnthropicConfig {
            api_key: Some("test-key".into()),
            model: "test-model".into(),
            base_url,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn scripted_reply_acknowledges_then_asks() {
        let reply = ScriptedTutor::compose(Some(&question("무엇이 빠졌나요?")));
        assert!(ACKNOWLEDGMENTS.iter().any(|ack| reply.starts_with(ack)));
        assert!(reply.ends_with("무엇이 빠졌나요?"));

        let closing = ScriptedTutor::compose(None);
        assert!(closing.ends_with(CLOSING_REMARK));
    }

    #[test]
    fn structured_reply_is_preferred() {
        let raw = r#"Sure: {"reply": "잘 이해하셨어요.", "ready_for_next_step": true}"#;
        let reply = parse_tutor_reply(raw).unwrap();
        assert_eq!(reply.content, "잘 이해하셨어요.");
        assert!(reply.ready);
    }

    #[test]
    fn sentinel_is_stripped_and_detected() {
        let reply = parse_tutor_reply("훌륭합니다! [READY_FOR_NEXT_STEP]").unwrap();
        assert_eq!(reply.content, "훌륭합니다!");
        assert!(reply.ready);

        let reply = parse_tutor_reply("왜 그렇게 생각하나요?").unwrap();
        assert!(!reply.ready);
    }

    #[test]
    fn sentinel_only_reply_is_empty() {
        assert!(matches!(
            parse_tutor_reply("  [READY_FOR_NEXT_STEP] "),
            Err(AiError::EmptyReply)
        ));
    }

    #[test]
    fn structured_reply_without_text_keeps_ready_signal() {
        let reply = parse_tutor_reply(r#"{"reply": "", "ready_for_next_step": true}"#).unwrap();
        assert_eq!(reply.content, CLOSING_REMARK);
        assert!(reply.ready);

        assert!(matches!(
            parse_tutor_reply(r#"{"reply": "  ", "ready_for_next_step": false}"#),
            Err(AiError::EmptyReply)
        ));
    }

    #[test]
    fn analysis_falls_back_when_unparseable() {
        assert_eq!(parse_analysis("no json here"), PromptAnalysis::unavailable());

        let parsed = parse_analysis(
            r#"{"strengths":["역할"],"improvements":["형식"],"score":140,"feedback":"좋아요"}"#,
        );
        assert_eq!(parsed.score, 100);
        assert_eq!(parsed.strengths, vec!["역할".to_string()]);
    }

    #[test]
    fn conversation_opens_with_user_and_hints_last_turn() {
        let history = vec![Message::tutor("무엇을 배우고 싶나요?", QuestionType::Exploration)];
        let next = question("다음 질문");
        let turn = TutorTurn {
            module_slug: "good-questions",
            history: &history,
            student_message: "명확하게 묻는 법",
            next_question: Some(&next),
            wrap_up: false,
        };

        let messages = conversation(&turn);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].role, "assistant");
        assert!(messages[2].content.starts_with("명확하게 묻는 법"));
        assert!(messages[2].content.contains("다음 질문"));
    }

    #[tokio::test]
    async fn claude_tutor_posts_to_messages_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{
                    "type": "text",
                    "text": "{\"reply\": \"맥락이 왜 중요할까요?\", \"ready_for_next_step\": false}"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tutor = ClaudeTutor::new(&config(server.uri())).unwrap();
        let history = vec![Message::tutor("시작 질문", QuestionType::Exploration)];
        let reply = tutor
            .reply(TutorTurn {
                module_slug: "good-questions",
                history: &history,
                student_message: "답변",
                next_question: None,
                wrap_up: false,
            })
            .await
            .unwrap();

        assert_eq!(reply.content, "맥락이 왜 중요할까요?");
        assert!(!reply.ready);
    }

    #[tokio::test]
    async fn claude_tutor_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let tutor = ClaudeTutor::new(&config(server.uri())).unwrap();
        let err = tutor.compare_prompts("a", "b").await.unwrap_err();
        assert!(matches!(err, AiError::Status { status: 529, .. }));
    }

    #[test]
    fn claude_tutor_requires_a_key() {
        let mut config = config("http://localhost".into());
        config.api_key = None;
        assert!(matches!(ClaudeTutor::new(&config), Err(AiError::MissingKey)));
    }
}
