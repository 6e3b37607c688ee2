use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;
use uuid::Uuid;

use promptlab::{
    api::{api_routes, AppState},
    catalog,
    dialogue::DialogueSettings,
    store::{MemoryStore, Store},
    tutor::ScriptedTutor,
};

const FIRST_MODULE: &str = "11111111-1111-1111-1111-111111111111";
const SECOND_MODULE: &str = "22222222-2222-2222-2222-222222222222";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
}

impl TestApp {
    async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        catalog::seed(store.as_ref()).await.unwrap();

        let state = Arc::new(AppState {
            store: store.clone(),
            tutor: Arc::new(ScriptedTutor),
            coach: None,
            dialogue: DialogueSettings::default(),
        });
        Self {
            router: api_routes(state),
            store,
        }
    }

    async fn learner(&self) -> String {
        self.store
            .issue_token(Uuid::new_v4(), OffsetDateTime::now_utc() + Duration::days(1))
            .await
            .unwrap()
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn start(&self, token: &str, module: &str) -> String {
        let (status, body) = self
            .call("POST", &format!("/api/modules/{module}/start"), Some(token), None)
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["progressId"].as_str().unwrap().to_string()
    }

    async fn complete(&self, token: &str, progress_id: &str, step: &str) -> (StatusCode, Value) {
        self.call(
            "POST",
            &format!("/api/progress/{progress_id}/complete-step"),
            Some(token),
            Some(json!({ "stepType": step })),
        )
        .await
    }
}

fn error_code(body: &Value) -> &str {
    assert_eq!(body["ok"], false);
    body["error"]["code"].as_str().unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new().await;
    let (status, _) = app.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn api_requires_a_valid_token() {
    let app = TestApp::new().await;

    let (status, body) = app.call("GET", "/api/modules", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "UNAUTHORIZED");

    let (status, _) = app.call("GET", "/api/modules", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_cookie_is_accepted() {
    let app = TestApp::new().await;
    let token = app.learner().await;

    let request = Request::builder()
        .uri("/api/progress")
        .header(header::COOKIE, format!("token={token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn modules_list_shows_locks_and_overall_progress() {
    let app = TestApp::new().await;
    let token = app.learner().await;

    let (status, body) = app.call("GET", "/api/modules", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let modules = body["data"]["modules"].as_array().unwrap();
    assert_eq!(modules.len(), 5);
    assert_eq!(modules[0]["id"], FIRST_MODULE);
    assert_eq!(modules[0]["isLocked"], false);
    assert_eq!(modules[1]["isLocked"], true);
    assert_eq!(modules[0]["orderIndex"], 1);
    assert!(modules[0]["progress"].is_null());
    assert_eq!(body["data"]["overallProgress"]["total"], 5);
    assert_eq!(body["data"]["overallProgress"]["percentage"], 0);
}

#[tokio::test]
async fn module_detail_lists_steps_and_scenarios() {
    let app = TestApp::new().await;
    let token = app.learner().await;

    let (status, body) = app
        .call("GET", &format!("/api/modules/{FIRST_MODULE}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let steps = body["data"]["module"]["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[0]["type"], "socratic_dialogue");
    assert_eq!(steps[0]["title"], "소크라테스 대화");
    assert_eq!(steps[0]["isCurrent"], true);
    assert!(!body["data"]["module"]["scenarios"].as_array().unwrap().is_empty());
    assert!(body["data"]["progress"].is_null());

    let (status, body) = app
        .call("GET", &format!("/api/modules/{}", Uuid::new_v4()), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");

    let (status, body) = app.call("GET", "/api/modules/not-a-uuid", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
}

#[tokio::test]
async fn locked_module_cannot_be_started() {
    let app = TestApp::new().await;
    let token = app.learner().await;

    let (status, body) = app
        .call("POST", &format!("/api/modules/{SECOND_MODULE}/start"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "FORBIDDEN");
}

#[tokio::test]
async fn learner_completes_a_module_end_to_end() {
    let app = TestApp::new().await;
    let token = app.learner().await;

    let progress_id = app.start(&token, FIRST_MODULE).await;
    assert_eq!(app.start(&token, FIRST_MODULE).await, progress_id);

    let (status, created) = app
        .call("POST", "/api/dialogues", Some(&token), Some(json!({ "progressId": progress_id })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let dialogue_id = created["data"]["dialogueId"].as_str().unwrap().to_string();
    assert_eq!(created["data"]["initialMessage"]["role"], "tutor");

    let (_, again) = app
        .call("POST", "/api/dialogues", Some(&token), Some(json!({ "progressId": progress_id })))
        .await;
    assert_eq!(again["data"]["dialogueId"], dialogue_id.as_str());

    let messages_uri = format!("/api/dialogues/{dialogue_id}/messages");
    let mut flags = Vec::new();
    for turn in 1..=4 {
        let (status, sent) = app
            .call("POST", &messages_uri, Some(&token), Some(json!({ "content": format!("답변 {turn}") })))
            .await;
        assert_eq!(status, StatusCode::OK, "{sent}");
        assert_eq!(sent["data"]["userMessage"]["role"], "student");
        flags.push((
            sent["data"]["canProceed"].as_bool().unwrap(),
            sent["data"]["isCompleted"].as_bool().unwrap(),
        ));
    }
    assert_eq!(flags, vec![(false, false), (false, false), (true, false), (true, true)]);

    let (status, body) = app
        .call("POST", &messages_uri, Some(&token), Some(json!({ "content": "한 번 더" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_STATE");

    let (_, transcript) = app
        .call("GET", &format!("/api/dialogues/{dialogue_id}"), Some(&token), None)
        .await;
    assert_eq!(transcript["data"]["isCompleted"], true);
    assert_eq!(transcript["data"]["messages"].as_array().unwrap().len(), 9);

    let (status, body) = app.complete(&token, &progress_id, "comparison_lab").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_STATE");

    let steps = ["socratic_dialogue", "prompt_writing", "comparison_lab", "reflection_journal"];
    let mut last = Value::Null;
    for (i, step) in steps.iter().enumerate() {
        let (status, body) = app.complete(&token, &progress_id, step).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        if i + 1 < steps.len() {
            assert_eq!(body["data"]["nextStep"], steps[i + 1]);
            assert_eq!(body["data"]["moduleCompleted"], false);
        }
        last = body;
    }
    assert!(last["data"]["nextStep"].is_null());
    assert_eq!(last["data"]["moduleCompleted"], true);
    assert_eq!(last["data"]["unlockedModule"], "문헌 리뷰 효과적으로 하기");

    let (status, _) = app.complete(&token, &progress_id, "reflection_journal").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, overview) = app.call("GET", "/api/progress", Some(&token), None).await;
    assert_eq!(overview["data"]["overall"]["completedModules"], 1);
    assert_eq!(overview["data"]["overall"]["percentage"], 20);
    assert_eq!(overview["data"]["badges"].as_array().unwrap().len(), 3);
    assert_eq!(overview["data"]["modules"][0]["stepsCompleted"], 4);

    let (status, _) = app
        .call("POST", &format!("/api/modules/{SECOND_MODULE}/start"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn dialogues_are_private() {
    let app = TestApp::new().await;
    let owner = app.learner().await;
    let stranger = app.learner().await;

    let progress_id = app.start(&owner, FIRST_MODULE).await;
    let (_, created) = app
        .call("POST", "/api/dialogues", Some(&owner), Some(json!({ "progressId": progress_id })))
        .await;
    let dialogue_id = created["data"]["dialogueId"].as_str().unwrap().to_string();

    let (status, body) = app
        .call("GET", &format!("/api/dialogues/{dialogue_id}"), Some(&stranger), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "FORBIDDEN");

    let (status, _) = app.complete(&stranger, &progress_id, "socratic_dialogue").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_bodies_are_validation_errors() {
    let app = TestApp::new().await;
    let token = app.learner().await;
    let progress_id = app.start(&token, FIRST_MODULE).await;

    let (status, body) = app.complete(&token, &progress_id, "skipping_ahead").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let (status, body) = app
        .call("POST", "/api/dialogues", Some(&token), Some(json!({ "progress": 1 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
}

#[tokio::test]
async fn submissions_are_recorded_and_filtered() {
    let app = TestApp::new().await;
    let token = app.learner().await;
    let progress_id = app.start(&token, FIRST_MODULE).await;
    let uri = format!("/api/progress/{progress_id}/submissions");

    let (status, body) = app
        .call("POST", &uri, Some(&token), Some(json!({ "stepType": "prompt_writing", "content": "역할을 정해주세요" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["stepType"], "prompt_writing");

    let (status, _) = app
        .call("POST", &uri, Some(&token), Some(json!({ "stepType": "reflection_journal", "content": "배운 점" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .call("POST", &uri, Some(&token), Some(json!({ "stepType": "socratic_dialogue", "content": "x" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let (_, all) = app.call("GET", "/api/submissions", Some(&token), None).await;
    assert_eq!(all["data"].as_array().unwrap().len(), 2);

    let (_, journals) = app
        .call("GET", "/api/submissions?stepType=reflection_journal", Some(&token), None)
        .await;
    let journals = journals["data"].as_array().unwrap();
    assert_eq!(journals.len(), 1);
    assert_eq!(journals[0]["moduleTitle"], "좋은 질문이 좋은 답을 만든다");
}

#[tokio::test]
async fn prompt_coaching_needs_a_model() {
    let app = TestApp::new().await;
    let token = app.learner().await;

    let (status, body) = app
        .call(
            "POST",
            "/api/ai/analyze-prompt",
            Some(&token),
            Some(json!({ "moduleId": FIRST_MODULE, "prompt": "정책 보고서를 요약해줘" })),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error_code(&body), "SERVICE_UNAVAILABLE");

    let (status, body) = app
        .call(
            "POST",
            "/api/ai/compare",
            Some(&token),
            Some(json!({ "moduleId": FIRST_MODULE, "promptA": "", "promptB": "b" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
}

#[tokio::test]
async fn standalone_socratic_turn_answers_from_the_script() {
    let app = TestApp::new().await;
    let token = app.learner().await;
    let module_id: Uuid = FIRST_MODULE.parse().unwrap();
    let questions = app.store.socratic_questions(module_id).await.unwrap();

    let request = json!({
        "moduleId": FIRST_MODULE,
        "userMessage": "구체적인 맥락이 필요해요",
        "conversationHistory": [
            { "role": "assistant", "content": questions[0].question_text },
            { "role": "user", "content": "질문이 모호했어요" },
        ],
    });

    let (status, body) = app
        .call("POST", "/api/ai/socratic", Some(&token), Some(request.clone()))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let message = body["data"]["message"].as_str().unwrap();
    assert!(message.ends_with(&questions[1].question_text));
    assert_eq!(body["data"]["canProceed"], false);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/ai/socratic/stream")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(request.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let streamed = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(streamed.trim_end().ends_with(&questions[1].question_text));

    let (status, body) = app
        .call(
            "POST",
            "/api/ai/socratic",
            Some(&token),
            Some(json!({ "moduleId": FIRST_MODULE, "userMessage": " " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let (status, body) = app
        .call(
            "POST",
            "/api/ai/socratic",
            Some(&token),
            Some(json!({ "moduleId": Uuid::new_v4(), "userMessage": "안녕하세요" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");
}

#[tokio::test]
async fn restarting_a_completed_module_has_no_current_step() {
    let app = TestApp::new().await;
    let token = app.learner().await;
    let progress_id = app.start(&token, FIRST_MODULE).await;

    for step in ["socratic_dialogue", "prompt_writing", "comparison_lab", "reflection_journal"] {
        let (status, body) = app.complete(&token, &progress_id, step).await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let (status, body) = app
        .call("POST", &format!("/api/modules/{FIRST_MODULE}/start"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["progressId"], progress_id.as_str());
    assert_eq!(body["data"]["status"], "completed");
    assert!(body["data"]["firstStep"]["type"].is_null());
}
