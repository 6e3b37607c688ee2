use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{new_token, Store, StoreResult};
use crate::types::{
    Dialogue, Message, Module, ProgressStatus, Scenario, SocraticQuestion, StepType, Submission,
    TechniqueBadge, UserId, UserProgress,
};

#[derive(Default)]
struct Tables {
    tokens: HashMap<String, (UserId, OffsetDateTime)>,
    modules: HashMap<Uuid, Module>,
    scenarios: HashMap<Uuid, Scenario>,
    questions: HashMap<Uuid, Vec<SocraticQuestion>>,
    progress: HashMap<Uuid, UserProgress>,
    dialogues: HashMap<Uuid, Dialogue>,
    badges: Vec<TechniqueBadge>,
    submissions: Vec<Submission>,
}

/// Process-local store with the same semantics as the Postgres schema.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn user_for_token(&self, token: &str) -> StoreResult<Option<UserId>> {
        let tables = self.tables.read().await;
        let now = OffsetDateTime::now_utc();
        Ok(tables
            .tokens
            .get(token)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(user_id, _)| *user_id))
    }

    async fn active_modules(&self) -> StoreResult<Vec<Module>> {
        let tables = self.tables.read().await;
        let mut modules: Vec<Module> = tables
            .modules
            .values()
            .filter(|m| m.is_active)
            .cloned()
            .collect();
        modules.sort_by_key(|m| m.order_index);
        Ok(modules)
    }

    async fn module(&self, id: Uuid) -> StoreResult<Option<Module>> {
        Ok(self.tables.read().await.modules.get(&id).cloned())
    }

    async fn module_at(&self, order_index: i32) -> StoreResult<Option<Module>> {
        let tables = self.tables.read().await;
        Ok(tables
            .modules
            .values()
            .find(|m| m.is_active && m.order_index == order_index)
            .cloned())
    }

    async fn scenarios(&self, module_id: Uuid) -> StoreResult<Vec<Scenario>> {
        let tables = self.tables.read().await;
        let mut scenarios: Vec<Scenario> = tables
            .scenarios
            .values()
            .filter(|s| s.module_id == module_id && s.is_active)
            .cloned()
            .collect();
        scenarios.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(scenarios)
    }

    async fn socratic_questions(&self, module_id: Uuid) -> StoreResult<Vec<SocraticQuestion>> {
        let tables = self.tables.read().await;
        Ok(tables.questions.get(&module_id).cloned().unwrap_or_default())
    }

    async fn progress_for_user(&self, user_id: UserId) -> StoreResult<Vec<UserProgress>> {
        let tables = self.tables.read().await;
        Ok(tables
            .progress
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn progress(&self, id: Uuid) -> StoreResult<Option<UserProgress>> {
        Ok(self.tables.read().await.progress.get(&id).cloned())
    }

    async fn progress_for_module(
        &self,
        user_id: UserId,
        module_id: Uuid,
    ) -> StoreResult<Option<UserProgress>> {
        let tables = self.tables.read().await;
        Ok(tables
            .progress
            .values()
            .find(|p| p.user_id == user_id && p.module_id == module_id)
            .cloned())
    }

    async fn insert_progress(
        &self,
        user_id: UserId,
        module_id: Uuid,
        started_at: OffsetDateTime,
    ) -> StoreResult<UserProgress> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .progress
            .values()
            .find(|p| p.user_id == user_id && p.module_id == module_id)
        {
            return Ok(existing.clone());
        }

        let progress = UserProgress {
            id: Uuid::new_v4(),
            user_id,
            module_id,
            current_step: Some(StepType::SocraticDialogue),
            status: ProgressStatus::InProgress,
            started_at: Some(started_at),
            completed_at: None,
            score: None,
        };
        tables.progress.insert(progress.id, progress.clone());
        Ok(progress)
    }

    async fn advance_progress(
        &self,
        id: Uuid,
        from: StepType,
        to: Option<StepType>,
        at: OffsetDateTime,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let Some(progress) = tables.progress.get_mut(&id) else {
            return Ok(false);
        };
        if progress.current_step != Some(from) {
            return Ok(false);
        }

        progress.current_step = to;
        if to.is_none() {
            progress.status = ProgressStatus::Completed;
            progress.completed_at = Some(at);
        } else {
            progress.status = ProgressStatus::InProgress;
        }
        Ok(true)
    }

    async fn award_badge(&self, badge: &TechniqueBadge) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let exists = tables
            .badges
            .iter()
            .any(|b| b.user_id == badge.user_id && b.technique == badge.technique);
        if exists {
            return Ok(false);
        }
        tables.badges.push(badge.clone());
        Ok(true)
    }

    async fn badges(&self, user_id: UserId) -> StoreResult<Vec<TechniqueBadge>> {
        let tables = self.tables.read().await;
        let mut badges: Vec<TechniqueBadge> = tables
            .badges
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        badges.sort_by(|a, b| b.earned_at.cmp(&a.earned_at));
        Ok(badges)
    }

    async fn dialogue(&self, id: Uuid) -> StoreResult<Option<Dialogue>> {
        Ok(self.tables.read().await.dialogues.get(&id).cloned())
    }

    async fn dialogue_for_progress(&self, progress_id: Uuid) -> StoreResult<Option<Dialogue>> {
        let tables = self.tables.read().await;
        Ok(tables
            .dialogues
            .values()
            .find(|d| d.progress_id == progress_id)
            .cloned())
    }

    async fn insert_dialogue(&self, progress_id: Uuid, first: Message) -> StoreResult<Dialogue> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.dialogues.values().find(|d| d.progress_id == progress_id) {
            return Ok(existing.clone());
        }

        let now = OffsetDateTime::now_utc();
        let dialogue = Dialogue {
            id: Uuid::new_v4(),
            progress_id,
            messages: vec![first],
            is_completed: false,
            created_at: now,
            updated_at: now,
        };
        tables.dialogues.insert(dialogue.id, dialogue.clone());
        Ok(dialogue)
    }

    async fn save_dialogue(&self, dialogue: &Dialogue) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(stored) = tables.dialogues.get_mut(&dialogue.id) {
            stored.messages = dialogue.messages.clone();
            stored.is_completed = dialogue.is_completed;
            stored.updated_at = dialogue.updated_at;
        }
        Ok(())
    }

    async fn insert_submission(&self, submission: &Submission) -> StoreResult<()> {
        self.tables.write().await.submissions.push(submission.clone());
        Ok(())
    }

    async fn submissions(
        &self,
        user_id: UserId,
        step: Option<StepType>,
    ) -> StoreResult<Vec<Submission>> {
        let tables = self.tables.read().await;
        let mut submissions: Vec<Submission> = tables
            .submissions
            .iter()
            .filter(|s| s.user_id == user_id && step.map_or(true, |step| s.step_type == step))
            .cloned()
            .collect();
        submissions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(submissions)
    }

    async fn upsert_module(&self, module: &Module) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .modules
            .insert(module.id, module.clone());
        Ok(())
    }

    async fn upsert_scenario(&self, scenario: &Scenario) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .scenarios
            .insert(scenario.id, scenario.clone());
        Ok(())
    }

    async fn replace_questions(
        &self,
        module_id: Uuid,
        questions: &[SocraticQuestion],
    ) -> StoreResult<()> {
        let mut ordered = questions.to_vec();
        ordered.sort_by_key(|q| q.order_index);
        self.tables.write().await.questions.insert(module_id, ordered);
        Ok(())
    }

    async fn issue_token(
        &self,
        user_id: UserId,
        expires_at: OffsetDateTime,
    ) -> StoreResult<String> {
        let token = new_token();
        self.tables
            .write()
            .await
            .tokens
            .insert(token.clone(), (user_id, expires_at));
        Ok(token)
    }
}
