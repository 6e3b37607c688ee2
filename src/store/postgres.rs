use async_trait::async_trait;
use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    types::Json as SqlxJson,
};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{new_token, Store, StoreResult};
use crate::error::StoreError;
use crate::types::{
    Dialogue, Message, Module, Scenario, SocraticQuestion, StepType, Submission, TechniqueBadge,
    UserId, UserProgress,
};

const MODULE_COLUMNS: &str = "id, slug, title, title_en, description, description_en, \
     techniques, policy_context, order_index, is_active, prerequisite_module_id";

const PROGRESS_COLUMNS: &str =
    "id, user_id, module_id, current_step, status, started_at, completed_at, score";

const DIALOGUE_COLUMNS: &str = "id, progress_id, messages, is_completed, created_at, updated_at";

const SUBMISSION_COLUMNS: &str =
    "id, progress_id, user_id, module_id, step_type, content, created_at";

#[derive(sqlx::FromRow)]
struct ProgressRow {
    id: Uuid,
    user_id: Uuid,
    module_id: Uuid,
    current_step: Option<String>,
    status: String,
    started_at: Option<OffsetDateTime>,
    completed_at: Option<OffsetDateTime>,
    score: Option<i32>,
}

impl ProgressRow {
    fn into_progress(self) -> StoreResult<UserProgress> {
        Ok(UserProgress {
            id: self.id,
            user_id: self.user_id,
            module_id: self.module_id,
            current_step: self
                .current_step
                .as_deref()
                .map(str::parse::<StepType>)
                .transpose()?,
            status: self.status.parse()?,
            started_at: self.started_at,
            completed_at: self.completed_at,
            score: self.score,
        })
    }
}

#[derive(sqlx::FromRow)]
struct QuestionRow {
    module_id: Uuid,
    order_index: i32,
    question_type: String,
    question_text: String,
}

impl QuestionRow {
    fn into_question(self) -> StoreResult<SocraticQuestion> {
        Ok(SocraticQuestion {
            module_id: self.module_id,
            order_index: self.order_index,
            question_type: self.question_type.parse()?,
            question_text: self.question_text,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DialogueRow {
    id: Uuid,
    progress_id: Uuid,
    messages: SqlxJson<Vec<Message>>,
    is_completed: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<DialogueRow> for Dialogue {
    fn from(row: DialogueRow) -> Self {
        Dialogue {
            id: row.id,
            progress_id: row.progress_id,
            messages: row.messages.0,
            is_completed: row.is_completed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BadgeRow {
    user_id: Uuid,
    technique_name: String,
    module_id: Uuid,
    earned_at: OffsetDateTime,
}

#[derive(sqlx::FromRow)]
struct SubmissionRow {
    id: Uuid,
    progress_id: Uuid,
    user_id: Uuid,
    module_id: Uuid,
    step_type: String,
    content: String,
    created_at: OffsetDateTime,
}

impl SubmissionRow {
    fn into_submission(self) -> StoreResult<Submission> {
        Ok(Submission {
            id: self.id,
            progress_id: self.progress_id,
            user_id: self.user_id,
            module_id: self.module_id,
            step_type: self.step_type.parse()?,
            content: self.content,
            created_at: self.created_at,
        })
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new().connect(database_url).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn user_for_token(&self, token: &str) -> StoreResult<Option<UserId>> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id
            FROM access_tokens
            WHERE token = $1
                AND expires_at > now()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user_id)
    }

    async fn active_modules(&self) -> StoreResult<Vec<Module>> {
        let modules = sqlx::query_as::<_, Module>(&format!(
            "SELECT {MODULE_COLUMNS}
            FROM modules
            WHERE is_active
            ORDER BY order_index ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(modules)
    }

    async fn module(&self, id: Uuid) -> StoreResult<Option<Module>> {
        let module = sqlx::query_as::<_, Module>(&format!(
            "SELECT {MODULE_COLUMNS} FROM modules WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(module)
    }

    async fn module_at(&self, order_index: i32) -> StoreResult<Option<Module>> {
        let module = sqlx::query_as::<_, Module>(&format!(
            "SELECT {MODULE_COLUMNS}
            FROM modules
            WHERE is_active AND order_index = $1"
        ))
        .bind(order_index)
        .fetch_optional(&self.pool)
        .await?;
        Ok(module)
    }

    async fn scenarios(&self, module_id: Uuid) -> StoreResult<Vec<Scenario>> {
        let scenarios = sqlx::query_as::<_, Scenario>(
            "SELECT id, module_id, title, title_en, category, context, context_en, is_active
            FROM scenarios
            WHERE module_id = $1 AND is_active
            ORDER BY title ASC",
        )
        .bind(module_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(scenarios)
    }

    async fn socratic_questions(&self, module_id: Uuid) -> StoreResult<Vec<SocraticQuestion>> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            "SELECT module_id, order_index, question_type, question_text
            FROM socratic_question_templates
            WHERE module_id = $1 AND is_active
            ORDER BY order_index ASC",
        )
        .bind(module_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(QuestionRow::into_question).collect()
    }

    async fn progress_for_user(&self, user_id: UserId) -> StoreResult<Vec<UserProgress>> {
        let rows = sqlx::query_as::<_, ProgressRow>(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM user_progress WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ProgressRow::into_progress).collect()
    }

    async fn progress(&self, id: Uuid) -> StoreResult<Option<UserProgress>> {
        let row = sqlx::query_as::<_, ProgressRow>(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM user_progress WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ProgressRow::into_progress).transpose()
    }

    async fn progress_for_module(
        &self,
        user_id: UserId,
        module_id: Uuid,
    ) -> StoreResult<Option<UserProgress>> {
        let row = sqlx::query_as::<_, ProgressRow>(&format!(
            "SELECT {PROGRESS_COLUMNS}
            FROM user_progress
            WHERE user_id = $1 AND module_id = $2"
        ))
        .bind(user_id)
        .bind(module_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ProgressRow::into_progress).transpose()
    }

    async fn insert_progress(
        &self,
        user_id: UserId,
        module_id: Uuid,
        started_at: OffsetDateTime,
    ) -> StoreResult<UserProgress> {
        sqlx::query(
            "INSERT INTO user_progress
                (id, user_id, module_id, current_step, status, started_at)
            VALUES ($1, $2, $3, 'socratic_dialogue', 'in_progress', $4)
            ON CONFLICT (user_id, module_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(module_id)
        .bind(started_at)
        .execute(&self.pool)
        .await?;

        self.progress_for_module(user_id, module_id)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn advance_progress(
        &self,
        id: Uuid,
        from: StepType,
        to: Option<StepType>,
        at: OffsetDateTime,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE user_progress
            SET current_step = $3::text,
                status = CASE WHEN $3::text IS NULL THEN 'completed' ELSE 'in_progress' END,
                completed_at = CASE WHEN $3::text IS NULL THEN $4 ELSE completed_at END,
                updated_at = $4
            WHERE id = $1 AND current_step = $2",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.map(StepType::as_str))
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn award_badge(&self, badge: &TechniqueBadge) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO technique_badges (user_id, technique_name, module_id, earned_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, technique_name) DO NOTHING",
        )
        .bind(badge.user_id)
        .bind(&badge.technique)
        .bind(badge.module_id)
        .bind(badge.earned_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn badges(&self, user_id: UserId) -> StoreResult<Vec<TechniqueBadge>> {
        let rows = sqlx::query_as::<_, BadgeRow>(
            "SELECT user_id, technique_name, module_id, earned_at
            FROM technique_badges
            WHERE user_id = $1
            ORDER BY earned_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| TechniqueBadge {
                user_id: row.user_id,
                technique: row.technique_name,
                module_id: row.module_id,
                earned_at: row.earned_at,
            })
            .collect())
    }

    async fn dialogue(&self, id: Uuid) -> StoreResult<Option<Dialogue>> {
        let row = sqlx::query_as::<_, DialogueRow>(&format!(
            "SELECT {DIALOGUE_COLUMNS} FROM dialogues WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Dialogue::from))
    }

    async fn dialogue_for_progress(&self, progress_id: Uuid) -> StoreResult<Option<Dialogue>> {
        let row = sqlx::query_as::<_, DialogueRow>(&format!(
            "SELECT {DIALOGUE_COLUMNS} FROM dialogues WHERE progress_id = $1"
        ))
        .bind(progress_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Dialogue::from))
    }

    async fn insert_dialogue(&self, progress_id: Uuid, first: Message) -> StoreResult<Dialogue> {
        sqlx::query(
            "INSERT INTO dialogues (id, progress_id, messages, is_completed)
            VALUES ($1, $2, $3, FALSE)
            ON CONFLICT (progress_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(progress_id)
        .bind(SqlxJson(vec![first]))
        .execute(&self.pool)
        .await?;

        self.dialogue_for_progress(progress_id)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn save_dialogue(&self, dialogue: &Dialogue) -> StoreResult<()> {
        sqlx::query(
            "UPDATE dialogues
            SET messages = $2, is_completed = $3, updated_at = $4
            WHERE id = $1",
        )
        .bind(dialogue.id)
        .bind(SqlxJson(&dialogue.messages))
        .bind(dialogue.is_completed)
        .bind(dialogue.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_submission(&self, submission: &Submission) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO submissions
                (id, progress_id, user_id, module_id, step_type, content, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(submission.id)
        .bind(submission.progress_id)
        .bind(submission.user_id)
        .bind(submission.module_id)
        .bind(submission.step_type.as_str())
        .bind(&submission.content)
        .bind(submission.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn submissions(
        &self,
        user_id: UserId,
        step: Option<StepType>,
    ) -> StoreResult<Vec<Submission>> {
        let rows = sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {SUBMISSION_COLUMNS}
            FROM submissions
            WHERE user_id = $1
                AND ($2::text IS NULL OR step_type = $2)
            ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .bind(step.map(StepType::as_str))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(SubmissionRow::into_submission).collect()
    }

    async fn upsert_module(&self, module: &Module) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO modules
                (id, slug, title, title_en, description, description_en, techniques,
                 policy_context, order_index, is_active, prerequisite_module_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                slug = EXCLUDED.slug,
                title = EXCLUDED.title,
                title_en = EXCLUDED.title_en,
                description = EXCLUDED.description,
                description_en = EXCLUDED.description_en,
                techniques = EXCLUDED.techniques,
                policy_context = EXCLUDED.policy_context,
                order_index = EXCLUDED.order_index,
                is_active = EXCLUDED.is_active,
                prerequisite_module_id = EXCLUDED.prerequisite_module_id",
        )
        .bind(module.id)
        .bind(&module.slug)
        .bind(&module.title)
        .bind(&module.title_en)
        .bind(&module.description)
        .bind(&module.description_en)
        .bind(&module.techniques)
        .bind(&module.policy_context)
        .bind(module.order_index)
        .bind(module.is_active)
        .bind(module.prerequisite_module_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_scenario(&self, scenario: &Scenario) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO scenarios
                (id, module_id, title, title_en, category, context, context_en, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                module_id = EXCLUDED.module_id,
                title = EXCLUDED.title,
                title_en = EXCLUDED.title_en,
                category = EXCLUDED.category,
                context = EXCLUDED.context,
                context_en = EXCLUDED.context_en,
                is_active = EXCLUDED.is_active",
        )
        .bind(scenario.id)
        .bind(scenario.module_id)
        .bind(&scenario.title)
        .bind(&scenario.title_en)
        .bind(&scenario.category)
        .bind(&scenario.context)
        .bind(&scenario.context_en)
        .bind(scenario.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn replace_questions(
        &self,
        module_id: Uuid,
        questions: &[SocraticQuestion],
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM socratic_question_templates WHERE module_id = $1")
            .bind(module_id)
            .execute(&mut *tx)
            .await?;

        for question in questions {
            sqlx::query(
                "INSERT INTO socratic_question_templates
                    (module_id, order_index, question_type, question_text)
                VALUES ($1, $2, $3, $4)",
            )
            .bind(module_id)
            .bind(question.order_index)
            .bind(question.question_type.as_str())
            .bind(&question.question_text)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn issue_token(
        &self,
        user_id: UserId,
        expires_at: OffsetDateTime,
    ) -> StoreResult<String> {
        let token = new_token();
        sqlx::query("INSERT INTO access_tokens (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(token)
    }
}
