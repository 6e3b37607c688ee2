//! Persistence seam for modules, progress, dialogues and badges.
//!
//! Handlers and services only ever see `dyn Store`; `PgStore` backs the
//! deployed service and `MemoryStore` backs tests and `--memory` runs.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreError;
use crate::types::{
    Dialogue, Message, Module, Scenario, SocraticQuestion, StepType, Submission, TechniqueBadge,
    UserId, UserProgress,
};

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Resolve an unexpired access token to its user.
    async fn user_for_token(&self, token: &str) -> StoreResult<Option<UserId>>;

    /// Active modules ordered by `order_index`.
    async fn active_modules(&self) -> StoreResult<Vec<Module>>;

    /// A module by id, active or not.
    async fn module(&self, id: Uuid) -> StoreResult<Option<Module>>;

    /// The active module sitting at `order_index`.
    async fn module_at(&self, order_index: i32) -> StoreResult<Option<Module>>;

    async fn scenarios(&self, module_id: Uuid) -> StoreResult<Vec<Scenario>>;

    /// Active scripted questions of a module, in order.
    async fn socratic_questions(&self, module_id: Uuid) -> StoreResult<Vec<SocraticQuestion>>;

    async fn progress_for_user(&self, user_id: UserId) -> StoreResult<Vec<UserProgress>>;

    async fn progress(&self, id: Uuid) -> StoreResult<Option<UserProgress>>;

    async fn progress_for_module(
        &self,
        user_id: UserId,
        module_id: Uuid,
    ) -> StoreResult<Option<UserProgress>>;

    /// Create an in-progress row at the first step. If the (user, module)
    /// row already exists it is returned untouched.
    async fn insert_progress(
        &self,
        user_id: UserId,
        module_id: Uuid,
        started_at: OffsetDateTime,
    ) -> StoreResult<UserProgress>;

    /// Move `current_step` from `from` to `to` only if the row still sits at
    /// `from`. `to == None` completes the module. Returns whether the row
    /// was updated.
    async fn advance_progress(
        &self,
        id: Uuid,
        from: StepType,
        to: Option<StepType>,
        at: OffsetDateTime,
    ) -> StoreResult<bool>;

    /// Insert a badge unless the (user, technique) pair already has one.
    /// Returns whether a new badge was written.
    async fn award_badge(&self, badge: &TechniqueBadge) -> StoreResult<bool>;

    /// Badges of a user, newest first.
    async fn badges(&self, user_id: UserId) -> StoreResult<Vec<TechniqueBadge>>;

    async fn dialogue(&self, id: Uuid) -> StoreResult<Option<Dialogue>>;

    async fn dialogue_for_progress(&self, progress_id: Uuid) -> StoreResult<Option<Dialogue>>;

    /// Create the dialogue of a progress row seeded with `first`. If one
    /// already exists it is returned instead.
    async fn insert_dialogue(&self, progress_id: Uuid, first: Message) -> StoreResult<Dialogue>;

    async fn save_dialogue(&self, dialogue: &Dialogue) -> StoreResult<()>;

    async fn insert_submission(&self, submission: &Submission) -> StoreResult<()>;

    /// Submissions of a user, newest first, optionally limited to one step.
    async fn submissions(
        &self,
        user_id: UserId,
        step: Option<StepType>,
    ) -> StoreResult<Vec<Submission>>;

    async fn upsert_module(&self, module: &Module) -> StoreResult<()>;

    async fn upsert_scenario(&self, scenario: &Scenario) -> StoreResult<()>;

    async fn replace_questions(
        &self,
        module_id: Uuid,
        questions: &[SocraticQuestion],
    ) -> StoreResult<()>;

    async fn issue_token(&self, user_id: UserId, expires_at: OffsetDateTime)
        -> StoreResult<String>;
}

pub(crate) fn new_token() -> String {
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}
