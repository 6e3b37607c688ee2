//! Module and step progression.
//!
//! Every module walks the fixed [`StepType::ORDER`]. A learner advances one
//! step at a time, and finishing the last step completes the module, awards
//! its technique badges and unlocks the module that names it as
//! prerequisite.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use time::{serde::rfc3339, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use crate::dialogue::opening_question;
use crate::error::AppError;
use crate::store::Store;
use crate::types::{
    Module, ProgressStatus, Scenario, StepType, TechniqueBadge, UserId, UserProgress,
};

pub const TOTAL_STEPS: u8 = StepType::ORDER.len() as u8;
const RECENT_ACTIVITY_LIMIT: usize = 10;

pub fn steps_completed(current_step: Option<StepType>, module_completed: bool) -> u8 {
    if module_completed {
        return TOTAL_STEPS;
    }
    current_step.map_or(0, |step| step.index() as u8)
}

pub fn next_step(step: StepType) -> Option<StepType> {
    StepType::ORDER.get(step.index() + 1).copied()
}

pub fn is_locked(module: &Module, completed_module_ids: &HashSet<Uuid>) -> bool {
    module
        .prerequisite_module_id
        .is_some_and(|prerequisite| !completed_module_ids.contains(&prerequisite))
}

pub fn step_percentage(current_step: Option<StepType>, module_completed: bool) -> u8 {
    if module_completed {
        return 100;
    }
    match current_step {
        Some(step) => percent(step.index(), StepType::ORDER.len()),
        None => 0,
    }
}

fn percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round() as u8
}

fn completed_ids(progress: &[UserProgress]) -> HashSet<Uuid> {
    progress
        .iter()
        .filter(|p| p.is_completed())
        .map(|p| p.module_id)
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteStepRequest {
    pub step_type: StepType,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompleteStepOutcome {
    pub next_step: Option<StepType>,
    pub module_completed: bool,
    /// Title of the module that follows in order, once this one is done.
    pub unlocked_module: Option<String>,
}

pub async fn complete_step(
    store: &dyn Store,
    progress_id: Uuid,
    step: StepType,
    actor: UserId,
) -> Result<CompleteStepOutcome, AppError> {
    let progress = store
        .progress(progress_id)
        .await?
        .filter(|p| p.user_id == actor)
        .ok_or(AppError::NotFound("progress"))?;

    if progress.current_step != Some(step) {
        return Err(AppError::InvalidStep {
            current: progress.current_step,
            submitted: step,
        });
    }

    let next = next_step(step);
    let now = OffsetDateTime::now_utc();
    if !store.advance_progress(progress.id, step, next, now).await? {
        // Someone else moved the row since we read it.
        let current = store
            .progress(progress.id)
            .await?
            .and_then(|p| p.current_step);
        return Err(AppError::InvalidStep {
            current,
            submitted: step,
        });
    }

    info!(user_id = %actor, progress_id = %progress.id, step = %step, "step completed");

    if next.is_some() {
        return Ok(CompleteStepOutcome {
            next_step: next,
            module_completed: false,
            unlocked_module: None,
        });
    }

    let module = store
        .module(progress.module_id)
        .await?
        .ok_or(AppError::NotFound("module"))?;

    for technique in &module.techniques {
        let badge = TechniqueBadge {
            user_id: actor,
            technique: technique.clone(),
            module_id: module.id,
            earned_at: now,
        };
        if store.award_badge(&badge).await? {
            info!(user_id = %actor, technique = %technique, "badge awarded");
        }
    }

    let unlocked_module = store
        .module_at(module.order_index + 1)
        .await?
        .map(|next_module| next_module.title);

    info!(user_id = %actor, module_id = %module.id, "module completed");

    Ok(CompleteStepOutcome {
        next_step: None,
        module_completed: true,
        unlocked_module,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FirstStep {
    /// The step to resume at; null once the module is completed.
    #[serde(rename = "type")]
    pub step_type: Option<StepType>,
    pub initial_message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedModule {
    pub progress_id: Uuid,
    pub status: ProgressStatus,
    pub first_step: FirstStep,
}

pub async fn start_module(
    store: &dyn Store,
    module_id: Uuid,
    actor: UserId,
) -> Result<StartedModule, AppError> {
    let module = store
        .module(module_id)
        .await?
        .filter(|m| m.is_active)
        .ok_or(AppError::NotFound("module"))?;

    let progress = match store.progress_for_module(actor, module.id).await? {
        Some(existing) => existing,
        None => {
            let completed = completed_ids(&store.progress_for_user(actor).await?);
            if is_locked(&module, &completed) {
                return Err(AppError::Forbidden("complete the prerequisite module first"));
            }
            let progress = store
                .insert_progress(actor, module.id, OffsetDateTime::now_utc())
                .await?;
            info!(user_id = %actor, module_id = %module.id, progress_id = %progress.id, "module started");
            progress
        }
    };

    let questions = store.socratic_questions(module.id).await?;
    Ok(StartedModule {
        progress_id: progress.id,
        status: progress.status,
        first_step: FirstStep {
            step_type: progress.current_step,
            initial_message: opening_question(&questions).content,
        },
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallProgress {
    pub completed: usize,
    pub total: usize,
    pub percentage: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleProgressSummary {
    pub progress_id: Uuid,
    pub status: ProgressStatus,
    pub current_step: Option<StepType>,
    pub percentage: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSummary {
    #[serde(flatten)]
    pub module: Module,
    pub is_locked: bool,
    pub progress: Option<ModuleProgressSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModulesOverview {
    pub modules: Vec<ModuleSummary>,
    pub overall_progress: OverallProgress,
}

pub async fn modules_overview(store: &dyn Store, actor: UserId) -> Result<ModulesOverview, AppError> {
    let modules = store.active_modules().await?;
    let progress = store.progress_for_user(actor).await?;
    let completed = completed_ids(&progress);
    let by_module: HashMap<Uuid, &UserProgress> =
        progress.iter().map(|p| (p.module_id, p)).collect();

    let summaries: Vec<ModuleSummary> = modules
        .into_iter()
        .map(|module| {
            let progress = by_module.get(&module.id).map(|p| ModuleProgressSummary {
                progress_id: p.id,
                status: p.status,
                current_step: p.current_step,
                percentage: step_percentage(p.current_step, p.is_completed()),
            });
            ModuleSummary {
                is_locked: is_locked(&module, &completed),
                module,
                progress,
            }
        })
        .collect();

    let done = summaries
        .iter()
        .filter(|s| s.progress.as_ref().is_some_and(|p| p.status == ProgressStatus::Completed))
        .count();

    Ok(ModulesOverview {
        overall_progress: OverallProgress {
            completed: done,
            total: summaries.len(),
            percentage: percent(done, summaries.len()),
        },
        modules: summaries,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepState {
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub title: &'static str,
    pub is_completed: bool,
    pub is_current: bool,
}

/// Step states for a module given the learner's progress, if any. A module
/// without progress is shown as sitting at the first step.
pub fn step_states(progress: Option<&UserProgress>) -> Vec<StepState> {
    let module_completed = progress.is_some_and(UserProgress::is_completed);
    let current = progress
        .and_then(|p| p.current_step)
        .unwrap_or(StepType::SocraticDialogue);

    StepType::ORDER
        .iter()
        .map(|&step| StepState {
            step_type: step,
            title: step.title(),
            is_completed: module_completed || step.index() < current.index(),
            is_current: !module_completed && step == current,
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDetailBody {
    #[serde(flatten)]
    pub module: Module,
    pub is_locked: bool,
    pub steps: Vec<StepState>,
    pub scenarios: Vec<Scenario>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDetailProgress {
    pub progress_id: Uuid,
    pub status: ProgressStatus,
    pub current_step: Option<StepType>,
    #[serde(with = "rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDetail {
    pub module: ModuleDetailBody,
    pub progress: Option<ModuleDetailProgress>,
}

pub async fn module_detail(
    store: &dyn Store,
    module_id: Uuid,
    actor: UserId,
) -> Result<ModuleDetail, AppError> {
    let module = store
        .module(module_id)
        .await?
        .filter(|m| m.is_active)
        .ok_or(AppError::NotFound("module"))?;

    let progress = store.progress_for_module(actor, module.id).await?;
    let scenarios = store.scenarios(module.id).await?;
    let completed = completed_ids(&store.progress_for_user(actor).await?);

    Ok(ModuleDetail {
        module: ModuleDetailBody {
            is_locked: is_locked(&module, &completed),
            steps: step_states(progress.as_ref()),
            scenarios,
            module,
        },
        progress: progress.map(|p| ModuleDetailProgress {
            progress_id: p.id,
            status: p.status,
            current_step: p.current_step,
            started_at: p.started_at,
        }),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallModules {
    pub completed_modules: usize,
    pub total_modules: usize,
    pub percentage: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleProgressEntry {
    pub module_id: Uuid,
    pub module_title: String,
    pub status: ProgressStatus,
    pub current_step: Option<StepType>,
    pub steps_completed: u8,
    pub total_steps: u8,
    #[serde(with = "rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeView {
    pub technique: String,
    pub module_id: Uuid,
    pub module_title: String,
    #[serde(with = "rfc3339")]
    pub earned_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    ModuleStarted,
    ModuleCompleted,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub module_title: String,
    #[serde(with = "rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressOverview {
    pub overall: OverallModules,
    pub modules: Vec<ModuleProgressEntry>,
    pub badges: Vec<BadgeView>,
    pub recent_activity: Vec<Activity>,
}

async fn module_title(
    store: &dyn Store,
    titles: &mut HashMap<Uuid, String>,
    id: Uuid,
) -> Result<String, AppError> {
    if let Some(title) = titles.get(&id) {
        return Ok(title.clone());
    }
    let title = store.module(id).await?.map(|m| m.title).unwrap_or_default();
    titles.insert(id, title.clone());
    Ok(title)
}

pub async fn progress_overview(
    store: &dyn Store,
    actor: UserId,
) -> Result<ProgressOverview, AppError> {
    let modules = store.active_modules().await?;
    let progress = store.progress_for_user(actor).await?;
    let by_module: HashMap<Uuid, &UserProgress> =
        progress.iter().map(|p| (p.module_id, p)).collect();

    let entries: Vec<ModuleProgressEntry> = modules
        .iter()
        .map(|module| {
            let p = by_module.get(&module.id);
            let module_completed = p.is_some_and(|p| p.is_completed());
            let current_step = p.and_then(|p| p.current_step);
            ModuleProgressEntry {
                module_id: module.id,
                module_title: module.title.clone(),
                status: p.map_or(ProgressStatus::NotStarted, |p| p.status),
                current_step,
                steps_completed: steps_completed(current_step, module_completed),
                total_steps: TOTAL_STEPS,
                completed_at: p.and_then(|p| p.completed_at),
            }
        })
        .collect();

    let completed_modules = entries
        .iter()
        .filter(|e| e.status == ProgressStatus::Completed)
        .count();

    // Badges and activity may point at retired modules.
    let mut titles: HashMap<Uuid, String> =
        modules.iter().map(|m| (m.id, m.title.clone())).collect();

    let mut badges = Vec::new();
    for badge in store.badges(actor).await? {
        badges.push(BadgeView {
            module_title: module_title(store, &mut titles, badge.module_id).await?,
            technique: badge.technique,
            module_id: badge.module_id,
            earned_at: badge.earned_at,
        });
    }

    let mut recent_activity = Vec::new();
    for p in &progress {
        let module_title = module_title(store, &mut titles, p.module_id).await?;
        if let Some(started_at) = p.started_at {
            recent_activity.push(Activity {
                kind: ActivityKind::ModuleStarted,
                module_title: module_title.clone(),
                timestamp: started_at,
            });
        }
        if let Some(completed_at) = p.completed_at {
            recent_activity.push(Activity {
                kind: ActivityKind::ModuleCompleted,
                module_title,
                timestamp: completed_at,
            });
        }
    }
    recent_activity.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    recent_activity.truncate(RECENT_ACTIVITY_LIMIT);

    Ok(ProgressOverview {
        overall: OverallModules {
            completed_modules,
            total_modules: entries.len(),
            percentage: percent(completed_modules, entries.len()),
        },
        modules: entries,
        badges,
        recent_activity,
    })
}
