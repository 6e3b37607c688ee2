use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::store::Store;
use crate::types::{StepType, Submission, UserId};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitWorkRequest {
    pub step_type: StepType,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionFilter {
    pub step_type: Option<StepType>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionView {
    #[serde(flatten)]
    pub submission: Submission,
    pub module_title: String,
}

/// Save a prompt draft or a journal entry against a learner's progress.
pub async fn submit_work(
    store: &dyn Store,
    progress_id: Uuid,
    step: StepType,
    content: &str,
    actor: UserId,
) -> Result<Submission, AppError> {
    let progress = store
        .progress(progress_id)
        .await?
        .filter(|p| p.user_id == actor)
        .ok_or(AppError::NotFound("progress"))?;

    if step == StepType::SocraticDialogue {
        return Err(AppError::Validation(
            "socratic_dialogue work is recorded in the dialogue transcript".into(),
        ));
    }
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("content must not be empty".into()));
    }

    let submission = Submission {
        id: Uuid::new_v4(),
        progress_id: progress.id,
        user_id: actor,
        module_id: progress.module_id,
        step_type: step,
        content: content.to_string(),
        created_at: OffsetDateTime::now_utc(),
    };
    store.insert_submission(&submission).await?;

    info!(user_id = %actor, progress_id = %progress.id, step = %step, "work submitted");
    Ok(submission)
}

pub async fn list_submissions(
    store: &dyn Store,
    actor: UserId,
    step: Option<StepType>,
) -> Result<Vec<SubmissionView>, AppError> {
    let submissions = store.submissions(actor, step).await?;

    let mut titles: HashMap<Uuid, String> = HashMap::new();
    let mut views = Vec::with_capacity(submissions.len());
    for submission in submissions {
        let module_title = match titles.get(&submission.module_id) {
            Some(title) => title.clone(),
            None => {
                let title = store
                    .module(submission.module_id)
                    .await?
                    .map(|m| m.title)
                    .unwrap_or_default();
                titles.insert(submission.module_id, title.clone());
                title
            }
        };
        views.push(SubmissionView {
            submission,
            module_title,
        });
    }
    Ok(views)
}
