use std::sync::OnceLock;

use anyhow::{Result, bail};
use regex::Regex;

use habit_types::{RewardDraft, TaskDraft, TaskType};

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

pub fn is_valid_email(email: &str) -> bool {
    let re = EMAIL_RE
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));
    re.is_match(email)
}

/// Point values must carry the sign their task type implies: positive
/// for daily and achievement tasks, negative for bad habits.
pub fn validate_task_draft(draft: &TaskDraft) -> Result<()> {
    if draft.name.trim().is_empty() {
        bail!("Task name cannot be empty");
    }
    match draft.task_type {
        TaskType::Daily | TaskType::Achievement => {
            if draft.point_value <= 0 {
                bail!("Point value must be positive for {} tasks", draft.task_type.as_str());
            }
        }
        TaskType::BadHabit => {
            if draft.point_value >= 0 {
                bail!("Point value must be negative for bad habits");
            }
        }
    }
    Ok(())
}

pub fn validate_reward_draft(draft: &RewardDraft) -> Result<()> {
    if draft.name.trim().is_empty() {
        bail!("Reward name cannot be empty");
    }
    if draft.point_cost <= 0 {
        bail!("Point cost must be positive");
    }
    Ok(())
}

/// Pairing invitations may not target the sender's own address.
pub fn validate_invitation_target(own_email: &str, to_email: &str) -> Result<()> {
    if !is_valid_email(to_email) {
        bail!("Invalid email address");
    }
    if own_email.eq_ignore_ascii_case(to_email) {
        bail!("Cannot invite yourself");
    }
    Ok(())
}
