use serde_json::Value as JsonValue;

use crate::state::PlanStep;
use crate::state::PlanStepStatus;
use crate::state::TurnPlan;

/// Build a [`TurnPlan`] from a raw `turn/plan/updated` payload.
///
/// Returns `None` when nothing would be worth rendering: no step with a
/// description and no explanation text.
pub fn normalize_plan(
    turn_id: &str,
    explanation: &JsonValue,
    plan: &JsonValue,
) -> Option<TurnPlan> {
    let explanation = explanation
        .as_str()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string);

    let steps: Vec<PlanStep> = plan
        .as_array()
        .map(|steps| steps.iter().filter_map(normalize_step).collect())
        .unwrap_or_default();

    if steps.is_empty() && explanation.is_none() {
        return None;
    }

    Some(TurnPlan {
        turn_id: turn_id.to_string(),
        explanation,
        steps,
    })
}

fn normalize_step(raw: &JsonValue) -> Option<PlanStep> {
    let step = raw.get("step").and_then(JsonValue::as_str)?.trim();
    if step.is_empty() {
        return None;
    }
    let status = raw
        .get("status")
        .and_then(JsonValue::as_str)
        .map(normalize_step_status)
        .unwrap_or(PlanStepStatus::Pending);
    Some(PlanStep {
        step: step.to_string(),
        status,
    })
}

/// Case and separator insensitive: `in_progress`, `In-Progress` and
/// `inProgress` are the same status.
pub fn normalize_step_status(raw: &str) -> PlanStepStatus {
    let folded: String = raw
        .chars()
        .filter(|ch| !matches!(ch, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect();
    match folded.as_str() {
        "inprogress" | "running" | "active" => PlanStepStatus::InProgress,
        "completed" | "complete" | "done" => PlanStepStatus::Completed,
        _ => PlanStepStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn empty_plan_is_no_plan() {
        assert_eq!(normalize_plan("turn-1", &json!(""), &json!([])), None);
    }

    #[test]
    fn steps_without_description_are_dropped() {
        assert_eq!(
            normalize_plan(
                "turn-1",
                &json!(""),
                &json!([{"step": "", "status": "done"}])
            ),
            None
        );
    }

    #[test]
    fn snake_case_status_is_normalized() {
        assert_eq!(
            normalize_plan(
                "turn-1",
                &json!(""),
                &json!([{"step": "Write tests", "status": "in_progress"}])
            ),
            Some(TurnPlan {
                turn_id: "turn-1".to_string(),
                explanation: None,
                steps: vec![PlanStep {
                    step: "Write tests".to_string(),
                    status: PlanStepStatus::InProgress,
                }],
            })
        );
    }

    #[test]
    fn explanation_alone_is_a_plan() {
        let plan = normalize_plan("turn-1", &json!("  thinking it over "), &json!(null));
        assert_eq!(
            plan.and_then(|plan| plan.explanation),
            Some("thinking it over".to_string())
        );
    }

    #[test]
    fn status_spellings() {
        assert_eq!(
            normalize_step_status("In-Progress"),
            PlanStepStatus::InProgress
        );
        assert_eq!(normalize_step_status("inProgress"), PlanStepStatus::InProgress);
        assert_eq!(normalize_step_status("COMPLETE"), PlanStepStatus::Completed);
        assert_eq!(normalize_step_status("done"), PlanStepStatus::Completed);
        assert_eq!(normalize_step_status("blocked"), PlanStepStatus::Pending);
    }
}
