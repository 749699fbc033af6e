//! Thread and event reconciliation for the monitor.
//!
//! [`reduce`] is a pure `(state, action) -> state` function and
//! [`actions_for_event`] turns one pushed app-server message into the actions
//! it implies. Neither performs I/O.

mod events;
mod items;
mod normalize;
mod plan;
mod reducer;
mod state;

pub use events::WorkspaceEvent;
pub use events::WorkspaceMessage;
pub use events::actions_for_event;
pub use events::notification_event;
pub use items::ConversationItem;
pub use items::FileChangeSummary;
pub use items::MAX_TOOL_OUTPUT_BYTES;
pub use items::MessageRole;
pub use items::ReviewState;
pub use items::ToolKind;
pub use items::merge_thread_items;
pub use items::prepare_thread_items;
pub use items::upsert_item;
pub use normalize::items_from_turns;
pub use normalize::last_assistant_text;
pub use normalize::normalize_item;
pub use normalize::normalize_rate_limits;
pub use normalize::normalize_token_usage;
pub use normalize::review_in_progress;
pub use plan::normalize_plan;
pub use plan::normalize_step_status;
pub use reducer::ThreadAction;
pub use reducer::reduce;
pub use state::ApprovalRequest;
pub use state::LastAgentMessage;
pub use state::PlanStep;
pub use state::PlanStepStatus;
pub use state::RateLimitSnapshot;
pub use state::RateLimitWindow;
pub use state::THREAD_NAME_MAX_CHARS;
pub use state::ThreadStatus;
pub use state::ThreadSummary;
pub use state::ThreadTokenUsage;
pub use state::ThreadsState;
pub use state::TokenUsageBreakdown;
pub use state::TurnPlan;

/// Apply `actions` in order.
pub fn reduce_all(
    state: ThreadsState,
    actions: impl IntoIterator<Item = ThreadAction>,
) -> ThreadsState {
    actions.into_iter().fold(state, reduce)
}
