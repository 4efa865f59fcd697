use crate::error::{AgentError, Result};
use crate::events::TurnEvent;
use crate::executor::TurnExecutor;
use crate::reconciler::TurnReconciler;
use tokio::sync::mpsc;

/// Human verdict on an approval-gated tool call.
#[derive(Debug, Clone)]
pub enum Verdict {
    /// Run the call; edited arguments, when present, replace the model's.
    Approved { arguments: Option<String> },
    /// Do not run the call. The feedback, when present, is surfaced to the
    /// model as the call's result so it can adjust course.
    Rejected { feedback: Option<String> },
}

impl TurnExecutor {
    /// Resolve a suspended tool call and resume the turn.
    ///
    /// The verdict is recorded first, so a crash between recording and
    /// execution leaves a resolved call whose result the continuation can
    /// still produce. A call may be resolved exactly once. Rejected calls
    /// are never executed; a synthetic error result carries the reviewer's
    /// feedback back to the model.
    pub async fn validate_tool_call(
        &self,
        thread_id: &str,
        tool_call_id: &str,
        verdict: Verdict,
    ) -> Result<mpsc::Receiver<TurnEvent>> {
        let (_, call) = self
            .store()
            .find_tool_call(thread_id, tool_call_id)
            .await?
            .ok_or_else(|| AgentError::ToolCallNotFound(tool_call_id.to_string()))?;

        if call.validated.is_some() {
            return Err(AgentError::ToolCallAlreadyResolved(
                tool_call_id.to_string(),
            ));
        }

        let thread = self
            .store()
            .get_thread(thread_id)
            .await?
            .ok_or_else(|| AgentError::ThreadNotFound(thread_id.to_string()))?;

        let reconciler = TurnReconciler::new(self.store().clone(), thread_id);

        match verdict {
            Verdict::Approved { arguments } => {
                self.store()
                    .set_tool_call_validation(thread_id, tool_call_id, true, arguments.clone())
                    .await?;

                let effective_args = arguments.unwrap_or(call.arguments);
                let (content, is_error) = self
                    .invoke_tool(&call.name, &effective_args, &thread.user_id)
                    .await;
                reconciler
                    .save_tool_result(tool_call_id, &call.name, content, is_error)
                    .await?;
            }
            Verdict::Rejected { feedback } => {
                self.store()
                    .set_tool_call_validation(thread_id, tool_call_id, false, None)
                    .await?;

                let content = match feedback {
                    Some(feedback) => {
                        format!("Tool call rejected by the user. Feedback: {}", feedback)
                    }
                    None => "Tool call rejected by the user.".to_string(),
                };
                reconciler
                    .save_tool_result(tool_call_id, &call.name, content, true)
                    .await?;
            }
        }

        // With several gated calls on one shell, resume only once the last
        // verdict lands; the model must never see a call without a result.
        let (owner, _) = self
            .store()
            .find_tool_call(thread_id, tool_call_id)
            .await?
            .ok_or_else(|| AgentError::ToolCallNotFound(tool_call_id.to_string()))?;
        for sibling in &owner.tool_calls {
            if self
                .store()
                .find_tool_result(thread_id, &sibling.id)
                .await?
                .is_none()
            {
                let (_tx, rx) = mpsc::channel(1);
                return Ok(rx);
            }
        }

        Ok(self.run_continuation(thread_id))
    }
}
