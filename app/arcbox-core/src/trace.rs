//! Request correlation for log lines.
//!
//! The Docker API middleware runs each request inside [`scope`]; anything
//! awaited within it, the usage aggregator included, can then tag its log
//! lines with [`current_trace_id`]. Collections spawned by the aggregator
//! run on their own tasks and do not inherit the ID.

use std::future::Future;

tokio::task_local! {
    /// Trace ID of the request being served on this task.
    pub static CURRENT_TRACE_ID: String;
}

/// Runs `fut` with `trace_id` as the current trace ID.
pub async fn scope<F: Future>(trace_id: String, fut: F) -> F::Output {
    CURRENT_TRACE_ID.scope(trace_id, fut).await
}

/// Returns the current trace ID, or an empty string outside a request.
pub fn current_trace_id() -> String {
    CURRENT_TRACE_ID
        .try_with(Clone::clone)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trace_id_is_visible_inside_scope_only() {
        assert_eq!(current_trace_id(), "");
        let seen = scope("req-1".to_string(), async { current_trace_id() }).await;
        assert_eq!(seen, "req-1");
        assert_eq!(current_trace_id(), "");
    }

    #[tokio::test]
    async fn spawned_tasks_do_not_inherit_the_id() {
        let inner = scope("req-2".to_string(), async {
            tokio::spawn(async { current_trace_id() }).await.unwrap()
        })
        .await;
        assert_eq!(inner, "");
    }
}
