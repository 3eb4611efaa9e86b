//! Task-local stack of active execution ids.
//!
//! Each task that calls [`scope`] gets its own stack; a task never observes
//! another task's frames, even when both run on the same worker thread of a
//! multi-threaded runtime (the reason this is `tokio::task_local!` and not a
//! plain `thread_local!`: a task can migrate between worker threads between
//! `.await` points).

use std::cell::RefCell;

use tokio::task_local;
use uuid::Uuid;

task_local! {
    static STACK: RefCell<Vec<Uuid>>;
}

/// RAII guard releasing its frame on drop, including on unwind — this is
/// what guarantees `pop()` still runs when `execute` returns via `?`.
pub struct ContextGuard {
    _private: (),
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let _ = STACK.try_with(|s| {
            s.borrow_mut().pop();
        });
    }
}

/// Push `id` as the innermost active execution. No-op (returns a guard that
/// does nothing on drop) if called outside a [`scope`] — synchronous call
/// sites that never entered a task-local scope simply don't get linkage.
pub fn push(id: Uuid) -> ContextGuard {
    let _ = STACK.try_with(|s| s.borrow_mut().push(id));
    ContextGuard { _private: () }
}

/// The innermost active execution id, if any.
pub fn current() -> Option<Uuid> {
    STACK.try_with(|s| s.borrow().last().copied()).unwrap_or(None)
}

/// The outermost active execution id, if any.
pub fn root() -> Option<Uuid> {
    STACK
        .try_with(|s| s.borrow().first().copied())
        .unwrap_or(None)
}

/// Current stack depth, used by the context-balance property: depth before
/// an `execute` call must equal depth after.
pub fn depth() -> usize {
    STACK.try_with(|s| s.borrow().len()).unwrap_or(0)
}

/// Establish a fresh, empty stack for the duration of `future`. `aexecute`
/// and `execute_batch` wrap their work in this; nested `execute`/`aexecute`
/// calls within the same task share the stack `scope` established.
pub async fn scope<F: std::future::Future>(future: F) -> F::Output {
    STACK.scope(RefCell::new(Vec::new()), future).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_and_pop_balance_depth() {
        scope(async {
            assert_eq!(depth(), 0);
            let guard = push(Uuid::now_v7());
            assert_eq!(depth(), 1);
            drop(guard);
            assert_eq!(depth(), 0);
        })
        .await;
    }

    #[tokio::test]
    async fn nested_push_links_root_and_current() {
        scope(async {
            let outer = Uuid::now_v7();
            let inner = Uuid::now_v7();
            let outer_guard = push(outer);
            let inner_guard = push(inner);
            assert_eq!(current(), Some(inner));
            assert_eq!(root(), Some(outer));
            drop(inner_guard);
            assert_eq!(current(), Some(outer));
            drop(outer_guard);
            assert_eq!(depth(), 0);
        })
        .await;
    }

    #[tokio::test]
    async fn separate_scopes_do_not_observe_each_other() {
        let a = scope(async {
            push(Uuid::now_v7());
            depth()
        });
        let b = scope(async { depth() });
        let (a, b) = tokio::join!(a, b);
        assert_eq!(a, 1);
        assert_eq!(b, 0);
    }
}
