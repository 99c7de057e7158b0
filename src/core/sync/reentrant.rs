/*!
 * Reentrant Async Mutex
 *
 * Mutual exclusion scoped to a call chain rather than a thread.
 *
 * # Algorithm
 *
 * Every mutex has a root gate (a one-permit semaphore). A task-local chain of
 * frames records, per mutex, the gate the current call chain must pass:
 *
 * 1. Acquire the current gate (root gate when no frame exists)
 * 2. Install a fresh, open gate as the current gate for the body
 * 3. Run the body; nested calls acquire the fresh gate, never the one we hold
 * 4. Acquire the fresh gate again, which waits out any nested call still
 *    running, then close it
 *
 * The permit for the outer gate lives in the frame. It is returned when the
 * last holder of the frame goes away, which includes inherited children. A
 * cancelled or panicking call therefore keeps the mutex until every child
 * that carries its chain has finished.
 *
 * Unrelated call chains all start from the root gate and are serialized.
 * Recursion gets a new gate per depth and never waits on itself.
 *
 * # Spawned tasks
 *
 * Task-locals do not cross `tokio::spawn`. Wrap a child future with
 * [`ReentrantMutex::inherit`] to run it inside the caller's chain. A child that
 * outlives the call which installed its gate gets [`LockError::GateClosed`].
 */

use crate::core::errors::{LockError, LockResult};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace};

tokio::task_local! {
    static GATE_CHAIN: Arc<GateFrame>;
}

static NEXT_MUTEX_ID: AtomicU64 = AtomicU64::new(1);

struct GateFrame {
    mutex_id: u64,
    gate: Arc<Semaphore>,
    parent: Option<Arc<GateFrame>>,
    _outer: OwnedSemaphorePermit,
}

impl GateFrame {
    fn ancestors(&self) -> impl Iterator<Item = &GateFrame> {
        let mut next = Some(self);
        std::iter::from_fn(move || {
            let frame = next?;
            next = frame.parent.as_deref();
            Some(frame)
        })
    }
}

/// Closes a gate when dropped, so nothing can pass it once its owner is gone
struct CloseOnDrop(Arc<Semaphore>);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

fn current_chain() -> Option<Arc<GateFrame>> {
    GATE_CHAIN.try_with(Arc::clone).ok()
}

/// Async mutex that a call chain may re-enter
///
/// # Example
///
/// ```ignore
/// let mutex = ReentrantMutex::new();
///
/// let total = mutex
///     .run_exclusive(|| async {
///         let inner = mutex.run_exclusive(|| async { 2 }).await?;
///         Ok::<_, LockError>(inner + 40)
///     })
///     .await??;
/// assert_eq!(total, 42);
/// ```
#[derive(Debug)]
pub struct ReentrantMutex {
    id: u64,
    root: Arc<Semaphore>,
}

impl ReentrantMutex {
    pub fn new() -> Self {
        Self {
            id: NEXT_MUTEX_ID.fetch_add(1, Ordering::Relaxed),
            root: Arc::new(Semaphore::new(1)),
        }
    }

    /// Run `body` while holding the mutex
    ///
    /// Calls nested inside `body` on the same call chain pass straight
    /// through. The mutex is released only after `body` and every nested call
    /// under it have finished. The body's output is returned as is.
    ///
    /// If this future is dropped early, the mutex stays held until inherited
    /// children that captured this call's chain have completed.
    ///
    /// # Errors
    ///
    /// [`LockError::GateClosed`] if the gate this call must pass belongs to a
    /// call that has already returned.
    pub async fn run_exclusive<F, Fut, T>(&self, body: F) -> LockResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let chain = current_chain();
        let depth = self.depth_in(chain.as_ref());
        let outer = self.gate_in(chain.as_ref());

        let outer_permit = outer.acquire_owned().await?;
        trace!(mutex = self.id, depth, "reentrant gate acquired");

        let inner = Arc::new(Semaphore::new(1));
        let closer = CloseOnDrop(inner.clone());
        let frame = Arc::new(GateFrame {
            mutex_id: self.id,
            gate: inner.clone(),
            parent: chain,
            _outer: outer_permit,
        });

        let output = GATE_CHAIN
            .scope(frame.clone(), async move { body().await })
            .await;

        // Wait out nested calls that still hold the inner gate
        let drained = inner.acquire().await.map_err(|_| LockError::GateClosed)?;
        inner.close();
        drop(drained);
        drop(closer);
        // Outer gate reopens once no inherited child still holds the frame
        drop(frame);

        debug!(mutex = self.id, depth, "reentrant section unwound");
        Ok(output)
    }

    /// Carry the current call chain into `future`
    ///
    /// Use this for futures handed to `tokio::spawn` from inside a
    /// [`run_exclusive`](Self::run_exclusive) body. The wrapped future keeps
    /// the enclosing section's hold on the mutex alive until it completes.
    pub fn inherit<F: Future>(future: F) -> impl Future<Output = F::Output> {
        let chain = current_chain();
        async move {
            match chain {
                Some(chain) => GATE_CHAIN.scope(chain, future).await,
                None => future.await,
            }
        }
    }

    /// Nesting depth of this mutex in the current call chain
    pub fn depth(&self) -> usize {
        self.depth_in(current_chain().as_ref())
    }

    /// Whether the current call chain is inside a `run_exclusive` of this mutex
    pub fn is_held_by_current_chain(&self) -> bool {
        self.depth() > 0
    }

    fn gate_in(&self, chain: Option<&Arc<GateFrame>>) -> Arc<Semaphore> {
        chain
            .and_then(|chain| chain.ancestors().find(|f| f.mutex_id == self.id))
            .map(|frame| frame.gate.clone())
            .unwrap_or_else(|| self.root.clone())
    }

    fn depth_in(&self, chain: Option<&Arc<GateFrame>>) -> usize {
        chain.map_or(0, |chain| {
            chain.ancestors().filter(|f| f.mutex_id == self.id).count()
        })
    }
}

impl Default for ReentrantMutex {
    fn default() -> Self {
        Self::new()
    }
}
