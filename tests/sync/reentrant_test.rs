/*!
 * Reentrant Mutex Tests
 *
 * Nesting, cross-chain exclusion and context propagation to spawned tasks
 */

use keyed_rwlock::{LockError, ReentrantMutex};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};

#[tokio::test]
async fn test_deep_nesting_does_not_deadlock() {
    let mutex = ReentrantMutex::new();

    let result = timeout(
        Duration::from_secs(1),
        mutex.run_exclusive(|| async {
            mutex
                .run_exclusive(|| async {
                    mutex
                        .run_exclusive(|| async { mutex.depth() })
                        .await
                        .unwrap()
                        * 10
                })
                .await
                .unwrap()
                + 1
        }),
    )
    .await
    .expect("nested run_exclusive deadlocked");

    assert_eq!(result, Ok(31));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unrelated_chains_are_mutually_exclusive() {
    let mutex = Arc::new(ReentrantMutex::new());
    let inside = Arc::new(AtomicUsize::new(0));
    let max_inside = Arc::new(AtomicUsize::new(0));
    let mut tasks = Vec::new();

    for _ in 0..8 {
        let mutex = mutex.clone();
        let inside = inside.clone();
        let max_inside = max_inside.clone();
        tasks.push(tokio::spawn(async move {
            mutex
                .run_exclusive(|| async {
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(5)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
                .await
        }));
    }

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(max_inside.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_independent_chain_waits_for_full_unwind() {
    let mutex = Arc::new(ReentrantMutex::new());
    let events = Arc::new(Mutex::new(Vec::new()));
    let (entered_tx, entered_rx) = oneshot::channel::<()>();

    let chain_a = {
        let mutex = mutex.clone();
        let events = events.clone();
        tokio::spawn(async move {
            mutex
                .run_exclusive(|| async {
                    events.lock().push("f:start");
                    entered_tx.send(()).unwrap();
                    sleep(Duration::from_millis(50)).await;
                    mutex
                        .run_exclusive(|| async {
                            sleep(Duration::from_millis(20)).await;
                            events.lock().push("g");
                        })
                        .await
                        .unwrap();
                    events.lock().push("f:end");
                })
                .await
        })
    };

    entered_rx.await.unwrap();
    let chain_b = {
        let mutex = mutex.clone();
        let events = events.clone();
        tokio::spawn(async move {
            mutex
                .run_exclusive(|| async {
                    events.lock().push("h");
                })
                .await
        })
    };

    chain_a.await.unwrap().unwrap();
    chain_b.await.unwrap().unwrap();

    assert_eq!(*events.lock(), vec!["f:start", "g", "f:end", "h"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_inherited_child_reenters_without_deadlock() {
    let mutex = Arc::new(ReentrantMutex::new());

    let depth = timeout(
        Duration::from_secs(1),
        mutex.run_exclusive(|| async {
            let child_mutex = mutex.clone();
            let child = tokio::spawn(ReentrantMutex::inherit(async move {
                child_mutex
                    .run_exclusive(|| async { child_mutex.depth() })
                    .await
            }));
            child.await.unwrap()
        }),
    )
    .await
    .expect("inherited child deadlocked");

    assert_eq!(depth, Ok(Ok(2)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_outer_unwind_waits_for_inherited_child() {
    let mutex = Arc::new(ReentrantMutex::new());
    let events = Arc::new(Mutex::new(Vec::new()));
    let (entered_tx, entered_rx) = oneshot::channel::<()>();

    let outer = {
        let mutex = mutex.clone();
        let events = events.clone();
        async move {
            mutex
                .run_exclusive(|| async {
                    let child_mutex = mutex.clone();
                    let child_events = events.clone();
                    tokio::spawn(ReentrantMutex::inherit(async move {
                        child_mutex
                            .run_exclusive(|| async {
                                entered_tx.send(()).unwrap();
                                sleep(Duration::from_millis(50)).await;
                                child_events.lock().push("child");
                            })
                            .await
                    }));
                    // Return while the child is still inside its section
                    entered_rx.await.unwrap();
                    events.lock().push("body");
                })
                .await
        }
    };

    outer.await.unwrap();
    events.lock().push("unwound");

    assert_eq!(*events.lock(), vec!["body", "child", "unwound"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_child_outliving_its_gate_is_rejected() {
    let mutex = Arc::new(ReentrantMutex::new());
    let (go_tx, go_rx) = oneshot::channel::<()>();

    let late_child = mutex
        .run_exclusive(|| async {
            let child_mutex = mutex.clone();
            tokio::spawn(ReentrantMutex::inherit(async move {
                go_rx.await.unwrap();
                child_mutex.run_exclusive(|| async { "ran" }).await
            }))
        })
        .await
        .unwrap();

    go_tx.send(()).unwrap();
    assert_eq!(late_child.await.unwrap(), Err(LockError::GateClosed));

    // The root gate is unaffected
    assert_eq!(mutex.run_exclusive(|| async { "ok" }).await, Ok("ok"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_plain_spawn_does_not_inherit() {
    let mutex = Arc::new(ReentrantMutex::new());

    let outcome = mutex
        .run_exclusive(|| async {
            let child_mutex = mutex.clone();
            let mut child = tokio::spawn(async move {
                child_mutex.run_exclusive(|| async {}).await
            });
            // Without inherit the child is an unrelated chain and must wait
            let blocked = timeout(Duration::from_millis(50), &mut child).await.is_err();
            (blocked, child)
        })
        .await
        .unwrap();

    let (blocked, child) = outcome;
    assert!(blocked);
    assert_eq!(child.await.unwrap(), Ok(()));
}

#[tokio::test]
async fn test_cancelled_section_releases_mutex() {
    let mutex = ReentrantMutex::new();

    let cancelled = timeout(
        Duration::from_millis(20),
        mutex.run_exclusive(|| async {
            sleep(Duration::from_secs(10)).await;
        }),
    )
    .await;
    assert!(cancelled.is_err());

    let again = timeout(Duration::from_secs(1), mutex.run_exclusive(|| async { 5 }))
        .await
        .expect("mutex still held after cancellation");
    assert_eq!(again, Ok(5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_outer_call_waits_for_inherited_child() {
    let mutex = Arc::new(ReentrantMutex::new());
    let inside = Arc::new(AtomicUsize::new(0));
    let (entered_tx, entered_rx) = oneshot::channel::<()>();

    let cancelled = timeout(
        Duration::from_millis(30),
        mutex.run_exclusive(|| async {
            let child_mutex = mutex.clone();
            let child_inside = inside.clone();
            tokio::spawn(ReentrantMutex::inherit(async move {
                child_mutex
                    .run_exclusive(|| async {
                        child_inside.store(1, Ordering::SeqCst);
                        entered_tx.send(()).unwrap();
                        sleep(Duration::from_millis(300)).await;
                        child_inside.store(0, Ordering::SeqCst);
                    })
                    .await
            }));
            entered_rx.await.unwrap();
            sleep(Duration::from_secs(10)).await;
        }),
    )
    .await;
    assert!(cancelled.is_err());
    assert_eq!(inside.load(Ordering::SeqCst), 1);

    // An unrelated chain only gets in after the child has left
    let seen = timeout(
        Duration::from_secs(2),
        mutex.run_exclusive(|| async { inside.load(Ordering::SeqCst) }),
    )
    .await
    .expect("mutex never released after the child finished");
    assert_eq!(seen, Ok(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_outer_body_waits_for_inherited_child() {
    let mutex = Arc::new(ReentrantMutex::new());
    let inside = Arc::new(AtomicUsize::new(0));
    let (entered_tx, entered_rx) = oneshot::channel::<()>();

    let outer = {
        let mutex = mutex.clone();
        let inside = inside.clone();
        tokio::spawn(async move {
            mutex
                .run_exclusive(|| async {
                    let child_mutex = mutex.clone();
                    let child_inside = inside.clone();
                    tokio::spawn(ReentrantMutex::inherit(async move {
                        child_mutex
                            .run_exclusive(|| async {
                                child_inside.store(1, Ordering::SeqCst);
                                entered_tx.send(()).unwrap();
                                sleep(Duration::from_millis(200)).await;
                                child_inside.store(0, Ordering::SeqCst);
                            })
                            .await
                    }));
                    entered_rx.await.unwrap();
                    panic!("outer body failed");
                })
                .await
        })
    };
    assert!(outer.await.unwrap_err().is_panic());

    let seen = timeout(
        Duration::from_secs(2),
        mutex.run_exclusive(|| async { inside.load(Ordering::SeqCst) }),
    )
    .await
    .expect("mutex never released after the child finished");
    assert_eq!(seen, Ok(0));
}
