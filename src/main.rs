/*!
 * Keyed RwLock Demo
 *
 * Drives both primitives under contention and logs what happens:
 * - Readers and writers racing on a handful of keys
 * - A non-blocking attempt on a held key
 * - A nested reentrant chain competing with an unrelated chain
 */

use anyhow::Context;
use keyed_rwlock::{init_tracing, KeyedLocker, LockerConfig, ReentrantMutex, TimeoutPolicy};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

const KEYS: [&str; 3] = ["alpha", "beta", "gamma"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let locker: KeyedLocker = KeyedLocker::with_config(LockerConfig::from_env());
    info!(config = ?locker.config(), "Keyed locker ready");

    let mut workers = Vec::new();
    for worker in 0..12usize {
        let locker = locker.clone();
        let key = KEYS[worker % KEYS.len()];
        workers.push(tokio::spawn(async move {
            let handle = if worker % 4 == 0 {
                locker.write_lock(key, Duration::from_millis(200)).await
            } else {
                locker.read_lock(key, TimeoutPolicy::Infinite).await
            };
            match handle {
                Some(handle) => {
                    info!(worker, key, kind = handle.kind().as_str(), "lock granted");
                    sleep(Duration::from_millis(20)).await;
                }
                None => info!(worker, key, "gave up waiting"),
            }
        }));
    }
    for worker in workers {
        worker.await.context("lock worker panicked")?;
    }

    let held = locker.write_lock("alpha", TimeoutPolicy::Infinite).await;
    let attempt = locker.read_lock("alpha", Duration::ZERO).await;
    info!(
        held = held.is_some(),
        attempt_granted = attempt.is_some(),
        "non-blocking attempt on a held key"
    );
    drop(held);

    let mutex = Arc::new(ReentrantMutex::new());
    let nested = {
        let mutex = mutex.clone();
        tokio::spawn(async move {
            mutex
                .run_exclusive(|| async {
                    info!(depth = mutex.depth(), "outer section");
                    sleep(Duration::from_millis(30)).await;
                    mutex
                        .run_exclusive(|| async {
                            info!(depth = mutex.depth(), "nested section");
                        })
                        .await
                })
                .await
        })
    };
    sleep(Duration::from_millis(5)).await;
    let unrelated = {
        let mutex = mutex.clone();
        tokio::spawn(async move {
            mutex
                .run_exclusive(|| async {
                    info!(depth = mutex.depth(), "unrelated section");
                })
                .await
        })
    };

    nested
        .await
        .context("nested chain panicked")?
        .context("nested chain lost its gate")?
        .context("inner section lost its gate")?;
    unrelated
        .await
        .context("unrelated chain panicked")?
        .context("unrelated chain lost its gate")?;

    let stats = serde_json::to_string(&locker.stats()).context("serializing stats")?;
    info!(%stats, "Demo finished");
    Ok(())
}
