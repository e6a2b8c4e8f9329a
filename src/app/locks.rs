use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type ChapterKey = (String, u32);

/// One async lock per (novel, chapter), so a chapter has at most one
/// translation in flight.
#[derive(Debug, Default, Clone)]
pub struct ChapterLocks {
    locks: Arc<Mutex<HashMap<ChapterKey, Arc<AsyncMutex<()>>>>>,
}

impl ChapterLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, novel_id: &str, chapter_number: u32) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries only referenced by the map are idle.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(
                locks
                    .entry((novel_id.to_owned(), chapter_number))
                    .or_default(),
            )
        };
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_chapter_is_serialized() {
        let locks = ChapterLocks::new();
        let guard = locks.acquire("n", 1).await;

        let waiting = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("n", 1).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .expect("second acquire completes")
            .unwrap();
    }

    #[tokio::test]
    async fn different_chapters_do_not_block_and_idle_entries_are_pruned() {
        let locks = ChapterLocks::new();
        let first = locks.acquire("n", 1).await;
        let second = tokio::time::timeout(Duration::from_secs(1), locks.acquire("n", 2))
            .await
            .expect("other chapter is free");
        assert_eq!(locks.len(), 2);

        drop(first);
        drop(second);
        let _third = locks.acquire("m", 1).await;
        assert_eq!(locks.len(), 1);
    }
}
