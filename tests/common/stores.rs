//! Cache stores with injectable failures and latency

use cache_aside::cache::{CacheError, CacheResult, CacheService, MokaCacheService};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Moka-backed store whose reads or writes can be switched to fail
#[derive(Debug)]
pub struct FlakyStore {
    inner: MokaCacheService,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MokaCacheService::new(1_000),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self, flag: &AtomicBool, operation: &str) -> CacheResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(CacheError::BackendError(format!("injected {operation} failure")));
        }
        Ok(())
    }
}

impl CacheService for FlakyStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.check(&self.fail_reads, "get")?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.check(&self.fail_writes, "set")?;
        self.inner.set(key, value, ttl).await
    }

    async fn multi_get(&self, keys: &[String]) -> CacheResult<Vec<Option<Vec<u8>>>> {
        self.check(&self.fail_reads, "multi_get")?;
        self.inner.multi_get(keys).await
    }

    async fn multi_set(&self, entries: &[(String, Vec<u8>)], ttl: Duration) -> CacheResult<()> {
        self.check(&self.fail_writes, "multi_set")?;
        self.inner.multi_set(entries, ttl).await
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        self.check(&self.fail_writes, "delete")?;
        self.inner.delete(keys).await
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        self.check(&self.fail_writes, "set_if_absent")?;
        self.inner.set_if_absent(key, value, ttl).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> CacheResult<bool> {
        self.check(&self.fail_writes, "compare_and_delete")?;
        self.inner.compare_and_delete(key, expected).await
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        self.check(&self.fail_reads, "ttl")?;
        self.inner.ttl(key).await
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(!self.fail_reads.load(Ordering::SeqCst))
    }

    fn provider_name(&self) -> &'static str {
        "flaky"
    }

    fn is_distributed(&self) -> bool {
        false
    }
}

/// Store where every operation takes `delay` before answering a miss
#[derive(Debug)]
pub struct SlowStore {
    pub delay: Duration,
}

impl CacheService for SlowStore {
    async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        tokio::time::sleep(self.delay).await;
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> CacheResult<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn multi_get(&self, keys: &[String]) -> CacheResult<Vec<Option<Vec<u8>>>> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![None; keys.len()])
    }

    async fn multi_set(&self, _entries: &[(String, Vec<u8>)], _ttl: Duration) -> CacheResult<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn delete(&self, _keys: &[String]) -> CacheResult<u64> {
        tokio::time::sleep(self.delay).await;
        Ok(0)
    }

    async fn set_if_absent(&self, _key: &str, _value: &[u8], _ttl: Duration) -> CacheResult<bool> {
        tokio::time::sleep(self.delay).await;
        Ok(true)
    }

    async fn compare_and_delete(&self, _key: &str, _expected: &[u8]) -> CacheResult<bool> {
        tokio::time::sleep(self.delay).await;
        Ok(false)
    }

    async fn ttl(&self, _key: &str) -> CacheResult<Option<Duration>> {
        tokio::time::sleep(self.delay).await;
        Ok(None)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        tokio::time::sleep(self.delay).await;
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "slow"
    }

    fn is_distributed(&self) -> bool {
        true
    }
}
