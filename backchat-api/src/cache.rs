/// Persistent key-value storage the engine mirrors its state into, so cached
/// threads are visible before the first network round trip after a restart.
///
/// Writes are best-effort: the engine logs failures and moves on, since
/// everything in the cache can be re-fetched from the remote store.
pub trait DurableCache: Send + Sync {
    fn save(&self, key: &str, blob: &[u8]) -> anyhow::Result<()>;
    fn load(&self, key: &str) -> Option<Vec<u8>>;
    fn keys(&self, prefix: &str) -> Vec<String>;
}
