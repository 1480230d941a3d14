use crate::crypto::KdfParams;

/// Per-store tuning. `Default` is what production stores use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Cost parameters used for every envelope this store writes. Loading
    /// always honours the parameters recorded in the envelope itself.
    pub kdf: KdfParams,
    /// `sync_all` the staged file (and its directory on unix) around the
    /// commit rename, trading latency for power-loss durability.
    pub sync_before_rename: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            sync_before_rename: true,
        }
    }
}
