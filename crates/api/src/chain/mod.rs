// Path: crates/api/src/chain/mod.rs
//! Read-only view of the host chain.

/// What the governance engine needs to know about the chain it runs on.
pub trait ChainView: Send + Sync {
    /// Height of the best known block.
    fn best_height(&self) -> u32;

    /// True once the node has caught up with the network. Engine side effects
    /// that publish transactions are suppressed while syncing.
    fn is_current(&self) -> bool;
}
