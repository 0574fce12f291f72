//! Abstract fungible-asset transfer interface.
//!
//! The rewards engine moves real tokens only through these traits. Every
//! token backend (an on-chain bridge, an in-memory test token) implements
//! them; the rest of the workspace depends only on the traits.

pub mod error;

pub use error::AssetError;

use stakepool_types::AccountId;

/// A fungible asset as seen from one custody account.
///
/// An instance is bound to the pool's custody account: `transfer_in` pulls
/// from a holder into custody, `transfer_out` pushes from custody to a holder.
/// Calls are synchronous and must resolve to a definite success or failure;
/// an implementation that gives up waiting reports [`AssetError::Timeout`].
pub trait AssetTransfer: Send + Sync {
    /// Ticker-style symbol used in logs.
    fn symbol(&self) -> &str;

    /// The account holding the pool's assets.
    fn custody(&self) -> &AccountId;

    /// Pull previously authorized funds from `from` into custody.
    fn transfer_in(&self, from: &AccountId, amount: u128) -> Result<(), AssetError>;

    /// Push funds from custody to `to`.
    fn transfer_out(&self, to: &AccountId, amount: u128) -> Result<(), AssetError>;

    /// Read-only balance query.
    fn balance_of(&self, account: &AccountId) -> u128;
}
