//! A single-node proof-of-work ledger.
//!
//! Signed value transfers collect in a pending pool and are sealed into
//! hash-linked blocks by a proof-of-work search. Balances are derived by
//! replaying the chain. Wallets are P-256 key pairs with Base58Check
//! addresses.

pub mod api;
pub mod blockchain;
pub mod config;
