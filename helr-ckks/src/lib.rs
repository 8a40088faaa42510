//! # helr-ckks: homomorphic-encryption capability layer
//!
//! Everything the inference engine needs from an HE scheme sits behind the
//! [`HeBackend`] trait. Two implementations ship with the crate:
//!
//! - [`PlainBackend`]: cleartext arithmetic with exact level and key
//!   accounting, for tests and dry runs
//! - [`CkksBackend`]: leveled RNS-CKKS (feature `ckks`, on by default)
//!
//! ```ignore
//! let be = CkksBackend::configure(&HeParams::default(), 1024)?;
//! let keys = be.keygen(&[1, 2, 4])?;
//! let ct = be.encrypt(&be.encode(&[1.0, 2.0])?, &keys.public)?;
//! let summed = be.sum_run(&ct, 2, &keys.eval)?;
//! let out = be.decrypt(&summed, &keys.secret)?;
//! assert!(out.valid);
//! ```

pub mod backend;
pub mod error;
pub mod params;
pub mod plain;

#[cfg(feature = "ckks")]
pub mod ckks;

pub use backend::{
    ceil_log2, eval_poly_clear, poly_depth, power_of_two_rotations, Decrypted, HeBackend, KeyPair,
};
pub use error::{HeError, Result};
pub use params::HeParams;
pub use plain::PlainBackend;

#[cfg(feature = "ckks")]
pub use ckks::CkksBackend;
