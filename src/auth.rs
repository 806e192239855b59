//! Bearer credential models: length-only secrets and the access/refresh token pair.

pub mod pair;
pub mod secret;

pub use pair::*;
pub use secret::*;
