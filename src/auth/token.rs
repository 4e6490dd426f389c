//! Token records and the secret wrapper they carry.

pub mod record;
pub mod secret;
