// handlers/protected/clients/mod.rs - Client profile endpoints

pub mod profile;

pub use profile::{client_get, client_patch, me_get};
