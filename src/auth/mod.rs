pub mod cookies;
pub mod dto;
pub mod guard;
pub mod handlers;
pub mod password;
pub mod pg;
pub mod records;
pub mod scheme;
pub mod service;
pub mod store;
#[cfg(test)]
pub(crate) mod testing;
pub mod tokens;
pub mod validate;
