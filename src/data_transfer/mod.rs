// =====================================================
// STAGING TRANSFER MODULE
// =====================================================

pub mod connection_resolver;
pub mod engine;
pub mod models;
pub mod procedure;
pub mod session;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;
