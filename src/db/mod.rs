// =====================================================
// DATABASE HELPERS MODULE
// Connection strings and SQL text shared by both drivers
// =====================================================

pub mod connection_url;
pub mod sql_utils;
