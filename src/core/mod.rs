pub mod auth;
pub mod db;
pub mod notify;
pub mod router;
pub mod session;
pub mod sync;
