/// User administration: persistence and tenant-scoped operations

pub mod repository;
pub mod service;

pub use service::UserService;
