// Library for tests to access modules

pub mod config;
pub mod db;
pub mod disk_history_worker;
pub mod disk_usage;
pub mod docker_repo;
pub mod history_repo;
pub mod identity;
pub mod models;
pub mod pull_client;
pub mod pusher;
pub mod routes;
pub mod sampler;
pub mod store;
pub mod sysinfo_repo;
pub mod systems_repo;
pub mod version;
pub mod worker;
