pub mod edge_repo;
pub mod schema;
pub mod task_repo;

pub use schema::open_db;
