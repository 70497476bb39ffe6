pub mod pool_repo;

pub use pool_repo::PoolRepository;
