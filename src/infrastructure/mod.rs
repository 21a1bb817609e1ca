pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod simulated_gateway;
pub mod stripe;
