pub mod errors;
pub mod models;
pub mod protocol;
pub mod providers;
pub mod registry;
pub mod relay;
pub mod stream;
