pub mod backend;

pub use backend::{get_backend_config, BackendConfig};
