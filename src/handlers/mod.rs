mod admin;
pub mod data;
mod health;

pub use admin::{delete_limit, info, list_limits, set_limit};
pub use data::{fast_response, get_data, slow_response, stream_data};
pub use health::health_check;
