pub mod client;
pub mod devicefarm;
pub mod error;
pub mod pool;
pub mod sagemaker;

pub use client::Client;
pub use devicefarm::DeviceFarmApi;
pub use error::{ApiError, ErrorBody};
pub use pool::{ConnectionPoolConfig, ConnectionStats};
pub use sagemaker::SageMakerApi;
