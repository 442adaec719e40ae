pub mod classifier;
pub mod policy;
pub mod request;
pub mod worker;
pub mod worker_model;

pub use classifier::*;
pub use policy::*;
pub use request::*;
pub use worker::*;
pub use worker_model::*;
