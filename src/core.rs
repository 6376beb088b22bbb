pub mod allocator;
pub mod batch;
pub mod builder;
pub mod curve;
pub mod error;
pub mod instant;
pub mod interval;
pub mod observer;
pub mod period;
pub mod session;
pub mod summary;
pub mod validator;
