pub mod http;
pub mod library;
pub mod locks;
pub mod store;
