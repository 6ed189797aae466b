// I/O adapters: persistent key/value storage and the backend HTTP client

pub mod api;
pub mod storage;
