pub mod backup;
pub mod index;
pub mod manager;
pub mod paths;
