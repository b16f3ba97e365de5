pub mod add;
pub mod backup;
pub mod init;
pub mod list;
pub mod migrate;
pub mod remove;
pub mod render;
pub mod rollback;
pub mod show;
pub mod status;
pub mod sync;
