mod backup_restore;
mod base;
mod connection;
mod coordination;
mod drain;

pub use backup_restore::*;
pub use base::*;
pub use connection::*;
pub use coordination::*;
pub use drain::*;
