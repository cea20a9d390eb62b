//! The wire contract between DTMd clients and the daemon: fixed frame
//! headers, reserved request codes, and the typed commands/replies they
//! carry. Nothing in this crate touches a socket; it only knows how to
//! turn bytes into commands and commands into bytes.

pub mod codes;
mod command;
mod error_kind;
mod frame;
mod ids;
pub mod reply;
mod status;

pub use command::Command;
pub use error_kind::ErrorKind;
pub use frame::Header;
pub use ids::{Gxid, LocalXid, NodeId};
pub use reply::Reply;
pub use status::{Vote, XidStatus};
