mod bitmap256;
mod error;

pub use bitmap256::Bitmap256;
pub use error::{err, Error, Result};
