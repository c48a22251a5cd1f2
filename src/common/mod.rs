pub mod block_info;
pub mod chomp;
pub mod codec;
pub mod ec;
pub mod error;
pub mod galois;
pub mod mask;
pub mod metadata;

pub use error::*;
