pub mod locks;
pub mod memory;
pub mod traits;
