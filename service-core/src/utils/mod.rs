pub mod locks;
pub mod signature;

pub use locks::KeyedLocks;
