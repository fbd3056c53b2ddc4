//! Fashion nodes

mod virtual_try_on;

pub use virtual_try_on::VirtualTryOn;
