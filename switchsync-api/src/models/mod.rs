mod control;
mod cycle;
mod device;
mod error;
mod image;

pub use control::*;
pub use cycle::*;
pub use device::*;
pub use error::*;
pub use image::*;

pub type Id = i32;
