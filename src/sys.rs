pub mod display;
pub mod event;
pub mod geometry;
pub mod keys;
pub mod process;
pub mod x11;
