pub mod buffer;
pub mod element;

pub use buffer::{Buffer, Layout, MemorySpace, Storage};
pub use element::{Bf16, Element};
