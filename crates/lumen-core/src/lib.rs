pub mod align;
pub mod consts;
pub mod error;
pub mod frame;
pub mod merge;
pub mod mfsr;
pub mod pipeline;
pub mod pyramid;
pub mod sanitize;
pub mod tiled;
