//! Engine core shared by every embedding surface.

mod overtab_core;
pub mod renderer;

pub use overtab_core::OvertabCore;
pub use renderer::{NullRenderer, RendererBridge, StateUpdate};
