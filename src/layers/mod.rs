pub mod debounce;
pub mod texture;

pub use debounce::RepaintScheduler;
pub use texture::{TextureLayer, TextureLayerEvent};
