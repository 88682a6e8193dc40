//! Stacked tile decoration: layer compositing, relief coloring, sun shading.

pub mod colorizer;
pub mod merged;
pub mod sun;

pub use merged::MergedLayerDecorator;
