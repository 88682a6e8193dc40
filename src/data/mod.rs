pub mod geojson;
pub mod mask;
