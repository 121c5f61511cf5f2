//! Procedural core of the diorama scene: cloud density volume, domain-warped
//! terrain with biome colouring, volumetric cloud raymarching, the CSG board
//! and the frame scheduler that keeps them in step.
//!
//! Nothing in here touches a graphics device. The viewer crate binds these
//! functions into Bevy.

pub mod clouds;
pub mod csg;
pub mod environment;
pub mod error;
pub mod noise_volume;
pub mod params;
pub mod preview;
pub mod schedule;
pub mod terrain;

pub use error::{AssetLoadError, GeometryError, ParameterOutOfRange, SceneError, VolumeError};
pub use params::{BiomePalette, CloudParameters, ParameterUpdate, TerrainShape, UniformParameters};
