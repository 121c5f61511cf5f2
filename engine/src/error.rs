use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// CSG operand or result that cannot become a valid mesh.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("{operand} brush is degenerate: size {size:?}")]
    DegenerateOperand { operand: &'static str, size: [f32; 3] },
    #[error("subtraction removes the whole solid")]
    EmptyResult,
    #[error("result is not manifold: edge {from}->{to} is used {count} times")]
    NonManifold { from: u32, to: u32, count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VolumeError {
    #[error("noise volume size must be positive")]
    ZeroSize,
    #[error("noise volume of side {0} does not fit in memory")]
    TooLarge(u32),
}

#[derive(Debug, Error)]
pub enum AssetLoadError {
    #[error("environment map {0:?} is missing")]
    Missing(PathBuf),
    #[error("environment map {path:?} could not be loaded")]
    Failed { path: PathBuf },
    #[error("environment map has unsupported texel format {0}")]
    UnsupportedFormat(String),
    #[error("environment map data is corrupt: expected {expected} texels, found {found}")]
    Corrupt { expected: usize, found: usize },
}

/// Startup faults. Any of these aborts scene construction.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("frame mesh construction failed: {0}")]
    Geometry(#[from] GeometryError),
    #[error("cloud volume construction failed: {0}")]
    Volume(#[from] VolumeError),
}

/// A tunable write outside its documented range. Built when a value gets
/// clamped and logged at debug level; never returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterOutOfRange {
    pub name: &'static str,
    pub value: f32,
    pub min: f32,
    pub max: f32,
}

impl fmt::Display for ParameterOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {} is outside [{}, {}]",
            self.name, self.value, self.min, self.max
        )
    }
}

impl std::error::Error for ParameterOutOfRange {}
