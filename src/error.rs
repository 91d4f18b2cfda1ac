use thiserror::Error;

/// Errors from solving or inverting affine transforms
#[derive(Debug, Clone, Error)]
pub enum GeometryError {
    /// The three source points do not determine a unique transform
    #[error("Control points are collinear: source determinant {determinant:e} is below the degeneracy threshold")]
    CollinearPoints { determinant: f64 },

    /// The linear part of the matrix cannot be inverted
    #[error("Control points are collinear or degenerate: matrix determinant {determinant:e} is below the degeneracy threshold")]
    SingularMatrix { determinant: f64 },

    /// Matrix components are missing or not finite
    #[error("Invalid affine matrix: {reason}")]
    InvalidMatrix { reason: String },
}

/// Errors raised by the on-disk tile cache
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Filesystem read or write failure
    #[error("Cache I/O error at {path}: {message}")]
    Io { path: String, message: String },

    /// Metadata file exists but cannot be parsed
    #[error("Corrupt tile metadata at {path}: {message}")]
    CorruptMetadata { path: String, message: String },

    /// Hash is not usable as a directory name
    #[error("Invalid image hash {hash:?}: expected ASCII letters, digits, '-' or '_'")]
    InvalidHash { hash: String },
}

impl CacheError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        CacheError::Io {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Errors reported by a raster codec backend
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// Source bytes could not be decoded
    #[error("decode failed: {0}")]
    Decode(String),

    /// Affine resampling failed
    #[error("resample failed: {0}")]
    Resample(String),

    /// Raster could not be encoded
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Errors that abort a pyramid generation run.
///
/// Display strings name the failing stage and are meant to be shown to the
/// user verbatim.
#[derive(Debug, Clone, Error)]
pub enum PyramidError {
    /// Matrix derived from the control points is unusable
    #[error("Registration error: {0}")]
    Registration(#[from] GeometryError),

    /// Source image unreadable or corrupt
    #[error("Failed to decode source image {path}: {message}")]
    Decode { path: String, message: String },

    /// Resample backend failure
    #[error("Failed to apply affine transform: {message}")]
    Transform { message: String },

    /// Tile or preview encode failure
    #[error("Failed to encode {artifact}: {message}")]
    Encode { artifact: String, message: String },

    /// Cache read or write failure
    #[error("Tile cache error: {0}")]
    Cache(#[from] CacheError),

    /// Caller-supplied arguments rejected before any work started
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The blocking worker running the pipeline died
    #[error("Generation worker failed: {message}")]
    Worker { message: String },
}
