use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Failed to download COG from {url} (HTTP {status})")]
    UpstreamFetchError { url: String, status: u16 },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid geometry: {message}")]
    GeometryError { message: String },

    #[error("GeoJSON error: {0}")]
    GeoJsonError(#[from] geojson::Error),

    #[error("Projection error: {message}")]
    ProjectionError { message: String },

    #[error("Cannot read raster {path}: {message}")]
    RasterIoError { path: String, message: String },

    #[error("TIFF decoding error: {0}")]
    TiffError(#[from] tiff::TiffError),

    #[error("Computation error: {message}")]
    ComputeError { message: String },

    #[error("Background task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing configuration value: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Upstream,
    Geometry,
    Raster,
    Compute,
    Validation,
    Configuration,
    Io,
}

impl StatsError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            StatsError::UpstreamFetchError { .. } | StatsError::HttpError(_) => {
                ErrorCategory::Upstream
            }
            StatsError::GeometryError { .. }
            | StatsError::GeoJsonError(_)
            | StatsError::ProjectionError { .. } => ErrorCategory::Geometry,
            StatsError::RasterIoError { .. } | StatsError::TiffError(_) => ErrorCategory::Raster,
            StatsError::ComputeError { .. }
            | StatsError::TaskError(_) => ErrorCategory::Compute,
            StatsError::ValidationError { .. } | StatsError::InvalidConfigValueError { .. } => {
                ErrorCategory::Validation
            }
            StatsError::ConfigError { .. }
            | StatsError::ConfigValidationError { .. }
            | StatsError::MissingConfigError { .. } => ErrorCategory::Configuration,
            StatsError::IoError(_) | StatsError::SerializationError(_) => ErrorCategory::Io,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Upstream => "Check that cog_url is reachable and returns the raster file",
            ErrorCategory::Geometry => {
                "Send a valid GeoJSON Feature with a Polygon geometry in the source CRS"
            }
            ErrorCategory::Raster => {
                "Make sure the source is a georeferenced GeoTIFF; retry with refresh=true if the cached copy is damaged"
            }
            ErrorCategory::Compute => "Check that the polygon overlaps the raster extent",
            ErrorCategory::Validation => "Fix the offending input value and retry",
            ErrorCategory::Configuration => "Review the configuration file and environment variables",
            ErrorCategory::Io => "Check permissions and free space of the static directory",
        }
    }

    pub(crate) fn raster_io(path: impl AsRef<std::path::Path>, message: impl Into<String>) -> Self {
        StatsError::RasterIoError {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn geometry(message: impl Into<String>) -> Self {
        StatsError::GeometryError {
            message: message.into(),
        }
    }

    pub(crate) fn compute(message: impl Into<String>) -> Self {
        StatsError::ComputeError {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StatsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_error_mentions_url() {
        let err = StatsError::UpstreamFetchError {
            url: "https://example.com/scene.tif".to_string(),
            status: 404,
        };

        assert_eq!(err.category(), ErrorCategory::Upstream);
        assert!(err.to_string().contains("https://example.com/scene.tif"));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_categories() {
        assert_eq!(StatsError::geometry("empty").category(), ErrorCategory::Geometry);
        assert_eq!(
            StatsError::raster_io("static/a.tif", "truncated").category(),
            ErrorCategory::Raster
        );
        assert_eq!(StatsError::compute("bad window").category(), ErrorCategory::Compute);
        assert_eq!(
            StatsError::MissingConfigError {
                field: "cache.static_dir".to_string()
            }
            .category(),
            ErrorCategory::Configuration
        );

        let io = StatsError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert_eq!(io.category(), ErrorCategory::Io);
    }

    #[test]
    fn test_raster_io_message_includes_path() {
        let err = StatsError::raster_io("static/scene.tif", "missing geotransform");
        assert_eq!(
            err.to_string(),
            "Cannot read raster static/scene.tif: missing geotransform"
        );
    }
}
