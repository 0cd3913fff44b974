//! Reference data loading errors.

/// Errors that can occur while loading static stop or zip code data.
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    /// The data file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The stops CSV was malformed
    #[error("failed to parse stops CSV: {0}")]
    Csv(#[from] csv::Error),

    /// The zip code JSON was malformed
    #[error("failed to parse zip code JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The file parsed but contained no records
    #[error("{0} has no data rows")]
    Empty(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = LocationError::Empty("stops.txt".into());
        assert_eq!(err.to_string(), "stops.txt has no data rows");

        let err = LocationError::Io {
            path: "data/stops.txt".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(err.to_string(), "failed to read data/stops.txt: missing");
    }
}
