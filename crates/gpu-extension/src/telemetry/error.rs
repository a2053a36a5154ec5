use std::error::Error;
use std::fmt;

use thiserror::Error;

/// Boxed error reported by the underlying driver.
pub type DriverErrorSource = Box<dyn Error + Send + Sync + 'static>;

/// Per-device query that failed during sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceQuery {
    Identifier,
    MemoryInfo,
    Utilization,
}

impl fmt::Display for DeviceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceQuery::Identifier => "identifier",
            DeviceQuery::MemoryInfo => "memory info",
            DeviceQuery::Utilization => "utilization rate",
        };
        f.write_str(name)
    }
}

/// Failure of a sampling pass. No partial batch accompanies it.
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("unable to initialize device driver: {source}")]
    DriverInit { source: DriverErrorSource },

    #[error(
        "unable to enumerate devices{}: {source}",
        .index.map(|i| format!(" at index {i}")).unwrap_or_default()
    )]
    Enumeration {
        /// `None` when the device count itself could not be read
        index: Option<u32>,
        source: DriverErrorSource,
    },

    #[error("unable to query {query} of device at index {index}: {source}")]
    DeviceQuery {
        index: u32,
        query: DeviceQuery,
        source: DriverErrorSource,
    },

    #[error("unable to shut down device driver: {source}")]
    DriverShutdown { source: DriverErrorSource },
}

impl CollectionError {
    pub(crate) fn driver_init(source: impl Error + Send + Sync + 'static) -> Self {
        Self::DriverInit {
            source: Box::new(source),
        }
    }

    pub(crate) fn enumeration(index: Option<u32>, source: impl Error + Send + Sync + 'static) -> Self {
        Self::Enumeration {
            index,
            source: Box::new(source),
        }
    }

    pub(crate) fn device_query(
        index: u32,
        query: DeviceQuery,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        Self::DeviceQuery {
            index,
            query,
            source: Box::new(source),
        }
    }

    pub(crate) fn driver_shutdown(source: impl Error + Send + Sync + 'static) -> Self {
        Self::DriverShutdown {
            source: Box::new(source),
        }
    }

    /// Index of the device the pass failed on, if the failure was device specific.
    pub fn device_index(&self) -> Option<u32> {
        match self {
            Self::Enumeration { index, .. } => *index,
            Self::DeviceQuery { index, .. } => Some(*index),
            Self::DriverInit { .. } | Self::DriverShutdown { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use similar_asserts::assert_eq;

    use super::*;

    fn cause() -> io::Error {
        io::Error::other("GPU is lost")
    }

    #[test]
    fn collection_error_display_formatting() {
        assert_eq!(
            CollectionError::driver_init(cause()).to_string(),
            "unable to initialize device driver: GPU is lost"
        );
        assert_eq!(
            CollectionError::enumeration(None, cause()).to_string(),
            "unable to enumerate devices: GPU is lost"
        );
        assert_eq!(
            CollectionError::enumeration(Some(3), cause()).to_string(),
            "unable to enumerate devices at index 3: GPU is lost"
        );
        assert_eq!(
            CollectionError::device_query(1, DeviceQuery::MemoryInfo, cause()).to_string(),
            "unable to query memory info of device at index 1: GPU is lost"
        );
        assert_eq!(
            CollectionError::driver_shutdown(cause()).to_string(),
            "unable to shut down device driver: GPU is lost"
        );
    }

    #[test]
    fn device_index_follows_variant() {
        assert_eq!(CollectionError::driver_init(cause()).device_index(), None);
        assert_eq!(CollectionError::enumeration(None, cause()).device_index(), None);
        assert_eq!(CollectionError::enumeration(Some(2), cause()).device_index(), Some(2));
        assert_eq!(
            CollectionError::device_query(4, DeviceQuery::Utilization, cause()).device_index(),
            Some(4)
        );
    }

    #[test]
    fn source_is_preserved() {
        let err = CollectionError::device_query(0, DeviceQuery::Identifier, cause());
        let source = err.source().expect("source");
        assert_eq!(source.to_string(), "GPU is lost");
    }
}
