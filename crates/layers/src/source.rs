use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::task::Poll;

use formats::{FeatureCollection, GeoJsonError};

#[derive(Debug)]
pub enum FetchError {
    /// The document could not be retrieved.
    Io(String),
    /// The document is not a usable FeatureCollection.
    Parse(GeoJsonError),
    /// The producing side went away without delivering a result.
    Disconnected,
    Aborted,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Io(msg) => write!(f, "fetch failed: {msg}"),
            FetchError::Parse(e) => write!(f, "invalid document: {e}"),
            FetchError::Disconnected => write!(f, "fetch dropped before completing"),
            FetchError::Aborted => write!(f, "fetch aborted"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GeoJsonError> for FetchError {
    fn from(e: GeoJsonError) -> Self {
        FetchError::Parse(e)
    }
}

/// In-flight retrieval of a feature collection.
///
/// Polled by the host between frames. After `abort` the fetch must never
/// yield a collection.
pub trait FeatureFetch {
    fn poll(&mut self) -> Poll<Result<FeatureCollection, FetchError>>;

    fn abort(&mut self);
}

/// Where a layer's features come from.
pub enum FeatureSource {
    Collection(Arc<FeatureCollection>),
    Fetch(Box<dyn FeatureFetch>),
}

impl FeatureSource {
    pub fn fetch(fetch: impl FeatureFetch + 'static) -> Self {
        FeatureSource::Fetch(Box::new(fetch))
    }
}

impl From<FeatureCollection> for FeatureSource {
    fn from(collection: FeatureCollection) -> Self {
        FeatureSource::Collection(Arc::new(collection))
    }
}

impl std::fmt::Debug for FeatureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureSource::Collection(c) => write!(f, "Collection({} features)", c.len()),
            FeatureSource::Fetch(_) => write!(f, "Fetch(..)"),
        }
    }
}

/// Completes a [`ChannelFetch`] from another thread.
#[derive(Debug, Clone)]
pub struct FetchSender {
    tx: Sender<Result<FeatureCollection, FetchError>>,
}

impl FetchSender {
    /// Returns `false` if the fetch was aborted or dropped meanwhile.
    pub fn complete(self, result: Result<FeatureCollection, FetchError>) -> bool {
        self.tx.send(result).is_ok()
    }
}

/// Fetch resolved through a channel, e.g. by a loader thread.
#[derive(Debug)]
pub struct ChannelFetch {
    rx: Option<Receiver<Result<FeatureCollection, FetchError>>>,
}

impl ChannelFetch {
    pub fn channel() -> (FetchSender, Self) {
        let (tx, rx) = mpsc::channel();
        (FetchSender { tx }, Self { rx: Some(rx) })
    }

    /// Fetch that reads and parses a GeoJSON file on a background thread.
    pub fn read_file(path: impl Into<std::path::PathBuf>) -> Self {
        let path = path.into();
        let (sender, fetch) = Self::channel();
        std::thread::spawn(move || {
            let result = std::fs::read_to_string(&path)
                .map_err(|e| FetchError::Io(format!("read {}: {e}", path.display())))
                .and_then(|s| FeatureCollection::from_geojson_str(&s).map_err(FetchError::from));
            sender.complete(result);
        });
        fetch
    }
}

impl FeatureFetch for ChannelFetch {
    fn poll(&mut self) -> Poll<Result<FeatureCollection, FetchError>> {
        let Some(rx) = &self.rx else {
            return Poll::Ready(Err(FetchError::Aborted));
        };
        match rx.try_recv() {
            Ok(result) => {
                self.rx = None;
                Poll::Ready(result)
            }
            Err(TryRecvError::Empty) => Poll::Pending,
            Err(TryRecvError::Disconnected) => {
                self.rx = None;
                Poll::Ready(Err(FetchError::Disconnected))
            }
        }
    }

    fn abort(&mut self) {
        self.rx = None;
    }
}
