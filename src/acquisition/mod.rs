//! Reference corpus acquisition from the Jamendo catalogue

pub mod batch;
pub mod jamendo;

pub use batch::{acquire_corpus, AcquisitionSummary, AcquisitionTarget};
pub use jamendo::{DownloadOutcome, JamendoClient, TrackDescriptor, TrackQuery};
