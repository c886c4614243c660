//! Data models shared across pipeline stages

pub mod audio_buffer;
pub mod feature_table;
pub mod metadata;

pub use audio_buffer::AudioBuffer;
pub use feature_table::{FeatureRow, FeatureTable, ID_COLUMNS};
pub use metadata::{Gender, MetadataRow};
