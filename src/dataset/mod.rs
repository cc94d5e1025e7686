pub mod artifacts;
pub mod assets;
pub mod layout;
pub mod pipeline;

pub use assets::FsSongAssets;
pub use layout::DatasetLayout;
pub use pipeline::RunSummary;
