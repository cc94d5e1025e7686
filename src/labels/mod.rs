pub mod align;
pub mod coords;

pub use align::align_onsets;
pub use coords::{batch_coordinates, CoordinateBatch, CoordinateFill};
