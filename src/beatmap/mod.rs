pub mod parse;
pub mod record;

pub use parse::parse_beatmap;
pub use record::BeatmapRecord;
