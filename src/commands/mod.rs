// Command implementations split by subcommand.
pub mod decode;
pub mod fix;
pub mod replay;
pub mod select;
pub mod track;

pub use decode::run_decode;
pub use fix::run_fix;
pub use replay::run_replay;
pub use select::run_select;
pub use track::run_track;
