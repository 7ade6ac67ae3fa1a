//! Download executor backed by the external yt-dlp binary
//!
//! Two concerns live here:
//! - [`traits::EpisodeSource`]: the seam the pipeline depends on
//! - [`CliYtdlp`]: the real implementation spawning yt-dlp and parsing
//!   its line-oriented output protocol ([`parser`])

mod cli;
pub mod parser;
mod traits;

pub use cli::CliYtdlp;
pub use traits::{EpisodeSource, ProgressFn};
