#![warn(missing_docs)]
//! Saraia - repaint interior photos zone by zone with Gemini.
//!
//! Send a room photo and a list of zone→color directives, get the repainted
//! photo back. Calls go through a single background worker: one request in
//! flight at a time, strictly in submission order, each resolved exactly once.
//!
//! # Quick Start
//!
//! ```no_run
//! use saraia::{GeminiProvider, ImageRepaintClient, SourceImage};
//!
//! #[tokio::main]
//! async fn main() -> saraia::Result<()> {
//!     let provider = GeminiProvider::builder().build()?;
//!     let client = ImageRepaintClient::new(provider)?;
//!
//!     let photo = SourceImage::from_path("living-room.png")?;
//!     let painted = client
//!         .repaint(photo, [("wall", "#FFAA00"), ("ceiling", "white")])
//!         .await?;
//!     painted.save("living-room-painted.png")?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `cli`: the `saraia` command-line tool

mod error;
pub mod repaint;

// Re-export error types at crate root
pub use error::{RepaintError, Result};

pub use repaint::providers::{GeminiModel, GeminiProvider, GeminiProviderBuilder, PartSelection};
pub use repaint::{
    CancelHandle, ImageFormat, ImageRepaintClient, RepaintMetadata, RepaintProvider,
    RepaintRequest, RepaintResult, RepaintTicket, RepaintedImage, SourceImage, ZoneDirective,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{RepaintError, Result};
    pub use crate::repaint::providers::GeminiProvider;
    pub use crate::repaint::{
        ImageRepaintClient, RepaintProvider, RepaintResult, SourceImage, ZoneDirective,
    };
}
