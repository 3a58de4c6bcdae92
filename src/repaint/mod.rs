//! Zone-by-zone repainting of room photos.

mod client;
pub mod prompt;
mod provider;
pub mod providers;
mod types;

pub use client::{CancelHandle, ImageRepaintClient, RepaintTicket};
pub use provider::RepaintProvider;
pub use types::{
    ImageFormat, RepaintMetadata, RepaintRequest, RepaintResult, RepaintedImage, SourceImage,
    ZoneDirective,
};
