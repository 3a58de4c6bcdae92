//! Provider trait behind [`ImageRepaintClient`](crate::ImageRepaintClient).

use crate::error::Result;
use crate::repaint::types::{RepaintRequest, RepaintedImage};
use async_trait::async_trait;

/// A remote endpoint that can repaint an image.
///
/// Implementations perform exactly one outbound request per call and never
/// retry.
#[async_trait]
pub trait RepaintProvider: Send + Sync {
    /// Repaints the request's image according to its directives.
    async fn repaint(&self, request: &RepaintRequest) -> Result<RepaintedImage>;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str;

    /// Checks if the provider is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}
