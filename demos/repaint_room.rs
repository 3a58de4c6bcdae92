//! Repaint a room photo - walls in ochre, ceiling in white.
//!
//! Run with: `cargo run --example repaint_room -- <room.png>`
//!
//! Requires `GOOGLE_API_KEY` environment variable.

use saraia::{GeminiProvider, ImageRepaintClient, SourceImage};

#[tokio::main]
async fn main() -> saraia::Result<()> {
    let input_path = std::env::args()
        .nth(1)
        .expect("Usage: repaint_room <room.png>");

    let provider = GeminiProvider::builder().build()?;
    let client = ImageRepaintClient::new(provider)?;

    let photo = SourceImage::from_path(&input_path)?;
    let image = client
        .repaint(photo, [("wall", "#CC7722"), ("ceiling", "white")])
        .await?;

    image.save("repainted.png")?;
    println!("Repainted image saved to repainted.png");

    Ok(())
}
