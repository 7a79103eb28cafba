use thiserror::Error;

/// Failures surfaced by the affine correction path. Landmark and pose
/// content never error; only the image itself can fail.
#[derive(Debug, Error)]
pub enum CorrectionError {
    /// The source bytes could not be decoded into an image.
    #[error("failed to decode source image: {0}")]
    Decode(#[from] image::ImageError),

    /// The derived transform cannot be inverted for rendering.
    #[error("correction transform is degenerate (determinant {det})")]
    Render { det: f32 },
}
