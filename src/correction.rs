use image::{DynamicImage, GenericImageView};
use log::debug;

use crate::error::CorrectionError;
use crate::landmarks::{self, idx, Landmark};
use crate::pose::PoseAngles;

/// Empirical damping applied to the yaw-induced skew term. Tuned against
/// recorded sessions, not derived; see the improvement fractions below.
const YAW_SKEW_DAMPING: f32 = 0.3;

/// Fraction of each axis the 2D correction is assumed to visually recover.
/// The render cannot re-measure pose, so the post-correction estimate is a
/// heuristic partial improvement that keeps the original sign.
const ROLL_IMPROVEMENT: f32 = 0.8;
const PITCH_IMPROVEMENT: f32 = 0.6;
const YAW_IMPROVEMENT: f32 = 0.7;

/// 2x3 affine matrix derived from a pose, plus the anchor it preserves.
///
/// The transform maps source to destination as
/// `x' = scale_x*x + skew_y*y + translate_x`,
/// `y' = skew_x*x + scale_y*y + translate_y`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectionParams {
    pub scale_x: f32,
    pub skew_x: f32,
    pub skew_y: f32,
    pub scale_y: f32,
    pub translate_x: f32,
    pub translate_y: f32,
    /// Anchor point in pixel space; maps to itself under the transform.
    pub center_x: f32,
    pub center_y: f32,
    /// Pose the matrix was derived from.
    pub pose: PoseAngles,
}

/// Output of one correction pass. Pure value, no engine state.
#[derive(Debug, Clone)]
pub struct CorrectionResult {
    pub corrected_image: DynamicImage,
    pub params: CorrectionParams,
    pub original_pose: PoseAngles,
    pub estimated_corrected_pose: PoseAngles,
}

/// Decode an image and render it pose-corrected.
///
/// The anchor is the nose tip when `landmarks` carries one, the image
/// center otherwise. Fails only on undecodable bytes or a degenerate
/// transform; pose and landmark content never error.
pub fn correct_image(
    data: &[u8],
    pose: PoseAngles,
    landmarks: Option<&[Option<Landmark>]>,
) -> Result<CorrectionResult, CorrectionError> {
    let img = image::load_from_memory(data)?;
    correct_decoded(&img, pose, landmarks)
}

/// Same as [`correct_image`] for an already-decoded image.
pub fn correct_decoded(
    img: &DynamicImage,
    pose: PoseAngles,
    landmarks: Option<&[Option<Landmark>]>,
) -> Result<CorrectionResult, CorrectionError> {
    let (width, height) = img.dimensions();
    let params = correction_params(pose, landmarks, width, height);
    debug!(
        "correcting pose roll={:.1} pitch={:.1} yaw={:.1} around ({:.0},{:.0})",
        pose.roll, pose.pitch, pose.yaw, params.center_x, params.center_y
    );

    let corrected = render(img, &params)?;

    Ok(CorrectionResult {
        corrected_image: corrected,
        params,
        original_pose: pose,
        estimated_corrected_pose: estimate_corrected_pose(pose),
    })
}

/// Derive the affine matrix that counter-rotates the measured pose.
///
/// Angles are negated so the transform corrects opposite to the measured
/// tilt. Roll is an exact in-plane rotation; pitch and yaw are first-order
/// scale/skew approximations, not a true 3D unprojection.
pub fn correction_params(
    pose: PoseAngles,
    landmarks: Option<&[Option<Landmark>]>,
    width: u32,
    height: u32,
) -> CorrectionParams {
    let nose = landmarks.and_then(|l| landmarks::point(l, idx::NOSE_TIP));
    let (center_x, center_y) = match nose {
        Some(p) => (p.x * width as f32, p.y * height as f32),
        None => (width as f32 / 2.0, height as f32 / 2.0),
    };

    let roll_rad = -pose.roll.to_radians();
    let pitch_rad = -pose.pitch.to_radians();
    let yaw_rad = -pose.yaw.to_radians();

    let cos_roll = roll_rad.cos();
    let sin_roll = roll_rad.sin();
    // Pitch approximated as vertical scaling, yaw as horizontal scale + skew
    let pitch_scale = pitch_rad.cos();
    let yaw_scale = yaw_rad.cos();
    let yaw_skew = yaw_rad.sin() * YAW_SKEW_DAMPING;

    let scale_x = cos_roll * yaw_scale;
    let skew_x = -sin_roll;
    let skew_y = sin_roll * pitch_scale + yaw_skew;
    let scale_y = cos_roll * pitch_scale;

    // Solve translation so the anchor maps to itself
    let translate_x = center_x - (center_x * scale_x + center_y * skew_y);
    let translate_y = center_y - (center_x * skew_x + center_y * scale_y);

    CorrectionParams {
        scale_x,
        skew_x,
        skew_y,
        scale_y,
        translate_x,
        translate_y,
        center_x,
        center_y,
        pose,
    }
}

/// Heuristic post-correction pose: each axis shrinks by its improvement
/// fraction but keeps its sign. Never re-measured from the rendered image.
pub fn estimate_corrected_pose(pose: PoseAngles) -> PoseAngles {
    PoseAngles {
        roll: improved(pose.roll, ROLL_IMPROVEMENT),
        pitch: improved(pose.pitch, PITCH_IMPROVEMENT),
        yaw: improved(pose.yaw, YAW_IMPROVEMENT),
    }
}

fn improved(angle: f32, fraction: f32) -> f32 {
    let improvement = (angle.abs() * fraction).min(angle.abs());
    if angle > 0.0 {
        angle - improvement
    } else {
        angle + improvement
    }
}

/// Apply the affine matrix by inverse mapping with bilinear resampling.
/// Pixels with no source fall outside the mesh and stay black.
fn render(img: &DynamicImage, params: &CorrectionParams) -> Result<DynamicImage, CorrectionError> {
    let a = params.scale_x;
    let b = params.skew_x;
    let c = params.skew_y;
    let d = params.scale_y;
    let tx = params.translate_x;
    let ty = params.translate_y;

    let det = a * d - c * b;
    if det.abs() < f32::EPSILON {
        return Err(CorrectionError::Render { det });
    }

    let (img_w, img_h) = img.dimensions();
    let mut output = image::RgbImage::new(img_w, img_h);

    for out_y in 0..img_h {
        for out_x in 0..img_w {
            // Invert the transform to find the source coordinate
            let tmp_x = out_x as f32 - tx;
            let tmp_y = out_y as f32 - ty;
            let in_x = (d * tmp_x - c * tmp_y) / det;
            let in_y = (-b * tmp_x + a * tmp_y) / det;

            if in_x >= 0.0 && in_x < img_w as f32 && in_y >= 0.0 && in_y < img_h as f32 {
                let x0 = in_x.floor() as u32;
                let y0 = in_y.floor() as u32;
                let x1 = (x0 + 1).min(img_w - 1);
                let y1 = (y0 + 1).min(img_h - 1);

                let fx = in_x - x0 as f32;
                let fy = in_y - y0 as f32;

                let p00 = img.get_pixel(x0, y0);
                let p10 = img.get_pixel(x1, y0);
                let p01 = img.get_pixel(x0, y1);
                let p11 = img.get_pixel(x1, y1);

                let w00 = (1.0 - fx) * (1.0 - fy);
                let w10 = fx * (1.0 - fy);
                let w01 = (1.0 - fx) * fy;
                let w11 = fx * fy;

                let r = (p00[0] as f32 * w00 + p10[0] as f32 * w10
                    + p01[0] as f32 * w01 + p11[0] as f32 * w11) as u8;
                let g = (p00[1] as f32 * w00 + p10[1] as f32 * w10
                    + p01[1] as f32 * w01 + p11[1] as f32 * w11) as u8;
                let b_val = (p00[2] as f32 * w00 + p10[2] as f32 * w10
                    + p01[2] as f32 * w01 + p11[2] as f32 * w11) as u8;

                output.put_pixel(out_x, out_y, image::Rgb([r, g, b_val]));
            }
        }
    }

    Ok(DynamicImage::ImageRgb8(output))
}
