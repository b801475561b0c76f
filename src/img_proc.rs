//! ポーズ推定の前後で使う画像処理モジュール

use anyhow::{ensure, Context, Result};
use color_space::{Hsv, ToRgb};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

use crate::affine::{compute_affine, CropScale};
use crate::keypoint::{Keypoint, COCO_SKELETON};

/// 元画像のクロップ領域をネットワーク入力サイズに切り出します。
///
/// # Args
/// * `img` - 元画像
/// * `center` - クロップ領域の中心
/// * `scale` - クロップ領域の大きさ
/// * `rotation` - 回転角度 [deg]
/// * `output_size` - 出力の (幅, 高さ)
///
/// # Return
/// * 切り出した画像。領域外は黒で埋めます
pub fn crop_for_pose(
    img: &DynamicImage,
    center: [f32; 2],
    scale: impl Into<CropScale>,
    rotation: f32,
    output_size: (u32, u32),
) -> Result<RgbImage> {
    let (out_w, out_h) = output_size;
    ensure!(out_w > 0 && out_h > 0, "output size must be positive: {:?}", output_size);

    let trans = compute_affine(
        center,
        scale,
        rotation,
        [out_w as f32, out_h as f32],
        [0., 0.],
        false,
    )?;
    let projection =
        Projection::from_matrix(trans.to_projective()).context("crop transform is not invertible")?;

    let mut out = RgbImage::new(out_w, out_h);
    warp_into(
        &img.to_rgb8(),
        &projection,
        Interpolation::Bilinear,
        Rgb([0, 0, 0]),
        &mut out,
    );
    Ok(out)
}

/// 関節番号ごとの色 (色相環を等分)
pub fn joint_color(index: usize, num_joints: usize) -> Rgb<u8> {
    let hue = 360. * index as f64 / num_joints.max(1) as f64;
    let rgb = Hsv::new(hue, 1., 1.).to_rgb();
    Rgb([
        rgb.r.round().clamp(0., 255.) as u8,
        rgb.g.round().clamp(0., 255.) as u8,
        rgb.b.round().clamp(0., 255.) as u8,
    ])
}

/// 画像上に関節を描画します。
///
/// # Args
/// * `img` - 描画する画像 (in-place)
/// * `keypoints` - 元画像上の関節
/// * `threshold` - 描画する信頼度の閾値
/// * `radius` - 円の半径
pub fn draw_keypoints(img: &mut RgbImage, keypoints: &[Keypoint], threshold: f32, radius: i32) {
    for (i, kp) in keypoints.iter().enumerate() {
        if !kp.is_valid(threshold) {
            continue;
        }
        let color = joint_color(i, keypoints.len());
        let center = (kp.x.round() as i32, kp.y.round() as i32);
        draw_filled_circle_mut(img, center, radius, color);
    }
}

/// 画像上に COCO の骨格を描画します。両端の関節が有効な辺だけを描きます。
pub fn draw_skeleton(img: &mut RgbImage, keypoints: &[Keypoint], threshold: f32) {
    for (a, b) in COCO_SKELETON.iter() {
        let (ka, kb) = match (keypoints.get(*a as usize), keypoints.get(*b as usize)) {
            (Some(ka), Some(kb)) => (ka, kb),
            _ => continue,
        };
        if !ka.is_valid(threshold) || !kb.is_valid(threshold) {
            continue;
        }
        let color = joint_color(*a as usize, keypoints.len());
        draw_line_segment_mut(img, (ka.x, ka.y), (kb.x, kb.y), color);
    }
}
