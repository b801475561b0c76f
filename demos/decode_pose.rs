use anyhow::{Context, Result};
use std::time::Instant;

use image::{DynamicImage, Rgb, RgbImage};
use ndarray::{array, Array4};

use simple_pose_postprocess::img_proc::{crop_for_pose, draw_keypoints, draw_skeleton};
use simple_pose_postprocess::{CocoJoint, HeatmapDecoder};

const HEATMAP_W: usize = 48;
const HEATMAP_H: usize = 64;

/// ヒートマップ上の関節位置 (x, y)。ネットワークの代わりに使う
const JOINTS: [(f32, f32); CocoJoint::COUNT] = [
    (24., 8.),
    (26., 6.),
    (22., 6.),
    (28., 7.),
    (20., 7.),
    (31., 15.),
    (17., 15.),
    (34., 24.),
    (14., 24.),
    (35., 32.),
    (13., 32.),
    (28., 34.),
    (20., 34.),
    (29., 46.),
    (19., 46.),
    (29., 58.),
    (19., 58.),
];

/// ガウス分布のヒートマップを作成します。
fn fake_heatmaps(sigma: f32) -> Array4<f32> {
    let mut hm = Array4::<f32>::zeros((1, CocoJoint::COUNT, HEATMAP_H, HEATMAP_W));
    for (p, &(jx, jy)) in JOINTS.iter().enumerate() {
        for y in 0..HEATMAP_H {
            for x in 0..HEATMAP_W {
                let d2 = (x as f32 - jx).powi(2) + (y as f32 - jy).powi(2);
                hm[[0, p, y, x]] = (-d2 / (2. * sigma * sigma)).exp();
            }
        }
    }
    hm
}

fn main() -> Result<()> {
    // 引数で画像を指定しない場合は灰色の画像を使う
    let img = match std::env::args().nth(1) {
        Some(path) => image::open(&path).with_context(|| format!("failed to open {}", path))?,
        None => DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 480, Rgb([64, 64, 64]))),
    };

    let center = [img.width() as f32 / 2., img.height() as f32 / 2.];
    let scale = [img.height() as f32 * 0.75, img.height() as f32];

    // ネットワーク入力 (192x256) の切り出し
    let input = crop_for_pose(&img, center, scale, 0., (192, 256))?;

    let start = Instant::now();

    let heatmaps = fake_heatmaps(2.);
    let centers = array![[center[0], center[1]]];
    let scales = array![[scale[0], scale[1]]];
    let preds = HeatmapDecoder::default().decode(heatmaps.view(), centers.view(), scales.view())?;

    let end = start.elapsed();
    let t = end.as_secs_f64() * 1000.0;
    println!("Processing time:{:.03}ms", t);

    let keypoints = preds.keypoints(0).context("empty batch")?;
    for (i, kp) in keypoints.iter().enumerate() {
        println!("{:?}: ({:.1}, {:.1}) {:.2}", CocoJoint::from_index(i), kp.x, kp.y, kp.confidence);
    }

    let mut rgb_img = img.to_rgb8();
    draw_skeleton(&mut rgb_img, &keypoints, 0.2);
    draw_keypoints(&mut rgb_img, &keypoints, 0.2, 4);

    // 画像を保存
    std::fs::create_dir_all("./out")?;
    input.save("./out/input.png")?;
    rgb_img.save("./out/out.png")?;

    Ok(())
}
