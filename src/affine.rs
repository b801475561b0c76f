//! クロップ領域 (中心・スケール・回転) とネットワーク出力の間のアフィン変換を扱うモジュール

use nalgebra::{Matrix2x3, Matrix3, Matrix3x2, Vector3};

use crate::error::{DecodeError, Result};

/// クロップ領域のスケール (幅, 高さ)
///
/// スカラーで与えた場合は両軸に同じ値が入ります。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropScale {
    pub w: f32,
    pub h: f32,
}

impl From<f32> for CropScale {
    fn from(s: f32) -> Self {
        Self { w: s, h: s }
    }
}

impl From<[f32; 2]> for CropScale {
    fn from(s: [f32; 2]) -> Self {
        Self { w: s[0], h: s[1] }
    }
}

/// 2x3 のアフィン変換行列
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    m: Matrix2x3<f64>,
}

impl AffineTransform {
    /// 3組の対応点から、`src` を `dst` に写すアフィン変換を求めます。
    ///
    /// # Args
    /// * `src` - 変換元の3点
    /// * `dst` - 変換先の3点
    ///
    /// # Return
    /// * アフィン変換。3点が同一直線上にある場合は `InvalidTransform`
    pub fn from_points(src: &[[f64; 2]; 3], dst: &[[f64; 2]; 3]) -> Result<Self> {
        // 逆変換も取れるように、変換先の3点も縮退していないことを要求する
        for pts in [src, dst] {
            let area2 = (pts[1][0] - pts[0][0]) * (pts[2][1] - pts[0][1])
                - (pts[2][0] - pts[0][0]) * (pts[1][1] - pts[0][1]);
            if !area2.is_finite() || area2.abs() <= f64::EPSILON {
                return Err(DecodeError::InvalidTransform(format!(
                    "reference points are degenerate: {:?}",
                    pts
                )));
            }
        }

        // [x y 1] * M^T = [x' y'] を3点分並べて解く
        let a = Matrix3::from_fn(|r, c| if c < 2 { src[r][c] } else { 1. });
        let b = Matrix3x2::from_fn(|r, c| dst[r][c]);

        let mt = a.lu().solve(&b).ok_or_else(|| {
            DecodeError::InvalidTransform(format!("singular system for points {:?}", src))
        })?;
        if mt.iter().any(|v| !v.is_finite()) {
            return Err(DecodeError::InvalidTransform(format!(
                "non-finite solution for points {:?}",
                src
            )));
        }

        Ok(Self { m: mt.transpose() })
    }

    /// 点 (x, y) に変換を適用します。
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let p = self.m * Vector3::new(f64::from(x), f64::from(y), 1.);
        (p[0] as f32, p[1] as f32)
    }

    /// 逆変換を求めます。
    pub fn inverse(&self) -> Result<Self> {
        let inv = self.to_homogeneous().try_inverse().ok_or_else(|| {
            DecodeError::InvalidTransform("transform is not invertible".to_string())
        })?;
        Ok(Self {
            m: inv.fixed_view::<2, 3>(0, 0).into_owned(),
        })
    }

    /// 3x3 の同次座標行列に変換します。
    pub fn to_homogeneous(&self) -> Matrix3<f64> {
        let mut h = Matrix3::identity();
        h.fixed_view_mut::<2, 3>(0, 0).copy_from(&self.m);
        h
    }

    /// 行優先の 3x3 射影行列 (imageproc の `Projection` 用)
    pub fn to_projective(&self) -> [f32; 9] {
        let h = self.to_homogeneous();
        let mut out = [0f32; 9];
        for r in 0..3 {
            for c in 0..3 {
                out[r * 3 + c] = h[(r, c)] as f32;
            }
        }
        out
    }

    /// (行, 列) の要素
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.m[(row, col)]
    }
}

/// ベクトルを `rot_rad` ラジアン回転させます。
fn rotate(p: [f64; 2], rot_rad: f64) -> [f64; 2] {
    let (sn, cs) = rot_rad.sin_cos();
    [p[0] * cs - p[1] * sn, p[0] * sn + p[1] * cs]
}

/// `b` を直角の頂点として `a`, `b` と直角三角形を作る3点目
fn third_point(a: [f64; 2], b: [f64; 2]) -> [f64; 2] {
    let d = [a[0] - b[0], a[1] - b[1]];
    [b[0] - d[1], b[1] + d[0]]
}

/// クロップ領域から出力画像へのアフィン変換を計算します。
///
/// # Args
/// * `center` - 元画像におけるクロップ領域の中心
/// * `scale` - クロップ領域の大きさ (幅, 高さ)
/// * `rotation` - 回転角度 [deg]
/// * `output_size` - 出力の (幅, 高さ)
/// * `shift` - スケールに対する中心のずらし量
/// * `inverse` - trueの場合、出力から元画像への変換を返します
///
/// # Return
/// * アフィン変換
///
/// 基準方向には幅 (`scale.w`) だけを使います。高さは出力のアスペクト比で決まります。
pub fn compute_affine(
    center: [f32; 2],
    scale: impl Into<CropScale>,
    rotation: f32,
    output_size: [f32; 2],
    shift: [f32; 2],
    inverse: bool,
) -> Result<AffineTransform> {
    let scale = scale.into();
    let (sw, sh) = (f64::from(scale.w), f64::from(scale.h));
    let (cx, cy) = (f64::from(center[0]), f64::from(center[1]));
    let (dst_w, dst_h) = (f64::from(output_size[0]), f64::from(output_size[1]));

    let rot_rad = f64::from(rotation).to_radians();
    let src_dir = rotate([0., sw * -0.5], rot_rad);

    let src0 = [cx + sw * f64::from(shift[0]), cy + sh * f64::from(shift[1])];
    let src1 = [src0[0] + src_dir[0], src0[1] + src_dir[1]];
    let dst0 = [dst_w * 0.5, dst_h * 0.5];
    let dst1 = [dst0[0], dst0[1] - dst_w * 0.5];

    let src = [src0, src1, third_point(src0, src1)];
    let dst = [dst0, dst1, third_point(dst0, dst1)];

    if inverse {
        AffineTransform::from_points(&dst, &src)
    } else {
        AffineTransform::from_points(&src, &dst)
    }
}
