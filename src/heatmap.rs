//! ポーズ推定ネットワークが出力するヒートマップから関節位置を取り出すモジュール

use ndarray::{Array3, ArrayView3, ArrayView4, ArrayViewD, Ix4};

use crate::error::{DecodeError, Result};

/// サブピクセル補正の既定の移動量 [px]
pub const SUBPIXEL_SHIFT: f32 = 0.25;

/// 任意次元の配列を (N, J, H, W) のヒートマップとして解釈します。
///
/// # Args
/// * `heatmaps` - ネットワークの出力
///
/// # Return
/// * 4次元のビュー。次元数が4でない場合や空間サイズが0の場合は `InvalidInputShape`
pub fn as_heatmap_batch<'a>(heatmaps: ArrayViewD<'a, f32>) -> Result<ArrayView4<'a, f32>> {
    let shape = heatmaps.shape().to_vec();
    let hm = heatmaps.into_dimensionality::<Ix4>().map_err(|_| {
        DecodeError::InvalidInputShape(format!(
            "heatmaps must be 4D (N, J, H, W), got shape {:?}",
            shape
        ))
    })?;
    let (_, _, h, w) = hm.dim();
    if h == 0 || w == 0 {
        return Err(DecodeError::InvalidInputShape(format!(
            "heatmaps must have non-empty spatial dimensions, got shape {:?}",
            shape
        )));
    }
    Ok(hm)
}

/// 各関節のヒートマップの最大値の位置と値を求めます。
///
/// # Args
/// * `heatmaps` - (N, J, H, W) のヒートマップ
///
/// # Return
/// * (座標 (N, J, 2), 信頼度 (N, J, 1))
///
/// 同じ値が複数ある場合は行優先で最初の位置を採用します。
/// 最大値が0以下の関節は座標を (0, 0) にします。
pub fn locate_peaks(heatmaps: ArrayView4<f32>) -> Result<(Array3<f32>, Array3<f32>)> {
    let (n, j, h, w) = heatmaps.dim();
    if h == 0 || w == 0 {
        return Err(DecodeError::InvalidInputShape(format!(
            "heatmaps must have non-empty spatial dimensions, got {:?}",
            heatmaps.dim()
        )));
    }

    let mut coords = Array3::<f32>::zeros((n, j, 2));
    let mut maxvals = Array3::<f32>::zeros((n, j, 1));

    for b in 0..n {
        for p in 0..j {
            let hm = heatmaps.slice(ndarray::s![b, p, .., ..]);

            let mut idx = 0;
            let mut maxval = f32::NEG_INFINITY;
            for (i, &v) in hm.iter().enumerate() {
                if v > maxval {
                    maxval = v;
                    idx = i;
                }
            }

            maxvals[[b, p, 0]] = maxval;
            if maxval > 0. {
                coords[[b, p, 0]] = (idx % w) as f32;
                coords[[b, p, 1]] = (idx / w) as f32;
            }
        }
    }
    Ok((coords, maxvals))
}

/// 差分の符号 (0 の場合は 0)
fn sign(v: f32) -> f32 {
    if v > 0. {
        1.
    } else if v < 0. {
        -1.
    } else {
        0.
    }
}

/// 隣接画素の勾配の符号を使って、座標を真のピーク方向へ `shift` だけずらします。
///
/// # Args
/// * `coords` - `locate_peaks` の座標 (N, J, 2)
/// * `heatmaps` - (N, J, H, W) のヒートマップ
/// * `shift` - 移動量 (通常は `SUBPIXEL_SHIFT`)
///
/// # Return
/// * 補正後の座標
///
/// 丸めた位置がヒートマップの内側 (1 < px < W-1, 1 < py < H-1) にない関節はそのままです。
pub fn refine_subpixel(
    coords: ArrayView3<f32>,
    heatmaps: ArrayView4<f32>,
    shift: f32,
) -> Result<Array3<f32>> {
    let (n, j, h, w) = heatmaps.dim();
    if coords.dim() != (n, j, 2) {
        return Err(DecodeError::InvalidInputShape(format!(
            "coords must be ({}, {}, 2), got {:?}",
            n,
            j,
            coords.dim()
        )));
    }

    let mut refined = coords.to_owned();
    for b in 0..n {
        for p in 0..j {
            let px = (coords[[b, p, 0]] + 0.5).floor();
            let py = (coords[[b, p, 1]] + 0.5).floor();
            if !(1. < px && px < (w as f32 - 1.) && 1. < py && py < (h as f32 - 1.)) {
                continue;
            }
            let (px, py) = (px as usize, py as usize);

            let hm = heatmaps.slice(ndarray::s![b, p, .., ..]);
            let dx = hm[[py, px + 1]] - hm[[py, px - 1]];
            let dy = hm[[py + 1, px]] - hm[[py - 1, px]];

            refined[[b, p, 0]] += sign(dx) * shift;
            refined[[b, p, 1]] += sign(dy) * shift;
        }
    }
    Ok(refined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array4, ArrayD, IxDyn};

    fn one_hot(h: usize, w: usize, row: usize, col: usize, value: f32) -> Array4<f32> {
        let mut hm = Array4::<f32>::zeros((1, 1, h, w));
        hm[[0, 0, row, col]] = value;
        hm
    }

    #[test]
    fn test_all_zero_heatmaps_are_masked() {
        let hm = Array4::<f32>::zeros((2, 3, 8, 6));
        let (coords, maxvals) = locate_peaks(hm.view()).unwrap();
        assert_eq!(coords.dim(), (2, 3, 2));
        assert_eq!(maxvals.dim(), (2, 3, 1));
        assert!(coords.iter().all(|&v| v == 0.));
        assert!(maxvals.iter().all(|&v| v == 0.));
    }

    #[test]
    fn test_one_hot_peak() {
        let hm = one_hot(64, 48, 5, 7, 0.8);
        let (coords, maxvals) = locate_peaks(hm.view()).unwrap();
        assert_eq!(coords[[0, 0, 0]], 7.);
        assert_eq!(coords[[0, 0, 1]], 5.);
        assert_eq!(maxvals[[0, 0, 0]], 0.8);
    }

    #[test]
    fn test_tie_takes_first_in_row_major_order() {
        let mut hm = Array4::<f32>::zeros((1, 1, 4, 4));
        hm[[0, 0, 2, 1]] = 1.;
        hm[[0, 0, 1, 3]] = 1.;
        let (coords, _) = locate_peaks(hm.view()).unwrap();
        assert_eq!(coords[[0, 0, 0]], 3.);
        assert_eq!(coords[[0, 0, 1]], 1.);
    }

    #[test]
    fn test_negative_max_is_masked() {
        let mut hm = Array4::<f32>::from_elem((1, 1, 4, 4), -1.);
        hm[[0, 0, 2, 2]] = -0.5;
        let (coords, maxvals) = locate_peaks(hm.view()).unwrap();
        assert_eq!(maxvals[[0, 0, 0]], -0.5);
        assert_eq!(coords[[0, 0, 0]], 0.);
        assert_eq!(coords[[0, 0, 1]], 0.);
    }

    #[test]
    fn test_rejects_non_4d() {
        let hm = ArrayD::<f32>::zeros(IxDyn(&[1, 64, 48]));
        let r = as_heatmap_batch(hm.view());
        assert!(matches!(r, Err(DecodeError::InvalidInputShape(_))));

        let hm = ArrayD::<f32>::zeros(IxDyn(&[1, 17, 64, 48]));
        assert_eq!(as_heatmap_batch(hm.view()).unwrap().dim(), (1, 17, 64, 48));
    }

    #[test]
    fn test_rejects_empty_spatial() {
        let hm = Array4::<f32>::zeros((1, 1, 0, 48));
        assert!(locate_peaks(hm.view()).is_err());
    }

    #[test]
    fn test_symmetric_peak_is_not_shifted() {
        let mut hm = one_hot(16, 16, 8, 8, 1.);
        hm[[0, 0, 8, 7]] = 0.5;
        hm[[0, 0, 8, 9]] = 0.5;
        hm[[0, 0, 7, 8]] = 0.3;
        hm[[0, 0, 9, 8]] = 0.3;
        let (coords, _) = locate_peaks(hm.view()).unwrap();
        let refined = refine_subpixel(coords.view(), hm.view(), SUBPIXEL_SHIFT).unwrap();
        assert_eq!(refined, coords);
    }

    #[test]
    fn test_shift_towards_larger_neighbour() {
        let mut hm = one_hot(16, 16, 8, 8, 1.);
        hm[[0, 0, 8, 9]] = 0.6; // 右
        hm[[0, 0, 7, 8]] = 0.4; // 上
        let (coords, _) = locate_peaks(hm.view()).unwrap();
        let refined = refine_subpixel(coords.view(), hm.view(), SUBPIXEL_SHIFT).unwrap();
        assert_eq!(refined[[0, 0, 0]], 8.25);
        assert_eq!(refined[[0, 0, 1]], 7.75);
        // 入力はそのまま
        assert_eq!(coords[[0, 0, 0]], 8.);
    }

    #[test]
    fn test_border_joints_are_not_refined() {
        let (h, w) = (64, 48);
        for &(row, col) in &[(10, 0), (10, w - 1), (0, 10), (h - 1, 10), (10, 1), (1, 10)] {
            let mut hm = one_hot(h, w, row, col, 1.);
            // 非対称な隣接値を置いても補正されない
            if col + 1 < w {
                hm[[0, 0, row, col + 1]] = 0.5;
            }
            if row + 1 < h {
                hm[[0, 0, row + 1, col]] = 0.5;
            }
            let (coords, _) = locate_peaks(hm.view()).unwrap();
            let refined = refine_subpixel(coords.view(), hm.view(), SUBPIXEL_SHIFT).unwrap();
            assert_eq!(refined, coords, "row={} col={}", row, col);
        }
    }

    #[test]
    fn test_refine_rejects_mismatched_coords() {
        let hm = Array4::<f32>::zeros((1, 2, 8, 8));
        let coords = Array3::<f32>::zeros((1, 3, 2));
        assert!(refine_subpixel(coords.view(), hm.view(), SUBPIXEL_SHIFT).is_err());
    }
}
