//! ヒートマップ上の座標を元画像の座標系に戻すモジュール

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, ArrayView4};

use crate::affine::compute_affine;
use crate::decoder::HeatmapDecoder;
use crate::error::{DecodeError, Result};
use crate::keypoint::Predictions;

/// (N, 2) の中心・スケール配列をチェックします。
pub(crate) fn check_crop_params(
    batch_size: usize,
    centers: &ArrayView2<f32>,
    scales: &ArrayView2<f32>,
) -> Result<()> {
    if centers.dim() != (batch_size, 2) || scales.dim() != (batch_size, 2) {
        return Err(DecodeError::InvalidInputShape(format!(
            "centers and scales must be ({}, 2), got {:?} and {:?}",
            batch_size,
            centers.dim(),
            scales.dim()
        )));
    }
    Ok(())
}

/// 1枚分の関節座標をヒートマップ座標から元画像の座標に変換します。
///
/// # Args
/// * `coords` - ヒートマップ上の座標 (J, 2)
/// * `center` - クロップ領域の中心
/// * `scale` - クロップ領域の大きさ
/// * `output_size` - ヒートマップの (幅, 高さ)
///
/// # Return
/// * 元画像上の座標 (J, 2)
pub fn transform_preds(
    coords: ArrayView2<f32>,
    center: [f32; 2],
    scale: [f32; 2],
    output_size: [f32; 2],
) -> Result<Array2<f32>> {
    let trans = compute_affine(center, scale, 0., output_size, [0., 0.], true)?;
    let mut target = Array2::<f32>::zeros(coords.raw_dim());
    for (src, mut dst) in coords.outer_iter().zip(target.outer_iter_mut()) {
        let (x, y) = trans.apply(src[0], src[1]);
        dst[0] = x;
        dst[1] = y;
    }
    Ok(target)
}

/// バッチ全体の座標を元画像の座標系に戻します。
///
/// # Args
/// * `coords` - ヒートマップ上の座標 (N, J, 2)
/// * `centers` - クロップ領域の中心 (N, 2)
/// * `scales` - クロップ領域の大きさ (N, 2)
/// * `heatmap_size` - ヒートマップの (幅, 高さ)
///
/// # Return
/// * 元画像上の座標 (N, J, 2)。変換できない画像が1枚でもあればエラー
pub fn to_image_space(
    coords: ArrayView3<f32>,
    centers: ArrayView2<f32>,
    scales: ArrayView2<f32>,
    heatmap_size: [f32; 2],
) -> Result<Array3<f32>> {
    let (n, _, c) = coords.dim();
    if c != 2 {
        return Err(DecodeError::InvalidInputShape(format!(
            "coords must be (N, J, 2), got {:?}",
            coords.dim()
        )));
    }
    check_crop_params(n, &centers, &scales)?;

    let mut preds = Array3::<f32>::zeros(coords.raw_dim());
    for i in 0..n {
        let t = transform_preds(
            coords.index_axis(ndarray::Axis(0), i),
            [centers[[i, 0]], centers[[i, 1]]],
            [scales[[i, 0]], scales[[i, 1]]],
            heatmap_size,
        )
        .map_err(|e| DecodeError::InvalidTransform(format!("image {}: {}", i, e)))?;
        preds.index_axis_mut(ndarray::Axis(0), i).assign(&t);
    }
    Ok(preds)
}

/// 既定の設定でヒートマップをデコードします。
///
/// # Args
/// * `heatmaps` - (N, J, H, W) のヒートマップ
/// * `centers` - クロップ領域の中心 (N, 2)
/// * `scales` - クロップ領域の大きさ (N, 2)
///
/// # Return
/// * 元画像上の関節座標と信頼度
pub fn decode(
    heatmaps: ArrayView4<f32>,
    centers: ArrayView2<f32>,
    scales: ArrayView2<f32>,
) -> Result<Predictions> {
    HeatmapDecoder::default().decode(heatmaps, centers, scales)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_transform_preds_center_maps_to_crop_center() {
        let coords = array![[24f32, 32.], [0., 0.]];
        let out = transform_preds(coords.view(), [48., 64.], [192., 256.], [48., 64.]).unwrap();
        assert!((out[[0, 0]] - 48.).abs() < 1e-3);
        assert!((out[[0, 1]] - 64.).abs() < 1e-3);
        // (0, 0) は中心から (-24, -32) px × 4 倍
        assert!((out[[1, 0]] - (48. - 96.)).abs() < 1e-3);
        assert!((out[[1, 1]] - (64. - 128.)).abs() < 1e-3);
    }

    #[test]
    fn test_to_image_space_rejects_mismatched_batch() {
        let coords = Array3::<f32>::zeros((2, 17, 2));
        let centers = Array2::<f32>::zeros((1, 2));
        let scales = Array2::<f32>::ones((2, 2));
        let r = to_image_space(coords.view(), centers.view(), scales.view(), [48., 64.]);
        assert!(matches!(r, Err(DecodeError::InvalidInputShape(_))));
    }

    #[test]
    fn test_to_image_space_reports_zero_scale() {
        let coords = Array3::<f32>::zeros((2, 1, 2));
        let centers = Array2::<f32>::zeros((2, 2));
        let scales = array![[192f32, 256.], [0., 0.]];
        let r = to_image_space(coords.view(), centers.view(), scales.view(), [48., 64.]);
        match r {
            Err(DecodeError::InvalidTransform(msg)) => assert!(msg.starts_with("image 1")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
