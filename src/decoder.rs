//! ヒートマップのデコード処理全体をまとめる構造体

use log::{debug, warn};
use ndarray::{Array3, ArrayView2, ArrayView4, ArrayViewD, Axis};

use crate::error::Result;
use crate::heatmap::{self, SUBPIXEL_SHIFT};
use crate::keypoint::Predictions;
use crate::postprocess::{check_crop_params, transform_preds};

/// アフィン変換が求まらない画像があった場合の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformErrorPolicy {
    /// バッチ全体をエラーにする
    #[default]
    Abort,
    /// その画像の座標を NaN、信頼度を 0 にして残りを続ける
    MarkInvalid,
}

/// デコードの設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecoderConfig {
    /// サブピクセル補正の移動量 [px]
    pub subpixel_shift: f32,
    /// サブピクセル補正を行うか
    pub refine: bool,
    pub on_transform_error: TransformErrorPolicy,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            subpixel_shift: SUBPIXEL_SHIFT,
            refine: true,
            on_transform_error: TransformErrorPolicy::Abort,
        }
    }
}

/// ヒートマップから元画像上の関節位置を求める構造体
#[derive(Debug, Clone, Default)]
pub struct HeatmapDecoder {
    config: DecoderConfig,
}

impl HeatmapDecoder {
    /// 新しい `HeatmapDecoder` インスタンスを作成します。
    ///
    /// # Args
    /// * `config` - デコードの設定
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// ヒートマップをデコードします。
    ///
    /// # Args
    /// * `heatmaps` - (N, J, H, W) のヒートマップ
    /// * `centers` - クロップ領域の中心 (N, 2)
    /// * `scales` - クロップ領域の大きさ (N, 2)
    ///
    /// # Return
    /// * 元画像上の関節座標 (N, J, 2) と信頼度 (N, J, 1)
    pub fn decode(
        &self,
        heatmaps: ArrayView4<f32>,
        centers: ArrayView2<f32>,
        scales: ArrayView2<f32>,
    ) -> Result<Predictions> {
        let (n, j, h, w) = heatmaps.dim();
        check_crop_params(n, &centers, &scales)?;
        debug!("decode heatmaps: batch={}, joints={}, size={}x{}", n, j, w, h);

        let (coords, mut confidences) = heatmap::locate_peaks(heatmaps)?;
        let coords = if self.config.refine {
            heatmap::refine_subpixel(coords.view(), heatmaps, self.config.subpixel_shift)?
        } else {
            coords
        };

        let heatmap_size = [w as f32, h as f32];
        let mut preds = Array3::<f32>::zeros(coords.raw_dim());
        for i in 0..n {
            let center = [centers[[i, 0]], centers[[i, 1]]];
            let scale = [scales[[i, 0]], scales[[i, 1]]];
            match transform_preds(coords.index_axis(Axis(0), i), center, scale, heatmap_size) {
                Ok(t) => preds.index_axis_mut(Axis(0), i).assign(&t),
                Err(e) => match self.config.on_transform_error {
                    TransformErrorPolicy::Abort => return Err(e),
                    TransformErrorPolicy::MarkInvalid => {
                        warn!("image {} marked invalid: {}", i, e);
                        preds.index_axis_mut(Axis(0), i).fill(f32::NAN);
                        confidences.index_axis_mut(Axis(0), i).fill(0.);
                    }
                },
            }
        }

        Ok(Predictions {
            coords: preds,
            confidences,
        })
    }

    /// 次元数が不定のネットワーク出力をデコードします。4次元でない場合はエラー
    pub fn decode_dyn(
        &self,
        heatmaps: ArrayViewD<f32>,
        centers: ArrayView2<f32>,
        scales: ArrayView2<f32>,
    ) -> Result<Predictions> {
        let heatmaps = heatmap::as_heatmap_batch(heatmaps)?;
        self.decode(heatmaps, centers, scales)
    }
}
