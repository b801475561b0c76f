//! # Simple Pose 後処理ライブラリ
//!
//! このクレートは、ResNet + 逆畳み込みヘッドのポーズ推定ネットワーク (Simple Baselines) が
//! 出力するヒートマップを、元画像上の関節座標に変換するためのRustライブラリです。
//!
//! ## 主な機能
//!
//! 1. **ピーク検出**: 各関節のヒートマップの最大値の位置と値を求めます。
//! 2. **サブピクセル補正**: 隣接画素の勾配の符号でピーク位置を 1/4 px 補正します。
//! 3. **座標の逆変換**: クロップ領域 (中心・スケール) のアフィン変換を逆にかけ、元画像の座標に戻します。
//! 4. **画像処理**: ネットワーク入力の切り出しと、関節・骨格の描画を行います。
//!
//! ## Example
//! ```
//! use ndarray::{array, Array4};
//! use simple_pose_postprocess::decoder::HeatmapDecoder;
//!
//! let mut heatmaps = Array4::<f32>::zeros((1, 17, 64, 48));
//! heatmaps[[0, 0, 32, 24]] = 1.0;
//! let centers = array![[48f32, 64.]];
//! let scales = array![[192f32, 256.]];
//!
//! let preds = HeatmapDecoder::default()
//!     .decode(heatmaps.view(), centers.view(), scales.view())
//!     .unwrap();
//! let nose = preds.keypoints(0).unwrap()[0];
//! assert!((nose.x - 48.).abs() < 1e-3 && (nose.y - 64.).abs() < 1e-3);
//! ```

pub mod affine;
pub mod decoder;
pub mod error;
pub mod heatmap;
pub mod img_proc;
pub mod keypoint;
pub mod postprocess;

pub use decoder::{DecoderConfig, HeatmapDecoder, TransformErrorPolicy};
pub use error::{DecodeError, Result};
pub use keypoint::{CocoJoint, Keypoint, Predictions};
pub use postprocess::decode;
