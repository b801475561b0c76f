//! ヒートマップのデコードで発生するエラー

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// 入力配列の形状が不正
    #[error("invalid input shape: {0}")]
    InvalidInputShape(String),

    /// アフィン変換の連立方程式が解けない (基準点が縮退している)
    #[error("invalid affine transform: {0}")]
    InvalidTransform(String),
}

pub type Result<T> = std::result::Result<T, DecodeError>;
