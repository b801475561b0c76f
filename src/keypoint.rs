//! デコード結果を関節ごとに扱うためのモジュール

use ndarray::Array3;

/// COCO の 17 関節
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum CocoJoint {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl CocoJoint {
    pub const COUNT: usize = 17;

    pub fn from_index(index: usize) -> Option<Self> {
        use CocoJoint::*;
        const ALL: [CocoJoint; CocoJoint::COUNT] = [
            Nose,
            LeftEye,
            RightEye,
            LeftEar,
            RightEar,
            LeftShoulder,
            RightShoulder,
            LeftElbow,
            RightElbow,
            LeftWrist,
            RightWrist,
            LeftHip,
            RightHip,
            LeftKnee,
            RightKnee,
            LeftAnkle,
            RightAnkle,
        ];
        ALL.get(index).copied()
    }
}

/// 骨格の描画に使う関節の組
pub const COCO_SKELETON: [(CocoJoint, CocoJoint); 16] = [
    (CocoJoint::Nose, CocoJoint::LeftEye),
    (CocoJoint::Nose, CocoJoint::RightEye),
    (CocoJoint::LeftEye, CocoJoint::LeftEar),
    (CocoJoint::RightEye, CocoJoint::RightEar),
    (CocoJoint::LeftShoulder, CocoJoint::RightShoulder),
    (CocoJoint::LeftShoulder, CocoJoint::LeftElbow),
    (CocoJoint::LeftElbow, CocoJoint::LeftWrist),
    (CocoJoint::RightShoulder, CocoJoint::RightElbow),
    (CocoJoint::RightElbow, CocoJoint::RightWrist),
    (CocoJoint::LeftShoulder, CocoJoint::LeftHip),
    (CocoJoint::RightShoulder, CocoJoint::RightHip),
    (CocoJoint::LeftHip, CocoJoint::RightHip),
    (CocoJoint::LeftHip, CocoJoint::LeftKnee),
    (CocoJoint::LeftKnee, CocoJoint::LeftAnkle),
    (CocoJoint::RightHip, CocoJoint::RightKnee),
    (CocoJoint::RightKnee, CocoJoint::RightAnkle),
];

/// 1関節分のデコード結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// 元画像上のx座標
    pub x: f32,
    /// 元画像上のy座標
    pub y: f32,
    /// ヒートマップの最大値
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// 座標が有限で、信頼度が閾値以上か
    pub fn is_valid(&self, threshold: f32) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.confidence >= threshold
    }
}

/// バッチ全体のデコード結果
#[derive(Debug, Clone, PartialEq)]
pub struct Predictions {
    /// 元画像上の座標 (N, J, 2)
    pub coords: Array3<f32>,
    /// 信頼度 (N, J, 1)
    pub confidences: Array3<f32>,
}

impl Predictions {
    /// バッチ内の画像数
    pub fn batch_size(&self) -> usize {
        self.coords.dim().0
    }

    /// 関節数
    pub fn num_joints(&self) -> usize {
        self.coords.dim().1
    }

    /// `n` 枚目の画像の関節を取得します。範囲外の場合は `None`
    pub fn keypoints(&self, n: usize) -> Option<Vec<Keypoint>> {
        if n >= self.batch_size() {
            return None;
        }
        let kps = (0..self.num_joints())
            .map(|p| {
                Keypoint::new(
                    self.coords[[n, p, 0]],
                    self.coords[[n, p, 1]],
                    self.confidences[[n, p, 0]],
                )
            })
            .collect();
        Some(kps)
    }
}
