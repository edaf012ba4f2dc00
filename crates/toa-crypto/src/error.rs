//! 暗号エラー型

use thiserror::Error;

/// 暗号操作のエラー
///
/// MIC 不一致や署名不一致はエラーではなく検証結果（bool）として返す。
/// ここに並ぶのは設定・入力フォーマットの誤りだけ。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Base64 デコードに失敗
    #[error("Invalid Base64 encoding")]
    InvalidBase64,
    /// 鍵・ID の長さが不正
    #[error("Invalid length (expected {expected} bytes, got {actual})")]
    InvalidLength { expected: usize, actual: usize },
    /// 公開鍵が曲線上の点として不正
    #[error("Invalid public key encoding")]
    InvalidPublicKey,
    /// 乱数源が利用できない
    #[error("Random source unavailable")]
    RandomUnavailable,
}
