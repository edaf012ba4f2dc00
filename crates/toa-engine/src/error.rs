//! toa-engine エラー型
//!
//! プロトコル上の失敗はワイヤー上のエラー応答で返すので、ここには現れない。
//! 構築・設定・登録の誤りだけを扱う。

use thiserror::Error;

use toa_crypto::CryptoError;

/// エンジン構築・設定のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// 設定値が範囲外
    #[error("Invalid config `{field}`: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },
    /// 同じオペコードを処理するハンドラーが既に登録されている
    #[error("Command 0x{0:02x} is already handled")]
    DuplicateCommand(u8),
    /// 資格情報の読み込み失敗
    #[error("Credential error: {0}")]
    Credential(#[from] CryptoError),
}

/// 乱数源が使えない
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Random source unavailable")]
pub struct RandomError;
