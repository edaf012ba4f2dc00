//! toa-device エラー型

use thiserror::Error;

use toa_engine::EngineError;
use toa_tofu::TofuError;

/// デバイス構築・設定読み込みのエラー
#[derive(Debug, Error)]
pub enum DeviceError {
    /// JSON の解析・生成に失敗
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// エンジン設定・資格情報の誤り
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// TOFU 設定の誤り
    #[error(transparent)]
    Tofu(#[from] TofuError),
}
