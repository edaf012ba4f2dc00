//! デバイス設定
//!
//! JSON 1 つでエンジン・TOFU・資格情報をまとめて読み込む。
//!
//! ```json
//! {
//!   "engine": { "num_channels": 4, "authentication_timeout_secs": 30 },
//!   "tofu": { "block_len": 1024, "running_version": "01.02.03.4", "public_key": "..." },
//!   "credentials": { "auth_key": "AAAAAAAAAAAAAAAAAAAAAA", "tile_id": "AQIDBAUGBwg" }
//! }
//! ```

use serde::{Deserialize, Serialize};

use toa_engine::{Credentials, EngineConfig};
use toa_tofu::TofuConfig;

use crate::error::DeviceError;

/// Base64（URL-safe, パディングなし）の資格情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// 16 バイトの認証鍵
    pub auth_key: String,
    /// 8 バイトの Tile ID
    pub tile_id: String,
}

impl CredentialConfig {
    pub fn load(&self) -> Result<Credentials, DeviceError> {
        Ok(Credentials::from_base64(&self.auth_key, &self.tile_id)?)
    }
}

/// デバイス設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub tofu: TofuConfig,
    pub credentials: CredentialConfig,
}

impl DeviceConfig {
    /// JSON から読み込んで検証する
    ///
    /// # エラー
    /// - `DeviceError::Json`: JSON 不正・必須項目なし
    /// - `DeviceError::Engine` / `DeviceError::Tofu`: 値が範囲外
    pub fn from_json(json: &str) -> Result<Self, DeviceError> {
        let config: DeviceConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DeviceError> {
        self.engine.validate()?;
        self.tofu.validate()?;
        self.tofu.public_key()?;
        self.credentials.load()?;
        Ok(())
    }
}
