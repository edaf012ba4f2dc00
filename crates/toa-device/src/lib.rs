//! # toa-device
//!
//! Tile デバイスのファサード。
//!
//! TOA エンジンに TOFU 機能を登録し、JSON 設定の読み込みと統計情報の JSON 出力を
//! まとめて提供する。プラットフォーム（BLE スタック・タイマー・フラッシュ書き込み）は
//! `Platform` と `TofuApp` の実装として外から渡す。
//!
//! ## 使い方
//!
//! ```text
//! let mut device = TileDevice::from_json(json, platform, Box::new(flash))?;
//!
//! device.connected();
//! device.transport_ready(true);
//! device.command_received(&frame);     // GATT 書き込み
//! device.response_sent();              // 通知の送信完了
//! device.timer_expired(id);            // Timer::start の満了
//! device.tofu_block_done(Ok(()));      // TofuApp::block_ready の書き込み完了
//! ```

pub mod config;
pub mod device;
pub mod error;

pub use config::{CredentialConfig, DeviceConfig};
pub use device::{DeviceStats, TileDevice, TofuStats};
pub use error::DeviceError;

pub use toa_engine::{
    Authorizer, CloseReason, Counters, EngineConfig, ErrorCode, Feature, OsRandom, Platform,
    Random, RandomError, Timer, TimerId, Transport,
};
pub use toa_tofu::{TofuApp, TofuConfig, TofuState};
