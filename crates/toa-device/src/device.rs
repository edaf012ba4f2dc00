//! Tile デバイス
//!
//! TOA エンジンに TOFU を登録した状態で持ち、プラットフォームからのイベントと
//! TOFU アプリの非同期完了をまとめて受け付ける。

use serde::Serialize;

use toa_engine::{Counters, Engine, ErrorCode, Feature, Platform, TimerId};
use toa_proto::{Capabilities, CloseReason};
use toa_tofu::{TofuApp, TofuEngine, TofuState};

use crate::config::DeviceConfig;
use crate::error::DeviceError;

/// TOFU の進捗（統計用）
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TofuStats {
    pub state: &'static str,
    pub owner: Option<u8>,
    pub offset: u32,
    pub image_len: u32,
    pub applied: bool,
}

/// デバイスの統計スナップショット
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeviceStats {
    pub counters: Counters,
    pub channels_open: usize,
    pub authenticated: bool,
    pub capabilities: u32,
    pub queue_capacity: usize,
    pub queue_used: usize,
    pub queue_items: usize,
    pub tofu: Option<TofuStats>,
}

/// TOA + TOFU を載せたデバイス
pub struct TileDevice {
    engine: Engine,
}

impl TileDevice {
    /// 設定からデバイスを組み立てる
    ///
    /// # エラー
    /// - `DeviceError::Engine`: エンジン設定・資格情報が不正
    /// - `DeviceError::Tofu`: TOFU 設定・公開鍵が不正
    pub fn new(
        config: &DeviceConfig,
        platform: Platform,
        app: Box<dyn TofuApp>,
    ) -> Result<Self, DeviceError> {
        let credentials = config.credentials.load()?;
        let tofu = TofuEngine::new(&config.tofu, app)?;
        let mut engine = Engine::new(config.engine.clone(), credentials, platform)?;
        engine.register(Box::new(tofu))?;
        log::info!(
            "tile device ready: {} channels, block_len {}",
            config.engine.num_channels,
            config.tofu.block_len
        );
        Ok(TileDevice { engine })
    }

    /// JSON 設定から組み立てる
    pub fn from_json(
        json: &str,
        platform: Platform,
        app: Box<dyn TofuApp>,
    ) -> Result<Self, DeviceError> {
        let config = DeviceConfig::from_json(json)?;
        Self::new(&config, platform, app)
    }

    // ===== プラットフォームイベント =====

    pub fn connected(&mut self) {
        self.engine.connected();
    }

    pub fn disconnected(&mut self) {
        self.engine.disconnected();
    }

    pub fn transport_ready(&mut self, ready: bool) {
        self.engine.transport_ready(ready);
    }

    pub fn response_sent(&mut self) {
        self.engine.response_sent();
    }

    pub fn command_received(&mut self, bytes: &[u8]) {
        self.engine.command_received(bytes);
    }

    pub fn timer_expired(&mut self, id: TimerId) {
        self.engine.timer_expired(id);
    }

    pub fn authorized(&mut self, authorization_type: u8, time: u16) {
        self.engine.authorized(authorization_type, time);
    }

    pub fn close_channel(&mut self, cid: u8, reason: CloseReason, payload: &[u8]) {
        self.engine.close_channel(cid, reason, payload);
    }

    // ===== TOFU アプリからの完了通知 =====

    /// `TofuApp::block_ready` の書き込み完了
    pub fn tofu_block_done(&mut self, result: Result<(), ErrorCode>) {
        self.engine
            .with_feature::<TofuEngine, _, _>(|tofu, link| tofu.block_done(link, result));
    }

    /// `TofuApp::complete` の完了
    pub fn tofu_complete_done(&mut self, result: Result<(), ErrorCode>) {
        self.engine
            .with_feature::<TofuEngine, _, _>(|tofu, link| tofu.complete_done(link, result));
    }

    // ===== 状態の参照 =====

    pub fn is_authenticated(&self) -> bool {
        self.engine.is_authenticated()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.engine.capabilities()
    }

    pub fn set_feature(&mut self, feature: Feature) {
        self.engine.set_feature(feature);
    }

    pub fn clear_feature(&mut self, feature: Feature) {
        self.engine.clear_feature(feature);
    }

    pub fn counters(&self) -> &Counters {
        self.engine.counters()
    }

    pub fn tofu_state(&mut self) -> Option<TofuState> {
        self.engine
            .with_feature::<TofuEngine, _, _>(|tofu, _| tofu.state())
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// 統計スナップショット
    pub fn stats(&mut self) -> DeviceStats {
        let tofu = self.engine.with_feature::<TofuEngine, _, _>(|tofu, _| TofuStats {
            state: match tofu.state() {
                TofuState::Idle => "idle",
                TofuState::Rx => "rx",
                TofuState::Mem => "mem",
            },
            owner: tofu.owner(),
            offset: tofu.transfer().offset(),
            image_len: tofu.transfer().image_len(),
            applied: tofu.is_applied(),
        });

        let link = self.engine.link();
        let queue = link.queue_stats();
        DeviceStats {
            counters: *link.counters(),
            channels_open: link.open_channels(),
            authenticated: link.any_authenticated(),
            capabilities: link.capabilities().bits(),
            queue_capacity: queue.capacity,
            queue_used: queue.used,
            queue_items: queue.items,
            tofu,
        }
    }

    /// 統計情報を JSON で返す
    pub fn stats_json(&mut self) -> Result<String, DeviceError> {
        Ok(serde_json::to_string(&self.stats())?)
    }
}
