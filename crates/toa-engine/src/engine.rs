//! エンジン本体
//!
//! プラットフォームからのイベント（接続・受信・送信完了・タイマー満了）を受け取り、
//! リンク状態と機能ハンドラーに振り分ける。イベントは 1 本のスレッドから
//! 逐次に届くことを前提にしている。

use alloc::boxed::Box;

use toa_proto::opcode::command;
use toa_proto::{Capabilities, CloseReason, ErrorCode, Feature, InboundFrame, Token};

use crate::config::{Credentials, EngineConfig};
use crate::counters::Counters;
use crate::error::EngineError;
use crate::feature::{FeatureHandler, FeatureRegistry};
use crate::link::Link;
use crate::platform::{Platform, TimerId};

/// TOA エンジン
pub struct Engine {
    link: Link,
    features: FeatureRegistry,
}

impl Engine {
    /// 設定を検証してエンジンを組み立てる
    ///
    /// # エラー
    /// - `EngineError::InvalidConfig`: 設定値が範囲外
    pub fn new(
        config: EngineConfig,
        credentials: Credentials,
        platform: Platform,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Engine {
            link: Link::new(config, credentials, platform),
            features: FeatureRegistry::new(),
        })
    }

    /// 機能ハンドラーを登録し、その機能ビットを立てる
    pub fn register(&mut self, handler: Box<dyn FeatureHandler>) -> Result<(), EngineError> {
        let feature = handler.feature();
        self.features.register(handler)?;
        self.link.set_feature(feature);
        Ok(())
    }

    /// 登録済みハンドラーを型で取り出して操作する
    ///
    /// 非同期処理の完了通知など、エンジン外から機能を駆動するときに使う。
    pub fn with_feature<H, R, F>(&mut self, f: F) -> Option<R>
    where
        H: FeatureHandler,
        F: FnOnce(&mut H, &mut Link) -> R,
    {
        let handler = self.features.get_mut::<H>()?;
        let result = f(handler, &mut self.link);
        self.settle();
        Some(result)
    }

    // ===== プラットフォームイベント =====

    /// BLE リンクが確立した
    pub fn connected(&mut self) {
        self.link.init();
        for handler in self.features.iter_mut() {
            handler.link_init(&mut self.link);
        }
        self.settle();
    }

    /// BLE リンクが切れた
    pub fn disconnected(&mut self) {
        self.link.disconnect();
        self.settle();
    }

    /// 応答特性の通知可否が変わった
    pub fn transport_ready(&mut self, ready: bool) {
        self.link.transport_ready(ready);
        self.settle();
    }

    /// トランスポートが前回のフレームを送り終えた
    pub fn response_sent(&mut self) {
        self.link.response_sent();
        self.settle();
    }

    /// 受信フレーム（CID 先頭）
    pub fn command_received(&mut self, bytes: &[u8]) {
        match InboundFrame::parse(bytes) {
            Ok(InboundFrame::Connectionless {
                token,
                command,
                payload,
            }) => self.process_connectionless(&token, command, payload),
            Ok(InboundFrame::Channel { cid, sealed }) => self.process_channel(cid, sealed),
            Ok(InboundFrame::Broadcast { .. }) => {
                log::debug!("ignoring frame on broadcast cid");
            }
            Err(e) => log::debug!("ignoring frame: {}", e),
        }
        self.settle();
    }

    /// タイマー満了
    pub fn timer_expired(&mut self, id: TimerId) {
        match id {
            TimerId::Authentication => self.link.authentication_expired(),
            TimerId::KeepAlive(idx) => self.link.keepalive_expired(idx),
        }
        self.settle();
    }

    /// アプリ側で認可が下りたことを全アプリに通知する
    pub fn authorized(&mut self, authorization_type: u8, time: u16) {
        self.link.authorized(authorization_type, time);
        self.settle();
    }

    /// アプリからの要求ではなく、デバイス側の判断でチャンネルを閉じる
    pub fn close_channel(&mut self, cid: u8, reason: CloseReason, payload: &[u8]) {
        if self.link.channel(cid).is_some_and(|c| c.is_assigned()) {
            self.link.close_channel(cid, reason, payload);
        }
        self.settle();
    }

    // ===== 状態の参照 =====

    /// いずれかのチャンネルが認証済みか
    pub fn is_authenticated(&self) -> bool {
        self.link.any_authenticated()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.link.capabilities()
    }

    pub fn set_feature(&mut self, feature: Feature) {
        self.link.set_feature(feature);
    }

    pub fn clear_feature(&mut self, feature: Feature) {
        self.link.clear_feature(feature);
    }

    pub fn counters(&self) -> &Counters {
        self.link.counters()
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    // ===== Private メソッド =====

    fn process_connectionless(&mut self, token: &Token, opcode: u8, payload: &[u8]) {
        match opcode {
            command::OPEN_CHANNEL => self.link.open_channel(token, payload),
            command::AUTHENTICATE => self.link.authenticate(token, payload),
            command::ASSOCIATE => self.link.associate(token, payload),
            _ => match self.features.connectionless_handler(opcode) {
                Some(handler) if self.link.has_feature(handler.feature()) => {
                    handler.process_connectionless(&mut self.link, token, opcode, payload);
                }
                _ => {
                    self.link
                        .send_connectionless_error(token, ErrorCode::Unsupported, opcode);
                }
            },
        }
    }

    fn process_channel(&mut self, cid: u8, sealed: &[u8]) {
        let Some(idx) = self.link.channels().index_of(cid) else {
            log::debug!("ignoring frame for invalid cid {}", cid);
            return;
        };
        if !self.link.channels().get(idx).is_assigned() || sealed.is_empty() {
            return;
        }

        let Some(body) = self.link.verify_inbound(idx, sealed) else {
            return;
        };
        let Some((&opcode, payload)) = body.split_first() else {
            return;
        };
        if payload.is_empty() {
            self.link.send_error(cid, ErrorCode::Parameters, opcode);
            return;
        }

        match opcode {
            command::READY => self.link.ready(cid, payload),
            command::CLOSE_CHANNEL => self.link.unassign(idx),
            command::TKA if self.link.has_feature(Feature::Tka) => {
                self.link.keepalive_command(idx, payload);
            }
            _ => match self.features.channel_handler(opcode) {
                Some(handler) if self.link.has_feature(handler.feature()) => {
                    handler.process(&mut self.link, cid, opcode, payload);
                }
                _ => self.link.send_error(cid, ErrorCode::Unsupported, opcode),
            },
        }
    }

    /// 解放済みチャンネルを機能ハンドラーに通知する
    fn settle(&mut self) {
        while let Some(cid) = self.link.take_unassigned() {
            for handler in self.features.iter_mut() {
                handler.channel_unassigned(&mut self.link, cid);
            }
        }
    }
}
