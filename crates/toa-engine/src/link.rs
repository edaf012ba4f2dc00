//! リンクコンテキスト
//!
//! 1 本の BLE リンクに属するエンジン状態をすべて持つ。
//! チャンネルテーブル・ブロードキャストコンテキスト・応答キューはここが唯一の所有者で、
//! 機能ハンドラーは `&mut Link` を通してしか触れない。
//!
//! ## 送信時の MIC 付与
//!
//! ```text
//! CID 0   : そのまま送る
//! CID 1   : broadcast nonce++ → broadcast_mic(opcode ‖ payload)
//! CID 2.. : 認証済みなら nonceT++ → mic(opcode ‖ payload)
//!           READY は broadcast nonce を frame[6..10] に埋め直してから署名
//!           CLOSE_CHANNEL は署名した直後にスロットを解放
//!           未認証なら送らずにスロットを解放
//! ```

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::vec::Vec;

use toa_crypto::{
    broadcast_key, device_auth, session_key, AuthKey, BroadcastSession, ChannelSession,
    AUTH_RAND_T_LEN, MIC_LEN, RAND_A_LEN, RAND_T_FIXED_LEN, RAND_T_LEN, TILE_ID_LEN,
};
use toa_proto::opcode::{command, response};
use toa_proto::{
    encode_channel, encode_connectionless, split_mic, Capabilities, CloseReason, ErrorCode,
    Feature, Token, BROADCAST_CID, BROADCAST_TOKEN, CONNECTIONLESS_CID,
};
use toa_transport::{OutboundPacket, Outbox, QueueStats};

use crate::channel::{Channel, ChannelIndex, ChannelTable};
use crate::config::{Credentials, EngineConfig};
use crate::counters::Counters;
use crate::platform::{AuthorizeError, Authorizer, Platform, Random, TimerId, Timer, Transport};

/// READY 応答で broadcast nonce を埋め込むフレーム内オフセット
const READY_NONCE_OFFSET: usize = 6;

/// リンクごとのエンジン状態と、機能ハンドラーに公開する API
pub struct Link {
    config: EngineConfig,
    auth_key: AuthKey,
    tile_id: [u8; TILE_ID_LEN],
    channels: ChannelTable,
    broadcast: BroadcastSession,
    /// 接続ごとに作り直す randT の固定プレフィックス
    rand_t_fixed: [u8; RAND_T_FIXED_LEN],
    outbox: Outbox,
    capabilities: Capabilities,
    /// READY でアプリが通知してきた機能ビット
    client_features: u8,
    counters: Counters,
    /// 機能ハンドラーへの通知待ちの解放済み CID
    unassigned: VecDeque<u8>,
    transport: Box<dyn Transport>,
    timer: Box<dyn Timer>,
    random: Box<dyn Random>,
    authorizer: Option<Box<dyn Authorizer>>,
}

impl Link {
    pub(crate) fn new(config: EngineConfig, credentials: Credentials, platform: Platform) -> Self {
        let rand_t_fixed = [0u8; RAND_T_FIXED_LEN];
        let broadcast = BroadcastSession::new(broadcast_key(
            &credentials.auth_key,
            &rand_t_fixed,
            &credentials.tile_id,
        ));

        let mut capabilities = Capabilities::new();
        capabilities.set(Feature::Tma);
        capabilities.set(Feature::Tka);

        Link {
            channels: ChannelTable::new(config.num_channels),
            outbox: Outbox::new(config.queue_size),
            auth_key: credentials.auth_key,
            tile_id: credentials.tile_id,
            broadcast,
            rand_t_fixed,
            capabilities,
            client_features: 0,
            counters: Counters::default(),
            unassigned: VecDeque::new(),
            transport: platform.transport,
            timer: platform.timer,
            random: platform.random,
            authorizer: platform.authorizer,
            config,
        }
    }

    // ===== 機能ハンドラー向け API =====

    /// チャンネル（またはブロードキャスト）に応答を積み、送信を試みる
    ///
    /// payload は最大ペイロード長に切り詰める。
    pub fn send_response(&mut self, cid: u8, opcode: u8, payload: &[u8]) {
        let frame = encode_channel(cid, opcode, payload, self.config.max_payload);
        self.enqueue(frame, opcode);
    }

    /// ブロードキャスト応答
    pub fn send_broadcast(&mut self, opcode: u8, payload: &[u8]) {
        self.send_response(BROADCAST_CID, opcode, payload);
    }

    /// コネクションレス応答
    pub fn send_connectionless(&mut self, token: &Token, opcode: u8, payload: &[u8]) {
        let frame = encode_connectionless(token, opcode, payload, self.config.max_payload);
        self.enqueue(frame, opcode);
    }

    /// `[RSP_ERROR][error][command]`
    pub fn send_error(&mut self, cid: u8, error: ErrorCode, command: u8) {
        self.send_response(cid, response::ERROR, &[error.as_u8(), command]);
    }

    /// `[RSP_ERROR][error][command][param]`
    pub fn send_error_param(&mut self, cid: u8, error: ErrorCode, command: u8, param: u8) {
        self.send_response(cid, response::ERROR, &[error.as_u8(), command, param]);
    }

    /// コネクションレスのエラー応答
    pub fn send_connectionless_error(&mut self, token: &Token, error: ErrorCode, command: u8) {
        self.send_connectionless(token, response::ERROR, &[error.as_u8(), command]);
    }

    /// チャンネルを閉じる（CLOSE_CHANNEL 応答の送信時にスロットが解放される）
    pub fn close_channel(&mut self, cid: u8, reason: CloseReason, payload: &[u8]) {
        let mut rsp = Vec::with_capacity(1 + payload.len());
        rsp.push(reason.as_u8());
        rsp.extend_from_slice(payload);
        log::info!("closing channel {} ({:?})", cid, reason);
        self.send_response(cid, response::CLOSE_CHANNEL, &rsp);
    }

    /// 指定チャンネルが認証済みか
    pub fn is_authenticated(&self, cid: u8) -> bool {
        self.channels.by_cid(cid).is_some_and(Channel::is_authenticated)
    }

    /// いずれかのチャンネルが認証済みか
    pub fn any_authenticated(&self) -> bool {
        self.channels.any_authenticated()
    }

    /// 割り当て済みチャンネル数
    pub fn open_channels(&self) -> usize {
        self.channels.assigned_count()
    }

    pub fn channel(&self, cid: u8) -> Option<&Channel> {
        self.channels.by_cid(cid)
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.capabilities.contains(feature)
    }

    pub fn set_feature(&mut self, feature: Feature) {
        self.capabilities.set(feature);
    }

    pub fn clear_feature(&mut self, feature: Feature) {
        self.capabilities.clear(feature);
    }

    /// READY でアプリが通知した機能バイト
    pub fn client_features(&self) -> u8 {
        self.client_features
    }

    pub fn max_payload(&self) -> usize {
        self.config.max_payload
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.outbox.queue_stats()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 現在のブロードキャスト nonce
    pub fn broadcast_nonce(&self) -> u32 {
        self.broadcast.nonce()
    }

    // ===== リンクのライフサイクル =====

    /// 接続時の初期化
    pub(crate) fn init(&mut self) {
        self.outbox.reset();
        let released = self.channels.clear_all();
        self.unassigned.extend(released);
        self.reset_keepalive_timers();
        self.client_features = 0;

        if self.random.fill(&mut self.rand_t_fixed).is_err() {
            log::error!("no randomness for link init, disconnecting");
            self.transport.disconnect();
            return;
        }
        self.broadcast = BroadcastSession::new(broadcast_key(
            &self.auth_key,
            &self.rand_t_fixed,
            &self.tile_id,
        ));

        if self.config.authentication_timeout_secs > 0 {
            self.timer
                .start(TimerId::Authentication, self.config.authentication_timeout_secs);
        }
        log::info!("link initialised");
    }

    /// 切断時の後始末
    pub(crate) fn disconnect(&mut self) {
        self.outbox.set_ready(false);
        let released = self.channels.clear_all();
        self.unassigned.extend(released);
        self.reset_keepalive_timers();
        self.timer.cancel(TimerId::Authentication);
        log::info!("link disconnected");
    }

    /// トランスポートの送信可否が変わった
    pub(crate) fn transport_ready(&mut self, ready: bool) {
        if !ready {
            // 応答特性の通知が外されたら安全のため切断する
            log::warn!("transport no longer ready, requesting disconnect");
            self.outbox.set_ready(false);
            self.transport.disconnect();
        } else if !self.outbox.is_ready() {
            self.outbox.set_ready(true);
            self.send_attempt();
        }
    }

    /// 送信完了通知
    pub(crate) fn response_sent(&mut self) {
        if self.outbox.is_in_flight() {
            self.outbox.acknowledge();
            self.send_attempt();
        } else {
            log::debug!("unexpected send acknowledgement");
        }
    }

    /// 認証タイムアウト満了
    pub(crate) fn authentication_expired(&mut self) {
        self.counters.auth_disconnect = self.counters.auth_disconnect.wrapping_add(1);
        log::warn!("authentication timeout, disconnecting");
        self.transport.disconnect();
    }

    /// アプリ側の認可が下りたことを全アプリに通知する
    pub(crate) fn authorized(&mut self, authorization_type: u8, time: u16) {
        let t = time.to_le_bytes();
        self.send_connectionless(
            &BROADCAST_TOKEN,
            response::AUTHORIZED,
            &[authorization_type, t[0], t[1]],
        );
    }

    pub(crate) fn take_unassigned(&mut self) -> Option<u8> {
        self.unassigned.pop_front()
    }

    // ===== コネクションレスコマンド =====

    /// OPEN_CHANNEL: `[randA:14]` → `[cid][randT:13]`
    pub(crate) fn open_channel(&mut self, token: &Token, payload: &[u8]) {
        let Some(rand_a) = rand_a_of(payload) else {
            self.send_connectionless_error(token, ErrorCode::Parameters, command::OPEN_CHANNEL);
            return;
        };

        let Some(idx) = self.channels.first_free() else {
            log::warn!("open channel refused: no free slot");
            self.send_connectionless_error(token, ErrorCode::NoCidAvailable, command::OPEN_CHANNEL);
            return;
        };

        let mut rand_t = [0u8; RAND_T_LEN];
        rand_t[..RAND_T_FIXED_LEN].copy_from_slice(&self.rand_t_fixed);
        if self.random.fill(&mut rand_t[RAND_T_FIXED_LEN..]).is_err() {
            self.send_connectionless_error(token, ErrorCode::InvalidState, command::OPEN_CHANNEL);
            return;
        }

        let cid = idx.cid();
        let key = session_key(&self.auth_key, &rand_a, &rand_t, cid, token);
        self.channels.get_mut(idx).assign(ChannelSession::new(key));
        log::info!("channel {} opened", cid);

        let mut rsp = [0u8; 1 + RAND_T_LEN];
        rsp[0] = cid;
        rsp[1..].copy_from_slice(&rand_t);
        self.send_connectionless(token, response::OPEN_CHANNEL, &rsp);

        self.start_default_keepalive(idx);
    }

    /// AUTHENTICATE: `[randA:14]` → `[randT:10][sresT:4]`
    pub(crate) fn authenticate(&mut self, token: &Token, payload: &[u8]) {
        let Some(rand_a) = rand_a_of(payload) else {
            self.send_connectionless_error(token, ErrorCode::Parameters, command::AUTHENTICATE);
            return;
        };
        self.counters.authenticate = self.counters.authenticate.wrapping_add(1);

        let mut rand_t = [0u8; AUTH_RAND_T_LEN];
        if self.random.fill(&mut rand_t).is_err() {
            self.send_connectionless_error(token, ErrorCode::InvalidState, command::AUTHENTICATE);
            return;
        }

        let auth = device_auth(&self.auth_key, &rand_a, &rand_t);
        let mut rsp = [0u8; AUTH_RAND_T_LEN + 4];
        rsp[..AUTH_RAND_T_LEN].copy_from_slice(&rand_t);
        rsp[AUTH_RAND_T_LEN..].copy_from_slice(&auth.sres_t);
        self.send_connectionless(token, response::AUTHENTICATE, &rsp);
    }

    /// ASSOCIATE: AUTHENTICATE と同じ応答に加えて、アプリ側の認可判断を挟む
    pub(crate) fn associate(&mut self, token: &Token, payload: &[u8]) {
        let Some(rand_a) = rand_a_of(payload) else {
            self.send_connectionless_error(token, ErrorCode::Parameters, command::ASSOCIATE);
            return;
        };

        let mut rand_t = [0u8; AUTH_RAND_T_LEN];
        if self.random.fill(&mut rand_t).is_err() {
            self.send_connectionless_error(token, ErrorCode::InvalidState, command::ASSOCIATE);
            return;
        }

        let auth = device_auth(&self.auth_key, &rand_a, &rand_t);
        let verdict = match self.authorizer.as_mut() {
            Some(authorizer) => authorizer.associate(&auth.aco),
            None => Ok(()),
        };

        match verdict {
            Ok(()) => {
                let mut rsp = [0u8; AUTH_RAND_T_LEN + 4];
                rsp[..AUTH_RAND_T_LEN].copy_from_slice(&rand_t);
                rsp[AUTH_RAND_T_LEN..].copy_from_slice(&auth.sres_t);
                self.send_connectionless(token, response::ASSOCIATE, &rsp);
            }
            Err(AuthorizeError::Denied { authorization_type }) => {
                self.send_connectionless(
                    token,
                    response::ERROR,
                    &[
                        ErrorCode::Authorization.as_u8(),
                        command::ASSOCIATE,
                        authorization_type,
                    ],
                );
            }
            Err(AuthorizeError::Failed(code)) => {
                self.send_connectionless_error(token, code, command::ASSOCIATE);
            }
        }
    }

    // ===== セッションチャンネル =====

    /// 受信フレームの MIC を検証し、成功なら `[opcode][payload]` を返す
    ///
    /// 失敗したチャンネルは MIC_FAILURE で閉じる。
    pub(crate) fn verify_inbound<'a>(&mut self, idx: ChannelIndex, sealed: &'a [u8]) -> Option<&'a [u8]> {
        let channel = self.channels.get_mut(idx);
        let session = channel.session.as_mut()?;

        // 短すぎるフレームは MIC ゼロで閉じる
        let outcome = match split_mic(sealed) {
            Some((body, received)) => session.check(body, received).map(|()| body),
            None => Err([0u8; MIC_LEN]),
        };

        let expected = match outcome {
            Ok(body) => {
                channel.authenticated = true;
                self.timer.cancel(TimerId::Authentication);
                return Some(body);
            }
            Err(expected) => expected,
        };

        let nonce_t = session.nonce_t();
        let was_authenticated = channel.authenticated;
        self.counters.mic_failure = self.counters.mic_failure.wrapping_add(1);
        if !was_authenticated {
            self.counters.auth_failure = self.counters.auth_failure.wrapping_add(1);
        }
        log::warn!("MIC failure on channel {}", idx.cid());

        let mut rsp = [0u8; 4 + MIC_LEN];
        rsp[..4].copy_from_slice(&nonce_t.to_le_bytes());
        rsp[4..].copy_from_slice(&expected);
        self.close_channel(idx.cid(), CloseReason::MicFailure, &rsp);
        None
    }

    /// READY: `[mps][features:3][broadcast nonce LE32]`
    pub(crate) fn ready(&mut self, cid: u8, payload: &[u8]) {
        self.counters.channel_open = self.counters.channel_open.wrapping_add(1);
        if let Some(&features) = payload.get(1) {
            self.client_features = features;
        }

        let caps = self.capabilities.to_bytes();
        let nonce = self.broadcast.nonce().to_le_bytes();
        let rsp = [
            self.config.max_payload as u8,
            caps[0],
            caps[1],
            caps[2],
            nonce[0],
            nonce[1],
            nonce[2],
            nonce[3],
        ];
        self.send_response(cid, response::READY, &rsp);
    }

    /// スロットを解放する
    ///
    /// キープアライブを止め、機能ハンドラーへの通知を予約する。
    /// 割り当て済みのチャンネルがなくなったら切断タイマーを始動する。
    pub(crate) fn unassign(&mut self, idx: ChannelIndex) {
        let channel = self.channels.get_mut(idx);
        if !channel.assigned {
            return;
        }
        channel.reset();
        self.timer.cancel(TimerId::KeepAlive(idx));
        self.unassigned.push_back(idx.cid());
        log::info!("channel {} released", idx.cid());

        if !self.channels.any_assigned() {
            self.timer
                .start(TimerId::Authentication, self.config.disconnect_delay_secs);
        }
    }

    pub(crate) fn channels(&self) -> &ChannelTable {
        &self.channels
    }

    pub(crate) fn channels_mut(&mut self) -> &mut ChannelTable {
        &mut self.channels
    }

    pub(crate) fn timer(&mut self) -> &mut dyn Timer {
        self.timer.as_mut()
    }

    pub(crate) fn counters_mut(&mut self) -> &mut Counters {
        &mut self.counters
    }

    // ===== Private メソッド =====

    fn enqueue(&mut self, frame: Vec<u8>, opcode: u8) {
        if self.outbox.enqueue(frame, opcode).is_err() {
            self.counters.dropped_response = self.counters.dropped_response.wrapping_add(1);
        }
        self.send_attempt();
    }

    /// フロー制御が許す限り 1 パケット送る
    ///
    /// 未認証チャンネル宛てで破棄したパケットは数えず、次のパケットを試す。
    fn send_attempt(&mut self) {
        while let Some(mut packet) = self.outbox.next_packet() {
            if self.seal(&mut packet) {
                self.outbox.mark_in_flight();
                log::debug!("send cid={} len={}", packet.cid(), packet.len());
                self.transport.send(packet.as_bytes());
                return;
            }
        }
    }

    /// 送信直前に MIC を付ける。送ってはいけないパケットなら false
    fn seal(&mut self, packet: &mut OutboundPacket) -> bool {
        match packet.cid() {
            CONNECTIONLESS_CID => true,
            BROADCAST_CID => {
                let mic = self.broadcast.sign(packet.body());
                packet.seal(&mic);
                true
            }
            cid => {
                let Some(idx) = self.channels.index_of(cid) else {
                    log::warn!("dropping response for invalid cid {}", cid);
                    return false;
                };

                if !self.channels.get(idx).authenticated {
                    // 未認証チャンネルには応答しない
                    self.unassign(idx);
                    return false;
                }

                let opcode = packet.opcode();
                if opcode == Some(response::READY) {
                    packet.patch(READY_NONCE_OFFSET, &self.broadcast.nonce().to_le_bytes());
                }
                let Some(session) = self.channels.get_mut(idx).session.as_mut() else {
                    return false;
                };
                let mic = session.sign(packet.body());
                packet.seal(&mic);

                if opcode == Some(response::CLOSE_CHANNEL) {
                    // 旧鍵で署名済み。送信を待たずに解放する
                    self.unassign(idx);
                }
                true
            }
        }
    }

    fn reset_keepalive_timers(&mut self) {
        let indices: Vec<ChannelIndex> = self.channels.indices().collect();
        for idx in indices {
            self.timer.cancel(TimerId::KeepAlive(idx));
        }
    }
}

fn rand_a_of(payload: &[u8]) -> Option<[u8; RAND_A_LEN]> {
    payload.get(..RAND_A_LEN)?.try_into().ok()
}
