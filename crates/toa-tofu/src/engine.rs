//! TOFU 状態機械
//!
//! ```text
//!            RESUME                  ブロック充足
//!   IDLE ───────────────► RX ─────────────────────► MEM
//!    ▲                    ▲                          │ block_ready → block_done(Ok)
//!    │                    └──── BLOCK_OK ────────────┤
//!    │                                               │ 最終ブロック
//!    │                                               ▼
//!    └──── IMAGE_OK ◄── complete_done(Ok) ◄── hash / 署名検証 → complete
//! ```
//!
//! 終端エラー（CRC2 / HASH / SIGNATURE など）は所有チャンネルに 1 度だけ通知し、
//! 再開コンテキストごと消す。

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::Any;

use toa_crypto::{block_crc_ok, verify_signature, PublicKey};
use toa_engine::{FeatureHandler, Link};
use toa_proto::opcode::{command, response};
use toa_proto::tofu::{self, CRC_LEN, VERSION_LEN};
use toa_proto::{ErrorCode, Feature};

use crate::app::TofuApp;
use crate::config::TofuConfig;
use crate::error::TofuError;
use crate::session::TransferContext;

/// これより短いイメージ長はファイル読み込み失敗とみなす
pub const MIN_IMAGE_LEN: u32 = 1000;

/// TOFU の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TofuState {
    /// 転送なし
    Idle,
    /// 現在のブロックのデータを受付中
    Rx,
    /// ブロック（またはイメージ全体）の検証・書き込み待ち
    Mem,
}

/// TOFU 機能ハンドラー
pub struct TofuEngine {
    block_len: u32,
    running_version: [u8; VERSION_LEN],
    public_key: Option<PublicKey>,
    app: Box<dyn TofuApp>,
    state: TofuState,
    /// 転送を所有するチャンネル
    owner: Option<u8>,
    /// 受信中ブロック（末尾 CRC16 込み）
    block: Vec<u8>,
    transfer: TransferContext,
    /// 検証済みイメージが適用待ち。再起動まで次の転送を受け付けない
    applied: bool,
}

impl TofuEngine {
    /// 設定を検証して TOFU エンジンを作る
    ///
    /// # エラー
    /// - `TofuError::InvalidConfig`: ブロック長・バージョンが不正
    /// - `TofuError::PublicKey`: 公開鍵が読めない
    pub fn new(config: &TofuConfig, app: Box<dyn TofuApp>) -> Result<Self, TofuError> {
        config.validate()?;
        Ok(TofuEngine {
            block_len: config.block_len,
            running_version: config.running_version_bytes()?,
            public_key: config.public_key()?,
            app,
            state: TofuState::Idle,
            owner: None,
            block: Vec::with_capacity(config.block_len as usize + CRC_LEN),
            transfer: TransferContext::default(),
            applied: false,
        })
    }

    pub fn state(&self) -> TofuState {
        self.state
    }

    pub fn owner(&self) -> Option<u8> {
        self.owner
    }

    pub fn transfer(&self) -> &TransferContext {
        &self.transfer
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }

    pub fn block_len(&self) -> u32 {
        self.block_len
    }

    /// `block_ready` の完了通知
    pub fn block_done(&mut self, link: &mut Link, result: Result<(), ErrorCode>) {
        if self.state != TofuState::Mem {
            log::warn!("unexpected block completion in {:?}", self.state);
            return;
        }
        if let Err(code) = result {
            self.terminal_error(link, code);
            return;
        }

        self.transfer.advance(self.block.len());
        self.block.clear();

        if self.transfer.is_complete() {
            let hash = match self.transfer.finish() {
                Ok(hash) => hash,
                Err(code) => return self.terminal_error(link, code),
            };
            let verified = self
                .public_key
                .as_ref()
                .is_some_and(|key| verify_signature(key, &hash, self.transfer.signature()));
            if !verified {
                return self.terminal_error(link, ErrorCode::Signature);
            }
            log::info!("image verified, {} bytes", self.transfer.image_len());
            self.app.complete();
        } else if let Some(cid) = self.owner {
            self.state = TofuState::Rx;
            self.send(link, cid, &[tofu::RSP_BLOCK_OK]);
        } else {
            self.state = TofuState::Idle;
        }
    }

    /// `complete` の完了通知
    pub fn complete_done(&mut self, link: &mut Link, result: Result<(), ErrorCode>) {
        if self.state != TofuState::Mem || !self.transfer.is_complete() {
            log::warn!("unexpected image completion");
            return;
        }
        if result.is_err() {
            self.terminal_error(link, ErrorCode::MemWrite);
            return;
        }

        self.applied = true;
        if let Some(cid) = self.owner {
            self.send(link, cid, &[tofu::RSP_IMAGE_OK]);
        }
        self.clear();
    }

    // ===== Private メソッド =====

    fn process_control(&mut self, link: &mut Link, cid: u8, payload: &[u8]) {
        let Some((&sub, params)) = payload.split_first() else {
            return;
        };
        if self.owner.is_some_and(|owner| owner != cid) {
            self.send_error(link, cid, sub, ErrorCode::ResourceInUse);
            return;
        }

        match sub {
            tofu::CTL_RESUME => self.resume(link, cid, params),
            tofu::CTL_EXIT => match params.first() {
                Some(&tofu::EXIT_INIT) => {
                    self.reset_session();
                    self.send(link, cid, &[tofu::RSP_EXIT_OK]);
                }
                Some(&tofu::EXIT_CLEAR) => {
                    self.clear();
                    self.send(link, cid, &[tofu::RSP_EXIT_OK]);
                }
                _ => self.send_error(link, cid, tofu::CTL_EXIT, ErrorCode::Parameters),
            },
            other => self.send_error(link, cid, other, ErrorCode::Unsupported),
        }
    }

    /// RESUME: `[version:10][image_len LE24]`
    fn resume(&mut self, link: &mut Link, cid: u8, params: &[u8]) {
        if self.state == TofuState::Mem || self.applied {
            self.send_error(link, cid, tofu::CTL_RESUME, ErrorCode::InvalidState);
            return;
        }
        if params.len() < tofu::RESUME_PARAMS_LEN {
            self.send_error(link, cid, tofu::CTL_RESUME, ErrorCode::Parameters);
            return;
        }

        let mut version = [0u8; VERSION_LEN];
        version.copy_from_slice(&params[..VERSION_LEN]);
        if version == self.running_version {
            self.send_error(link, cid, tofu::CTL_RESUME, ErrorCode::SameImage);
            return;
        }

        let image_len = u32::from_le_bytes([
            params[VERSION_LEN],
            params[VERSION_LEN + 1],
            params[VERSION_LEN + 2],
            0,
        ]);
        if image_len < MIN_IMAGE_LEN {
            self.send_error(link, cid, tofu::CTL_RESUME, ErrorCode::InvalidSize);
            return;
        }

        if self.transfer.is_continuation(&version, image_len, self.block_len) {
            self.reset_session();
            log::info!("resuming image at offset {}", self.transfer.offset());
        } else {
            self.clear();
            self.transfer.start(version, image_len);
            if let Err(code) = self.app.begin() {
                self.send_error(link, cid, tofu::CTL_RESUME, code);
                return;
            }
            log::info!("starting image transfer, {} bytes", image_len);
        }

        self.owner = Some(cid);
        self.state = TofuState::Rx;

        let block_len = self.block_len.to_le_bytes();
        let offset = self.transfer.offset().to_le_bytes();
        self.send(
            link,
            cid,
            &[
                tofu::RSP_RESUME_READY,
                block_len[0],
                block_len[1],
                block_len[2],
                block_len[3],
                offset[0],
                offset[1],
                offset[2],
                offset[3],
            ],
        );
    }

    fn process_data(&mut self, link: &mut Link, cid: u8, data: &[u8]) {
        if self.owner != Some(cid) {
            self.send_error(link, cid, tofu::CMD_DATA, ErrorCode::ResourceInUse);
            return;
        }
        if self.state != TofuState::Rx || self.applied {
            self.send_error(link, cid, tofu::CMD_DATA, ErrorCode::InvalidState);
            return;
        }

        let block_cap = self.block_len as usize + CRC_LEN;
        let filled = self.block.len() + data.len();
        let image_end = self.transfer.image_len() as usize + CRC_LEN;
        let image_pos = self.transfer.offset() as usize + filled;
        if filled > block_cap || image_pos > image_end {
            self.send_error(link, cid, tofu::CMD_DATA, ErrorCode::DataLength);
            self.clear();
            return;
        }

        self.block.extend_from_slice(data);
        if image_pos == image_end || filled == block_cap {
            self.process_block(link);
        }
    }

    /// ブロック充足時の検証。成功したらアプリに書き込みを依頼する
    fn process_block(&mut self, link: &mut Link) {
        self.state = TofuState::Mem;

        let received = self.block.len().saturating_sub(CRC_LEN);
        if (self.transfer.image_len() as usize) < self.transfer.offset() as usize + received {
            return self.terminal_error(link, ErrorCode::DataLength);
        }
        if !block_crc_ok(&self.block) {
            return self.terminal_error(link, ErrorCode::Crc2);
        }
        self.block.truncate(received);

        if self.transfer.offset() == 0 && received != 0 {
            if let Err(code) = self.transfer.absorb_first_block(&self.block) {
                return self.terminal_error(link, code);
            }
        } else {
            self.transfer.absorb(&self.block);
        }

        self.app.block_ready(self.transfer.offset(), &self.block);
    }

    /// 所有チャンネルにエラーを 1 度だけ返し、再開コンテキストごと消す
    fn terminal_error(&mut self, link: &mut Link, code: ErrorCode) {
        log::warn!("TOFU transfer aborted: {:?}", code);
        if let Some(cid) = self.owner {
            self.send_error(link, cid, tofu::CMD_DATA, code);
        }
        self.clear();
    }

    /// セッションだけを初期化する（再開コンテキストは残す）
    fn reset_session(&mut self) {
        self.state = TofuState::Idle;
        self.owner = None;
        self.block.clear();
    }

    /// 再開コンテキストも含めてすべて消す
    fn clear(&mut self) {
        self.reset_session();
        self.transfer = TransferContext::default();
    }

    /// チャンネルが消えた。MEM 中なら保留中の完了通知を生かすため状態は残す
    fn detach(&mut self) {
        if self.state == TofuState::Mem {
            self.owner = None;
        } else {
            self.reset_session();
        }
    }

    fn send(&self, link: &mut Link, cid: u8, payload: &[u8]) {
        link.send_response(cid, response::TOFU_CTL, payload);
    }

    /// `[RSP_ERROR][command][error]`
    fn send_error(&self, link: &mut Link, cid: u8, command: u8, code: ErrorCode) {
        self.send(link, cid, &[tofu::RSP_ERROR, command, code.as_u8()]);
    }
}

impl FeatureHandler for TofuEngine {
    fn feature(&self) -> Feature {
        Feature::Tofu
    }

    fn channel_commands(&self) -> &'static [u8] {
        &[command::TOFU_CTL, command::TOFU_DATA]
    }

    fn process(&mut self, link: &mut Link, cid: u8, opcode: u8, payload: &[u8]) {
        match opcode {
            command::TOFU_CTL => self.process_control(link, cid, payload),
            command::TOFU_DATA => self.process_data(link, cid, payload),
            _ => link.send_error(cid, ErrorCode::Unsupported, opcode),
        }
    }

    fn link_init(&mut self, _link: &mut Link) {
        self.detach();
    }

    fn channel_unassigned(&mut self, _link: &mut Link, cid: u8) {
        if self.owner == Some(cid) {
            self.detach();
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
