//! チャンネルテーブル
//!
//! セッションチャンネルの固定長アリーナ。CID 2.. のスロットを `ChannelIndex` で指す。
//!
//! ```text
//! CID:    0              1            2        3       ...   N+1
//!         connectionless broadcast    slot 0   slot 1  ...   slot N-1
//! ```

use alloc::vec::Vec;

use toa_crypto::ChannelSession;
use toa_proto::FIRST_SESSION_CID;

/// セッションチャンネルのスロット番号
///
/// テーブルが発行した値だけが存在する。範囲外を指すのはプログラミングエラー。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelIndex(u8);

impl ChannelIndex {
    pub(crate) fn new(index: u8) -> Self {
        ChannelIndex(index)
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    /// 対応する CID
    pub fn cid(self) -> u8 {
        self.0 + FIRST_SESSION_CID
    }
}

/// 1 チャンネルの状態
#[derive(Debug, Clone, Default)]
pub struct Channel {
    pub(crate) assigned: bool,
    pub(crate) authenticated: bool,
    pub(crate) keepalive_enabled: bool,
    pub(crate) awaiting_ack: bool,
    /// OPEN_CHANNEL で一度だけ設定され、解放で破棄される
    pub(crate) session: Option<ChannelSession>,
    pub(crate) check_delay: u32,
    pub(crate) ack_delay: u32,
}

impl Channel {
    pub fn is_assigned(&self) -> bool {
        self.assigned
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn keepalive_enabled(&self) -> bool {
        self.keepalive_enabled
    }

    pub fn awaiting_ack(&self) -> bool {
        self.awaiting_ack
    }

    pub fn check_delay(&self) -> u32 {
        self.check_delay
    }

    pub fn ack_delay(&self) -> u32 {
        self.ack_delay
    }

    /// 最後に使ったデバイス発 nonce
    pub fn nonce_t(&self) -> Option<u32> {
        self.session.as_ref().map(ChannelSession::nonce_t)
    }

    /// 最後に使ったアプリ発 nonce
    pub fn nonce_a(&self) -> Option<u32> {
        self.session.as_ref().map(ChannelSession::nonce_a)
    }

    /// OPEN_CHANNEL 成功時
    pub(crate) fn assign(&mut self, session: ChannelSession) {
        *self = Channel {
            assigned: true,
            session: Some(session),
            ..Channel::default()
        };
    }

    /// 解放（セッション鍵はここで破棄される）
    pub(crate) fn reset(&mut self) {
        *self = Channel::default();
    }
}

/// チャンネルテーブル
#[derive(Debug, Clone)]
pub struct ChannelTable {
    slots: Vec<Channel>,
}

impl ChannelTable {
    pub fn new(num_channels: usize) -> Self {
        let mut slots = Vec::with_capacity(num_channels);
        slots.resize_with(num_channels, Channel::default);
        ChannelTable { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// セッション CID をスロット番号に変換する（範囲外は `None`）
    pub fn index_of(&self, cid: u8) -> Option<ChannelIndex> {
        let index = cid.checked_sub(FIRST_SESSION_CID)?;
        ((index as usize) < self.slots.len()).then(|| ChannelIndex::new(index))
    }

    pub fn get(&self, idx: ChannelIndex) -> &Channel {
        &self.slots[idx.get()]
    }

    pub fn get_mut(&mut self, idx: ChannelIndex) -> &mut Channel {
        &mut self.slots[idx.get()]
    }

    /// CID でチャンネルを引く
    pub fn by_cid(&self, cid: u8) -> Option<&Channel> {
        self.index_of(cid).map(|idx| self.get(idx))
    }

    /// 最初の空きスロット
    pub fn first_free(&self) -> Option<ChannelIndex> {
        self.slots
            .iter()
            .position(|c| !c.assigned)
            .map(|i| ChannelIndex::new(i as u8))
    }

    pub fn any_assigned(&self) -> bool {
        self.slots.iter().any(|c| c.assigned)
    }

    pub fn any_authenticated(&self) -> bool {
        self.slots.iter().any(|c| c.authenticated)
    }

    pub fn assigned_count(&self) -> usize {
        self.slots.iter().filter(|c| c.assigned).count()
    }

    pub fn indices(&self) -> impl Iterator<Item = ChannelIndex> {
        (0..self.slots.len() as u8).map(ChannelIndex::new)
    }

    /// 全スロットを解放し、解放前に割り当て済みだった CID を返す
    pub(crate) fn clear_all(&mut self) -> Vec<u8> {
        let mut released = Vec::new();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.assigned {
                released.push(ChannelIndex::new(i as u8).cid());
            }
            slot.reset();
        }
        released
    }
}
