//! キープアライブ監視（TKA）
//!
//! チャンネルごとに 1 本のタイマーを check / ack の 2 段階で使い回す。
//!
//! ```text
//!            OPEN_CHANNEL
//!                 │ start_delay
//!                 ▼
//!   ┌──────► [check 待ち] ──満了──► CHECK 送信 ──► [ack 待ち] ──満了──► CLOSE(TKA_MISSING)
//!   │                                                   │
//!   └──────────────── ACK 受信（check_delay で再始動）───┘
//! ```

use toa_proto::opcode::response;
use toa_proto::{tka, CloseReason};

use crate::channel::ChannelIndex;
use crate::link::Link;
use crate::platform::TimerId;

impl Link {
    /// OPEN_CHANNEL 直後に既定値でキープアライブを始める
    pub(crate) fn start_default_keepalive(&mut self, idx: ChannelIndex) {
        let defaults = self.config().keepalive;
        let channel = self.channels_mut().get_mut(idx);
        channel.keepalive_enabled = true;
        channel.awaiting_ack = false;
        channel.check_delay = defaults.check_delay_secs;
        channel.ack_delay = defaults.ack_delay_secs;
        self.timer()
            .start(TimerId::KeepAlive(idx), defaults.start_delay_secs);
    }

    /// TKA コマンド（`payload[0]` がサブコマンド）
    pub(crate) fn keepalive_command(&mut self, idx: ChannelIndex, payload: &[u8]) {
        let Some((&sub, params)) = payload.split_first() else {
            return;
        };

        match sub {
            tka::CMD_CONFIG => self.keepalive_config(idx, params),
            tka::CMD_READ_CONFIG => self.send_keepalive_config(idx, tka::RSP_READ_CONFIG),
            tka::CMD_ACK => self.keepalive_ack(idx),
            other => {
                self.send_response(idx.cid(), response::TKA, &[tka::RSP_ERROR_UNSUPPORTED, other]);
            }
        }
    }

    /// キープアライブタイマー満了
    ///
    /// ack 待ちでなければ CHECK を送って ack_delay で再始動、
    /// ack 待ちのまま満了したらチャンネルを閉じる。
    pub(crate) fn keepalive_expired(&mut self, idx: ChannelIndex) {
        if idx.get() >= self.channels().len() {
            return;
        }
        let channel = self.channels().get(idx);
        if !channel.assigned || !channel.keepalive_enabled {
            // 取り消し済みのタイマーが遅れて届いた
            return;
        }

        let cid = idx.cid();
        if channel.awaiting_ack {
            let counters = self.counters_mut();
            counters.tka_closed_channel = counters.tka_closed_channel.wrapping_add(1);

            let channel = self.channels_mut().get_mut(idx);
            channel.keepalive_enabled = false;
            channel.awaiting_ack = false;
            log::warn!("keep-alive ack missing on channel {}", cid);
            self.close_channel(cid, CloseReason::KeepAliveMissing, &[]);
        } else {
            let ack_delay = channel.ack_delay;
            self.channels_mut().get_mut(idx).awaiting_ack = true;
            self.timer().start(TimerId::KeepAlive(idx), ack_delay);
            self.send_response(cid, response::TKA, &[tka::RSP_CHECK]);
        }
    }

    // ===== Private メソッド =====

    /// CONFIG: `[enable][check_delay LE32][ack_delay LE32]`
    fn keepalive_config(&mut self, idx: ChannelIndex, params: &[u8]) {
        let enable = match params.first() {
            Some(&enable) if params.len() >= tka::CONFIG_PARAMS_LEN && enable <= 1 => enable == 1,
            _ => {
                self.send_response(
                    idx.cid(),
                    response::TKA,
                    &[tka::RSP_ERROR_PARAMS, tka::CMD_CONFIG],
                );
                return;
            }
        };

        let channel = self.channels_mut().get_mut(idx);
        channel.keepalive_enabled = enable;
        channel.awaiting_ack = false;
        if enable {
            channel.check_delay = read_le32(&params[1..5]);
            channel.ack_delay = read_le32(&params[5..9]);
            let check_delay = channel.check_delay;
            self.timer().start(TimerId::KeepAlive(idx), check_delay);
        } else {
            self.timer().cancel(TimerId::KeepAlive(idx));
        }

        self.send_keepalive_config(idx, tka::RSP_CONFIG);
    }

    fn keepalive_ack(&mut self, idx: ChannelIndex) {
        let channel = self.channels_mut().get_mut(idx);
        if !channel.keepalive_enabled {
            return;
        }
        channel.awaiting_ack = false;
        let check_delay = channel.check_delay;
        self.timer().start(TimerId::KeepAlive(idx), check_delay);
    }

    /// `[sub][enabled][0 LE16][check_delay LE32][ack_delay LE32]`
    fn send_keepalive_config(&mut self, idx: ChannelIndex, sub: u8) {
        let channel = self.channels().get(idx);
        let check = channel.check_delay.to_le_bytes();
        let ack = channel.ack_delay.to_le_bytes();
        let rsp = [
            sub,
            u8::from(channel.keepalive_enabled),
            0,
            0,
            check[0],
            check[1],
            check[2],
            check[3],
            ack[0],
            ack[1],
            ack[2],
            ack[3],
        ];
        self.send_response(idx.cid(), response::TKA, &rsp);
    }
}

fn read_le32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
