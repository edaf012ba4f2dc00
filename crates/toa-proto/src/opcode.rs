//! TOA オペコード
//!
//! 応答オペコードは対応するコマンドと同じ値を使う。
//! エラー応答と AUTHORIZED 通知だけは専用の値を持つ。

/// アプリ → デバイス のコマンド
pub mod command {
    pub const READY: u8 = 0x01;
    pub const TOFU_CTL: u8 = 0x02;
    pub const TOFU_DATA: u8 = 0x03;
    pub const TKA: u8 = 0x04;
    pub const TDT: u8 = 0x05;
    pub const SONG: u8 = 0x06;
    pub const ADV_INT: u8 = 0x07;
    pub const TDG: u8 = 0x08;
    pub const TMD: u8 = 0x09;
    pub const TCU: u8 = 0x0A;
    pub const TIME: u8 = 0x0B;
    pub const TEST: u8 = 0x0C;
    pub const TPC: u8 = 0x0D;
    pub const TRM: u8 = 0x0E;

    // コネクションレス
    pub const OPEN_CHANNEL: u8 = 0x10;
    pub const CLOSE_CHANNEL: u8 = 0x11;
    pub const AUTHENTICATE: u8 = 0x12;
    pub const ASSOCIATE: u8 = 0x13;
    pub const TDI: u8 = 0x14;
    pub const TMF: u8 = 0x15;
}

/// デバイス → アプリ の応答
pub mod response {
    pub const READY: u8 = super::command::READY;
    pub const TOFU_CTL: u8 = super::command::TOFU_CTL;
    pub const TKA: u8 = super::command::TKA;
    pub const OPEN_CHANNEL: u8 = super::command::OPEN_CHANNEL;
    pub const CLOSE_CHANNEL: u8 = super::command::CLOSE_CHANNEL;
    pub const AUTHENTICATE: u8 = super::command::AUTHENTICATE;
    pub const ASSOCIATE: u8 = super::command::ASSOCIATE;

    /// エラー応答: `[error_code][command](param)`
    pub const ERROR: u8 = 0x20;
    /// アプリ側認可の通知: `[type][time LE16]`
    pub const AUTHORIZED: u8 = 0x21;
}
