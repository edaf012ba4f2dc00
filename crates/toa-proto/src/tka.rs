//! TKA（キープアライブ）サブプロトコル
//!
//! ```text
//! コマンド (TKA payload[0]):
//!   CONFIG      0x01  [enable:1][check_delay LE32][ack_delay LE32]
//!   READ_CONFIG 0x02
//!   ACK         0x03
//!
//! 応答 (RSP_TKA payload[0]):
//!   CONFIG            0x01  [enabled][0 LE16][check_delay LE32][ack_delay LE32]
//!   READ_CONFIG       0x02  （CONFIG と同じ形式）
//!   CHECK             0x03
//!   ERROR_UNSUPPORTED 0x10  [command]
//!   ERROR_PARAMS      0x11  [command]
//! ```

pub const CMD_CONFIG: u8 = 0x01;
pub const CMD_READ_CONFIG: u8 = 0x02;
pub const CMD_ACK: u8 = 0x03;

pub const RSP_CONFIG: u8 = 0x01;
pub const RSP_READ_CONFIG: u8 = 0x02;
pub const RSP_CHECK: u8 = 0x03;
pub const RSP_ERROR_UNSUPPORTED: u8 = 0x10;
pub const RSP_ERROR_PARAMS: u8 = 0x11;

/// CONFIG の引数長（enable + check + ack）
pub const CONFIG_PARAMS_LEN: usize = 9;

/// 既定のチェック間隔（秒）
pub const DEFAULT_CHECK_DELAY_SECS: u32 = 17 * 60;

/// 既定の ACK 待ち時間（秒）
pub const DEFAULT_ACK_DELAY_SECS: u32 = 20;

/// OPEN_CHANNEL 直後、最初のチェックまでの待ち時間（秒）
pub const DEFAULT_START_DELAY_SECS: u32 = 5;
