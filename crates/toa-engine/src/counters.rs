//! 診断カウンター

use serde::Serialize;

/// エンジンの累積カウンター
///
/// 再接続ではリセットされない。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    /// READY を受信した回数
    pub channel_open: u32,
    /// AUTHENTICATE を処理した回数
    pub authenticate: u32,
    /// MIC 検証失敗
    pub mic_failure: u32,
    /// 認証前（初回）の MIC 検証失敗
    pub auth_failure: u32,
    /// キープアライブ応答なしで閉じたチャンネル
    pub tka_closed_channel: u32,
    /// 認証タイムアウトによる切断
    pub auth_disconnect: u32,
    /// キュー溢れで破棄した応答
    pub dropped_response: u32,
}
