//! 外部コラボレーターのインターフェース
//!
//! BLE リンク・タイマー・乱数・アプリ側の認可判断はエンジンの外にある。
//! エンジンはここで定義したトレイトだけに依存し、具象実装は構築時に注入される。

use alloc::boxed::Box;

use toa_crypto::ACO_LEN;
use toa_proto::ErrorCode;

use crate::channel::ChannelIndex;
use crate::error::RandomError;

/// エンジンが使うタイマーの識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// リンク全体の認証タイムアウト
    Authentication,
    /// チャンネルごとのキープアライブ（check / ack 共用）
    KeepAlive(ChannelIndex),
}

impl TimerId {
    /// ハードウェアタイマーの番号（0 = 認証、1.. = キープアライブ）
    pub fn slot(&self) -> usize {
        match self {
            TimerId::Authentication => 0,
            TimerId::KeepAlive(idx) => 1 + idx.get(),
        }
    }
}

/// 送信側トランスポート（GATT 通知など）
pub trait Transport {
    /// MIC 付与済みフレームを送る。完了は `response_sent` で通知される
    fn send(&mut self, frame: &[u8]);

    /// リンクの切断を要求する
    fn disconnect(&mut self);
}

/// タイマーサービス
///
/// 同じ ID で `start` を呼んだら再始動として扱うこと。
pub trait Timer {
    fn start(&mut self, id: TimerId, secs: u32);
    fn cancel(&mut self, id: TimerId);
}

/// 乱数サービス
pub trait Random {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), RandomError>;
}

/// `getrandom` を使う既定の乱数サービス
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl Random for OsRandom {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), RandomError> {
        toa_crypto::random_bytes(buf).map_err(|_| RandomError)
    }
}

/// ASSOCIATE の拒否理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizeError {
    /// アプリ側の認可が必要（種別をアプリに返す）
    Denied { authorization_type: u8 },
    /// その他の失敗
    Failed(ErrorCode),
}

/// ASSOCIATE 時のアプリ側認可判断
pub trait Authorizer {
    fn associate(&mut self, aco: &[u8; ACO_LEN]) -> Result<(), AuthorizeError>;
}

/// エンジンに注入するコラボレーター一式
pub struct Platform {
    pub transport: Box<dyn Transport>,
    pub timer: Box<dyn Timer>,
    pub random: Box<dyn Random>,
    /// 未設定なら ASSOCIATE は常に許可
    pub authorizer: Option<Box<dyn Authorizer>>,
}

impl Platform {
    /// OS 乱数を使い、認可判断なしで組み立てる
    pub fn new(transport: Box<dyn Transport>, timer: Box<dyn Timer>) -> Self {
        Platform {
            transport,
            timer,
            random: Box::new(OsRandom),
            authorizer: None,
        }
    }

    pub fn with_random(mut self, random: Box<dyn Random>) -> Self {
        self.random = random;
        self
    }

    pub fn with_authorizer(mut self, authorizer: Box<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_slots() {
        assert_eq!(TimerId::Authentication.slot(), 0);
        assert_eq!(TimerId::KeepAlive(ChannelIndex::new(0)).slot(), 1);
        assert_eq!(TimerId::KeepAlive(ChannelIndex::new(7)).slot(), 8);
    }

    #[test]
    fn test_os_random() {
        let mut rng = OsRandom;
        let mut buf = [0u8; 16];
        rng.fill(&mut buf).unwrap();
        assert_ne!(buf, [0u8; 16]);
    }
}
