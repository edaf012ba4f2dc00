//! # toa-engine
//!
//! TOA（Tile Over-the-Air）プロトコルのデバイス側チャンネルエンジン。
//!
//! BLE リンク 1 本の上に、MIC で保護されたセッションチャンネルを最大 8 本多重化する。
//!
//! ## チャンネル確立
//!
//! ```text
//! App                                   Device
//!  │ [0][token][OPEN_CHANNEL][randA:14]   │
//!  │ ───────────────────────────────────► │  randT = fixed[10] ‖ rand[3]
//!  │                                      │  key   = HMAC(auth, randA‖randT‖cid‖token)
//!  │ [0][token][OPEN_CHANNEL][cid][randT] │
//!  │ ◄─────────────────────────────────── │
//!  │ [cid][READY][..][mic]                │  最初の正しい MIC で認証済みになる
//!  │ ───────────────────────────────────► │
//!  │ [cid][READY][mps][caps:3][bnonce][mic]
//!  │ ◄─────────────────────────────────── │
//! ```
//!
//! ## 構成
//!
//! - `Link`: チャンネルテーブル・ブロードキャスト鍵・応答キューを持つリンク状態
//! - `Engine`: プラットフォームイベントの入口とオペコードのディスパッチ
//! - `FeatureHandler`: TOFU などの上位機能を差し込むトレイト
//! - `platform`: トランスポート・タイマー・乱数・認可判断の抽象

#![no_std]
extern crate alloc;

pub mod channel;
pub mod config;
pub mod counters;
pub mod engine;
pub mod error;
pub mod feature;
mod keepalive;
pub mod link;
pub mod platform;

#[cfg(test)]
mod testing;

pub use channel::{Channel, ChannelIndex, ChannelTable};
pub use config::{Credentials, EngineConfig, KeepAliveConfig};
pub use counters::Counters;
pub use engine::Engine;
pub use error::{EngineError, RandomError};
pub use feature::{FeatureHandler, FeatureRegistry};
pub use link::Link;
pub use platform::{
    AuthorizeError, Authorizer, OsRandom, Platform, Random, Timer, TimerId, Transport,
};

pub use toa_proto::{CloseReason, ErrorCode, Feature, Token};
