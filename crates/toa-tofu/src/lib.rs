//! # toa-tofu
//!
//! TOFU（Tile Over-the-air Firmware Update）の受信側。
//!
//! TOA エンジンの機能ハンドラーとして登録され、TOFU_CTL / TOFU_DATA を処理する。
//! イメージはブロック単位で届き、ブロックごとに CRC16 を検証してから
//! アプリケーションに書き込みを依頼する。
//!
//! ## 転送の流れ
//!
//! ```text
//! App                                         Device
//!  │ TOFU_CTL RESUME [version][len]             │
//!  │ ─────────────────────────────────────────► │  begin()
//!  │ RSP_TOFU_CTL RESUME_READY [block_len][off] │
//!  │ ◄───────────────────────────────────────── │
//!  │ TOFU_DATA × n（block_len + CRC16）          │
//!  │ ─────────────────────────────────────────► │  block_ready(off, block)
//!  │                                            │  ... block_done(Ok)
//!  │ RSP_TOFU_CTL BLOCK_OK                      │
//!  │ ◄───────────────────────────────────────── │
//!  │                   ...                      │
//!  │                                            │  hash / 署名検証 → complete()
//!  │ RSP_TOFU_CTL IMAGE_OK                      │  ... complete_done(Ok)
//!  │ ◄───────────────────────────────────────── │
//! ```
//!
//! イメージハッシュは SHA-256(code_size LE32 ‖ version ‖ code)。
//! ヘッダーの署名（secp256k1 ECDSA）を設定済みの公開鍵で検証する。

#![no_std]
extern crate alloc;

pub mod app;
pub mod config;
pub mod engine;
pub mod error;
pub mod session;

pub use app::TofuApp;
pub use config::{TofuConfig, DEFAULT_BLOCK_LEN, MAX_BLOCK_LEN};
pub use engine::{TofuEngine, TofuState, MIN_IMAGE_LEN};
pub use error::TofuError;
pub use session::TransferContext;
