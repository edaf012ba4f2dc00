//! 再開コンテキスト
//!
//! チャンネルをまたいで残る転送の進捗。EXIT(INIT) やチャンネル解放では消えず、
//! EXIT(CLEAR)・終端エラー・転送完了でだけ消える。

use toa_crypto::ImageHasher;
use toa_proto::tofu::{CODE_SIZE_RANGE, HEADER_LEN, VERSION_LEN, VERSION_RANGE};
use toa_proto::{ErrorCode, ImageHeader, ProtoError};

/// 転送の進捗とハッシュ計算の途中状態
#[derive(Clone)]
pub struct TransferContext {
    /// 検証済みバイト数（次に受け取るブロックのイメージ内位置）
    pub(crate) offset: u32,
    /// RESUME で宣言されたイメージ長（ヘッダー込み）
    pub(crate) image_len: u32,
    pub(crate) version: [u8; VERSION_LEN],
    /// ヘッダーから取り出した期待ハッシュ
    pub(crate) hash: [u8; 32],
    pub(crate) signature: [u8; 64],
    hasher: ImageHasher,
}

impl Default for TransferContext {
    fn default() -> Self {
        TransferContext {
            offset: 0,
            image_len: 0,
            version: [0; VERSION_LEN],
            hash: [0; 32],
            signature: [0; 64],
            hasher: ImageHasher::default(),
        }
    }
}

impl TransferContext {
    /// 同じバージョン・同じ長さでブロック境界から続きを受け取れるか
    pub fn is_continuation(&self, version: &[u8; VERSION_LEN], image_len: u32, block_len: u32) -> bool {
        self.offset != 0
            && self.offset % block_len == 0
            && &self.version == version
            && self.image_len == image_len
    }

    /// 新しい転送として初期化する
    pub fn start(&mut self, version: [u8; VERSION_LEN], image_len: u32) {
        *self = TransferContext {
            version,
            image_len,
            ..TransferContext::default()
        };
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn image_len(&self) -> u32 {
        self.image_len
    }

    pub fn version(&self) -> &[u8; VERSION_LEN] {
        &self.version
    }

    /// 最初のブロック（CRC 除去済み）を検証してハッシュに取り込む
    ///
    /// ハッシュ対象はヘッダーの code_size と version、それにヘッダー以降のバイト。
    pub fn absorb_first_block(&mut self, block: &[u8]) -> Result<(), ErrorCode> {
        let header = ImageHeader::parse(block).map_err(|e| match e {
            ProtoError::BadMagic(_) => ErrorCode::ImageHeader,
            _ => ErrorCode::DataLength,
        })?;

        if self.image_len as usize != header.code_size as usize + HEADER_LEN {
            return Err(ErrorCode::InvalidSize);
        }
        if header.version != self.version {
            return Err(ErrorCode::ImageHeader);
        }
        self.hash = header.hash;
        self.signature = header.signature;
        if header.code_size == 0 {
            return Err(ErrorCode::InvalidSize);
        }

        self.hasher.update(&block[CODE_SIZE_RANGE]);
        self.hasher.update(&block[VERSION_RANGE]);
        self.hasher.update(&block[HEADER_LEN..]);
        Ok(())
    }

    /// 2 番目以降のブロックをハッシュに取り込む
    pub fn absorb(&mut self, block: &[u8]) {
        self.hasher.update(block);
    }

    /// 検証済みブロックの分だけ進める
    pub fn advance(&mut self, len: usize) {
        self.offset = self.offset.saturating_add(len as u32);
    }

    pub fn is_complete(&self) -> bool {
        self.offset >= self.image_len
    }

    /// ハッシュを確定し、ヘッダーの値と比較する
    ///
    /// 成功時は署名検証に使うハッシュを返す。
    pub fn finish(&mut self) -> Result<[u8; 32], ErrorCode> {
        let hash = core::mem::take(&mut self.hasher).finalize();
        if hash == self.hash {
            Ok(hash)
        } else {
            Err(ErrorCode::Hash)
        }
    }

    pub fn signature(&self) -> &[u8; 64] {
        &self.signature
    }
}
