//! テスト用のプラットフォームとアプリ側ピア

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use toa_crypto::{
    device_auth, mic, session_key, AuthKey, Direction, SessionKey, RAND_A_LEN, RAND_T_LEN,
};
use toa_proto::opcode::{command, response};
use toa_proto::{Token, BROADCAST_CID, CONNECTIONLESS_CID, MIC_LEN};

use crate::config::{Credentials, EngineConfig};
use crate::engine::Engine;
use crate::error::RandomError;
use crate::platform::{Platform, Random, Timer, TimerId, Transport};

pub const AUTH_KEY: [u8; 16] = [0x5A; 16];
pub const TILE_ID: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];
pub const TOKEN: Token = [0xA1, 0xB2, 0xC3, 0xD4];
pub const RAND_A: [u8; RAND_A_LEN] = [0x11; RAND_A_LEN];

/// プラットフォーム側で観測できる状態
#[derive(Debug, Default)]
pub struct World {
    pub sent: Vec<Vec<u8>>,
    pub disconnects: usize,
    pub timers: Vec<(TimerId, u32)>,
    pub cancelled: Vec<TimerId>,
    pub random_fails: bool,
    pub random_counter: u8,
}

impl World {
    pub fn timer_running(&self, id: TimerId) -> Option<u32> {
        self.timers.iter().find(|(t, _)| *t == id).map(|(_, s)| *s)
    }
}

pub type Shared = Rc<RefCell<World>>;

struct MockTransport(Shared);

impl Transport for MockTransport {
    fn send(&mut self, frame: &[u8]) {
        self.0.borrow_mut().sent.push(frame.to_vec());
    }

    fn disconnect(&mut self) {
        self.0.borrow_mut().disconnects += 1;
    }
}

struct MockTimer(Shared);

impl Timer for MockTimer {
    fn start(&mut self, id: TimerId, secs: u32) {
        let mut world = self.0.borrow_mut();
        world.timers.retain(|(t, _)| *t != id);
        world.timers.push((id, secs));
    }

    fn cancel(&mut self, id: TimerId) {
        let mut world = self.0.borrow_mut();
        world.timers.retain(|(t, _)| *t != id);
        world.cancelled.push(id);
    }
}

/// 呼ばれるたびに 1 ずつ増える決定的な乱数
struct CountingRandom(Shared);

impl Random for CountingRandom {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), RandomError> {
        let mut world = self.0.borrow_mut();
        if world.random_fails {
            return Err(RandomError);
        }
        for b in buf.iter_mut() {
            world.random_counter = world.random_counter.wrapping_add(1);
            *b = world.random_counter;
        }
        Ok(())
    }
}

pub fn platform(world: &Shared) -> Platform {
    Platform::new(
        Box::new(MockTransport(world.clone())),
        Box::new(MockTimer(world.clone())),
    )
    .with_random(Box::new(CountingRandom(world.clone())))
}

/// 接続済み・送信可能なエンジン
pub fn connected_engine(config: EngineConfig) -> (Engine, Shared) {
    let world = Shared::default();
    let mut engine = Engine::new(
        config,
        Credentials::new(AUTH_KEY, TILE_ID),
        platform(&world),
    )
    .unwrap();
    engine.connected();
    engine.transport_ready(true);
    (engine, world)
}

/// 送信済みフレームを取り出し、送信完了を返して次を流す
pub fn drain(engine: &mut Engine, world: &Shared) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        let frames: Vec<Vec<u8>> = world.borrow_mut().sent.drain(..).collect();
        if frames.is_empty() {
            return out;
        }
        for frame in frames {
            out.push(frame);
            engine.response_sent();
        }
    }
}

/// アプリ側のチャンネル状態
pub struct AppChannel {
    pub cid: u8,
    pub key: SessionKey,
    pub nonce_a: u32,
    pub nonce_t: u32,
}

impl AppChannel {
    /// コマンドに MIC を付けたフレーム
    pub fn frame(&mut self, opcode: u8, payload: &[u8]) -> Vec<u8> {
        self.nonce_a += 1;
        let mut body = alloc::vec![opcode];
        body.extend_from_slice(payload);
        let m = mic(&self.key, self.nonce_a, Direction::AppToDevice, &body);
        let mut frame = alloc::vec![self.cid];
        frame.extend_from_slice(&body);
        frame.extend_from_slice(&m);
        frame
    }

    /// デバイス発フレームの MIC を検証して `[opcode][payload]` を返す
    pub fn open(&mut self, frame: &[u8]) -> Vec<u8> {
        assert_eq!(frame[0], self.cid, "CID が一致すること");
        let body = &frame[1..frame.len() - MIC_LEN];
        self.nonce_t += 1;
        let expected = mic(&self.key, self.nonce_t, Direction::DeviceToApp, body);
        assert_eq!(&frame[frame.len() - MIC_LEN..], &expected, "デバイスの MIC が正しいこと");
        body.to_vec()
    }
}

pub fn open_channel_frame() -> Vec<u8> {
    let mut frame = alloc::vec![CONNECTIONLESS_CID];
    frame.extend_from_slice(&TOKEN);
    frame.push(command::OPEN_CHANNEL);
    frame.extend_from_slice(&RAND_A);
    frame
}

/// OPEN_CHANNEL 応答からアプリ側のセッションを組み立てる
pub fn app_channel_from(rsp: &[u8]) -> AppChannel {
    assert_eq!(rsp[0], CONNECTIONLESS_CID);
    assert_eq!(&rsp[1..5], &TOKEN);
    assert_eq!(rsp[5], response::OPEN_CHANNEL);
    let cid = rsp[6];
    let rand_t: [u8; RAND_T_LEN] = rsp[7..7 + RAND_T_LEN].try_into().unwrap();
    AppChannel {
        cid,
        key: session_key(&AuthKey::new(AUTH_KEY), &RAND_A, &rand_t, cid, &TOKEN),
        nonce_a: 0,
        nonce_t: 0,
    }
}

/// チャンネルを開き、READY で認証まで済ませる
pub fn open_authenticated(engine: &mut Engine, world: &Shared) -> AppChannel {
    engine.command_received(&open_channel_frame());
    let frames = drain(engine, world);
    let mut app = app_channel_from(frames.last().unwrap());
    let ready = app.frame(command::READY, &[0x00, 0x00]);
    engine.command_received(&ready);
    let frames = drain(engine, world);
    let rsp = app.open(frames.last().unwrap());
    assert_eq!(rsp[0], response::READY);
    app
}

pub fn sres(rand_t: &[u8; 10]) -> [u8; 4] {
    device_auth(&AuthKey::new(AUTH_KEY), &RAND_A, rand_t).sres_t
}

pub fn is_broadcast(frame: &[u8]) -> bool {
    frame.first() == Some(&BROADCAST_CID)
}
