use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use protocol::{ChunkSpec, Message, Settings, MAX_MESSAGE_SIZE};
use rand::Rng;

use crate::error::HostError;
use crate::framebuffer_iface::Framebuffer;
use crate::kernel_iface::Kernel;
use crate::link::{Link, BAUD_SETTLE};

/// Host dispatcher state (spec §3/§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Idle,
    Starting,
    Computing,
    Aborting,
}

/// Chunk-selection policy (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Sequential,
    Random,
}

/// A rectangular grid of chunks covering one image, with a completion
/// bitmap (spec §3: "the host tracks per-chunk `done` bits").
pub struct ChunkGrid {
    chunks: Vec<ChunkSpec>,
    done: Vec<bool>,
}

impl ChunkGrid {
    /// Divides an `image_w x image_h` raster into `rows x cols` equal
    /// chunks, stepping from `(base_re, base_im)` by each chunk's pixel
    /// extent times the global `(d_re, d_im)` step.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rows: u8,
        cols: u8,
        image_w: u8,
        image_h: u8,
        base_re: f32,
        base_im: f32,
        d_re: f32,
        d_im: f32,
    ) -> Self {
        let chunk_w = image_w / cols.max(1);
        let chunk_h = image_h / rows.max(1);
        let mut chunks = Vec::with_capacity(rows as usize * cols as usize);
        let mut cid = 0u8;
        for row in 0..rows {
            for col in 0..cols {
                chunks.push(ChunkSpec {
                    cid,
                    re: base_re + col as f32 * chunk_w as f32 * d_re,
                    im: base_im - row as f32 * chunk_h as f32 * d_im,
                    n_re: chunk_w,
                    n_im: chunk_h,
                });
                cid += 1;
            }
        }
        let done = vec![false; chunks.len()];
        Self { chunks, done }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn spec(&self, cid: u8) -> Option<ChunkSpec> {
        self.chunks.get(cid as usize).copied()
    }

    pub fn is_done(&self, cid: u8) -> bool {
        self.done.get(cid as usize).copied().unwrap_or(true)
    }

    /// Monotone: only ever flips a bit 0 -> 1 (spec §8).
    pub fn mark_done(&mut self, cid: u8) {
        if let Some(slot) = self.done.get_mut(cid as usize) {
            *slot = true;
        }
    }

    pub fn reset(&mut self) {
        self.done.iter_mut().for_each(|d| *d = false);
    }

    pub fn finished(&self) -> bool {
        self.done.iter().all(|&d| d)
    }

    /// `Sequential` policy: lowest-index not-done chunk.
    pub fn first_not_done(&self) -> Option<u8> {
        self.done.iter().position(|&d| !d).map(|i| i as u8)
    }

    /// `Random` policy: first not-done chunk at or after a random
    /// starting index, wrapping.
    pub fn random_not_done(&self, start: usize) -> Option<u8> {
        let n = self.done.len();
        if n == 0 {
            return None;
        }
        (0..n).map(|offset| (start + offset) % n).find(|&i| !self.done[i]).map(|i| i as u8)
    }
}

/// The host-side coordinator (spec §4.5). Owns chunk-selection policy,
/// the completion bitmap, the currently in-flight chunk, and drives the
/// `Idle/Starting/Computing/Aborting` FSM from both UI-driven operations
/// and inbound messages.
pub struct Dispatcher<F: Framebuffer> {
    state: DispatcherState,
    grid: ChunkGrid,
    in_flight: Option<u8>,
    policy: Policy,
    settings: Settings,
    link: Arc<Mutex<Box<dyn Link>>>,
    framebuffer: Arc<Mutex<F>>,
    baud: u32,
    last_activity: Instant,
}

impl<F: Framebuffer> Dispatcher<F> {
    pub fn new(
        grid: ChunkGrid,
        policy: Policy,
        settings: Settings,
        link: Arc<Mutex<Box<dyn Link>>>,
        framebuffer: Arc<Mutex<F>>,
        baud: u32,
    ) -> Self {
        Self {
            state: DispatcherState::Idle,
            grid,
            in_flight: None,
            policy,
            settings,
            link,
            framebuffer,
            baud,
            last_activity: Instant::now(),
        }
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    pub fn finished(&self) -> bool {
        self.grid.finished()
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    fn send(&self, msg: Message) -> Result<(), HostError> {
        let mut buf = [0u8; MAX_MESSAGE_SIZE];
        let n = msg.encode(&mut buf)?;
        self.link.lock().unwrap().write_all(&buf[..n])
    }

    fn select_chunk(&self) -> Option<u8> {
        match self.policy {
            Policy::Sequential => self.grid.first_not_done(),
            Policy::Random => {
                let start = rand::thread_rng().gen_range(0..self.grid.chunk_count().max(1));
                self.grid.random_not_done(start)
            }
        }
    }

    /// UI operation: in `Idle` with unfinished chunks, install settings
    /// and dispatch the next chunk (spec §4.5). A no-op once
    /// `finished()`.
    pub fn start(&mut self) -> Result<(), HostError> {
        if self.state != DispatcherState::Idle {
            log::warn!("start() ignored: not idle");
            return Ok(());
        }
        if self.grid.finished() {
            return Ok(());
        }
        let Some(cid) = self.select_chunk() else { return Ok(()) };
        self.send(Message::from(self.settings))?;
        let spec = self.grid.spec(cid).expect("selected cid must exist");
        self.send(Message::from(spec))?;
        self.in_flight = Some(cid);
        self.state = DispatcherState::Starting;
        Ok(())
    }

    /// UI operation: abort the in-flight/starting chunk (spec §4.5).
    pub fn abort(&mut self) -> Result<(), HostError> {
        match self.state {
            DispatcherState::Computing | DispatcherState::Starting => {
                self.send(Message::Abort)?;
                self.state = DispatcherState::Aborting;
                Ok(())
            }
            _ => {
                log::warn!("abort() illegal in state {:?}", self.state);
                Err(HostError::IllegalStateForCommand)
            }
        }
    }

    /// UI operation: clear the completion bitmap. Only legal while
    /// `Idle` (spec §4.5).
    pub fn reset_chunks(&mut self) -> Result<(), HostError> {
        if self.state != DispatcherState::Idle {
            return Err(HostError::IllegalStateForCommand);
        }
        self.grid.reset();
        Ok(())
    }

    /// UI operation: renegotiate baud (spec §4.5, §8 scenario 5). Only
    /// legal while `Idle`.
    pub fn set_baud(&mut self, rate: u32) -> Result<(), HostError> {
        if self.state != DispatcherState::Idle {
            return Err(HostError::IllegalStateForCommand);
        }
        if !protocol::is_allowed_baud(rate) {
            return Err(HostError::IllegalStateForCommand);
        }
        self.send(Message::Comm { baudrate: rate, enable_burst: false })?;
        std::thread::sleep(BAUD_SETTLE);
        self.link.lock().unwrap().set_baud(rate)?;
        self.baud = rate;
        Ok(())
    }

    pub fn current_baud(&self) -> u32 {
        self.baud
    }

    /// UI operation: iterate every not-done chunk locally without any
    /// device round-trip (spec §4.5), for offline preview.
    pub fn local_compute(&mut self, kernel: &impl Kernel) -> Result<(), HostError> {
        if self.state != DispatcherState::Idle {
            return Err(HostError::IllegalStateForCommand);
        }
        let cids: Vec<u8> =
            (0..self.grid.chunk_count() as u8).filter(|&c| !self.grid.is_done(c)).collect();
        for cid in cids {
            let spec = self.grid.spec(cid).expect("cid from chunk_count range must exist");
            let mut fb = self.framebuffer.lock().unwrap();
            for row in 0..spec.n_im {
                for col in 0..spec.n_re {
                    let point_re = spec.re + col as f32 * self.settings.d_re;
                    let point_im = spec.im - row as f32 * self.settings.d_im;
                    let iter = kernel.iterations(
                        point_re,
                        point_im,
                        self.settings.c_re,
                        self.settings.c_im,
                        self.settings.n,
                    );
                    fb.set_chunk_pixel(cid, col, row, iter);
                }
            }
            fb.mark_chunk_done(cid);
            drop(fb);
            self.grid.mark_done(cid);
        }
        Ok(())
    }

    /// Dispatch one inbound message per spec §4.5's state table.
    pub fn handle_inbound(&mut self, msg: Message) -> Result<(), HostError> {
        self.last_activity = Instant::now();

        // STARTUP and CONN_TEST/VERSION are handled uniformly regardless
        // of state (spec §4.5's table shows them outside the
        // Idle/Starting/Computing/Aborting columns, and §4.7/§8 scenario
        // 4 confirm STARTUP's any-state -> Idle transition).
        match msg {
            Message::Startup { .. } => {
                log::info!("device rebooted, resetting to idle");
                self.in_flight = None;
                self.state = DispatcherState::Idle;
                return Ok(());
            }
            Message::Version { major, minor, patch } => {
                log::info!("device firmware version {major}.{minor}.{patch}");
                return Ok(());
            }
            Message::ConnTest => {
                return self.send(Message::ConnOk);
            }
            _ => {}
        }

        match (self.state, msg) {
            (DispatcherState::Idle, Message::Ok) => log::debug!("OK received while idle"),
            (DispatcherState::Idle, Message::ComputeData { .. }) => {}
            (DispatcherState::Idle, Message::Done) => {}
            (DispatcherState::Idle, Message::Abort) => log::warn!("unsolicited ABORT while idle"),
            (DispatcherState::Idle, Message::Error) => log::warn!("ERROR received while idle"),

            (DispatcherState::Starting, Message::Ok) => self.state = DispatcherState::Computing,
            (DispatcherState::Starting, Message::ComputeData { cid, i_re, i_im, iter }) => {
                self.write_pixel(cid, i_re, i_im, iter);
            }
            (DispatcherState::Starting, Message::Abort) => self.to_idle(),
            (DispatcherState::Starting, Message::Error) => self.to_idle(),

            (DispatcherState::Computing, Message::Ok) => log::debug!("OK received while computing"),
            (DispatcherState::Computing, Message::ComputeData { cid, i_re, i_im, iter }) => {
                self.write_pixel(cid, i_re, i_im, iter);
            }
            (DispatcherState::Computing, Message::Done) => {
                if let Some(cid) = self.in_flight {
                    self.grid.mark_done(cid);
                    self.framebuffer.lock().unwrap().mark_chunk_done(cid);
                }
                self.in_flight = None;
                if let Some(next) = self.select_chunk() {
                    self.send(Message::from(self.settings))?;
                    let spec = self.grid.spec(next).expect("selected cid must exist");
                    self.send(Message::from(spec))?;
                    self.in_flight = Some(next);
                    self.state = DispatcherState::Starting;
                } else {
                    self.state = DispatcherState::Idle;
                }
            }
            (DispatcherState::Computing, Message::Abort) => self.to_idle(),
            (DispatcherState::Computing, Message::Error) => self.to_idle(),

            (DispatcherState::Aborting, Message::Ok) => self.to_idle(),
            (DispatcherState::Aborting, Message::ComputeData { cid, i_re, i_im, iter }) => {
                // spec §5: in-flight pixels already on the wire are
                // still consumed and may still be written.
                self.write_pixel(cid, i_re, i_im, iter);
            }
            (DispatcherState::Aborting, Message::Done) => self.to_idle(),
            (DispatcherState::Aborting, Message::Abort) => self.to_idle(),
            (DispatcherState::Aborting, Message::Error) => self.to_idle(),

            (_, other) => log::debug!("{other:?} not handled in state {:?}", self.state),
        }
        Ok(())
    }

    fn write_pixel(&self, cid: u8, col: u8, row: u8, iter: u8) {
        self.framebuffer.lock().unwrap().set_chunk_pixel(cid, col, row, iter);
    }

    fn to_idle(&mut self) {
        self.in_flight = None;
        self.state = DispatcherState::Idle;
    }
}

/// Only `UnknownType`/checksum handling happens below the dispatcher;
/// this just documents the §4.7-mandated cadence the concurrency
/// harness enforces around `handle_inbound` for `CONN_TEST` replies.
pub const HEARTBEAT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer_iface::MemoryFramebuffer;
    use crate::link::loopback;

    fn dispatcher_with_loopback() -> (Dispatcher<MemoryFramebuffer>, loopback::LoopbackEnd) {
        let (host_end, device_end) = loopback::pair();
        let grid = ChunkGrid::new(2, 2, 4, 4, -1.6, 1.1, 0.01, 0.01);
        let settings =
            Settings { c_re: -0.4, c_im: 0.6, d_re: 0.01, d_im: 0.01, n: 10 };
        let fb = Arc::new(Mutex::new(MemoryFramebuffer::new(4, 4)));
        let link: Arc<Mutex<Box<dyn Link>>> = Arc::new(Mutex::new(Box::new(host_end)));
        let dispatcher = Dispatcher::new(grid, Policy::Sequential, settings, link, fb, 115_200);
        (dispatcher, device_end)
    }

    #[test]
    fn start_selects_lowest_index_chunk_and_moves_to_starting() {
        let (mut d, _device) = dispatcher_with_loopback();
        d.start().unwrap();
        assert_eq!(d.state(), DispatcherState::Starting);
        assert_eq!(d.in_flight, Some(0));
    }

    #[test]
    fn finished_makes_start_a_no_op() {
        let (mut d, _device) = dispatcher_with_loopback();
        for cid in 0..d.grid.chunk_count() as u8 {
            d.grid.mark_done(cid);
        }
        assert!(d.finished());
        d.start().unwrap();
        assert_eq!(d.state(), DispatcherState::Idle);
    }

    #[test]
    fn ok_in_starting_moves_to_computing() {
        let (mut d, _device) = dispatcher_with_loopback();
        d.start().unwrap();
        d.handle_inbound(Message::Ok).unwrap();
        assert_eq!(d.state(), DispatcherState::Computing);
    }

    #[test]
    fn done_marks_chunk_and_advances_to_next() {
        let (mut d, _device) = dispatcher_with_loopback();
        d.start().unwrap();
        d.handle_inbound(Message::Ok).unwrap();
        d.handle_inbound(Message::Done).unwrap();
        assert!(d.grid.is_done(0));
        assert_eq!(d.state(), DispatcherState::Starting);
        assert_eq!(d.in_flight, Some(1));
    }

    #[test]
    fn done_on_last_chunk_returns_to_idle() {
        let (mut d, _device) = dispatcher_with_loopback();
        for cid in 0..d.grid.chunk_count() as u8 - 1 {
            d.grid.mark_done(cid);
        }
        d.start().unwrap();
        let last = d.in_flight.unwrap();
        assert_eq!(last, d.grid.chunk_count() as u8 - 1);
        d.handle_inbound(Message::Ok).unwrap();
        d.handle_inbound(Message::Done).unwrap();
        assert_eq!(d.state(), DispatcherState::Idle);
        assert!(d.finished());
    }

    #[test]
    fn abort_mid_chunk_leaves_chunk_not_done() {
        let (mut d, _device) = dispatcher_with_loopback();
        d.start().unwrap();
        d.handle_inbound(Message::Ok).unwrap();
        d.handle_inbound(Message::ComputeData { cid: 0, i_re: 0, i_im: 0, iter: 1 }).unwrap();
        d.handle_inbound(Message::ComputeData { cid: 0, i_re: 1, i_im: 0, iter: 2 }).unwrap();
        d.abort().unwrap();
        assert_eq!(d.state(), DispatcherState::Aborting);
        d.handle_inbound(Message::Ok).unwrap();
        d.handle_inbound(Message::Abort).unwrap();
        assert_eq!(d.state(), DispatcherState::Idle);
        assert!(!d.grid.is_done(0));
    }

    #[test]
    fn startup_resets_to_idle_from_any_state() {
        let (mut d, _device) = dispatcher_with_loopback();
        d.start().unwrap();
        d.handle_inbound(Message::Ok).unwrap();
        assert_eq!(d.state(), DispatcherState::Computing);
        d.handle_inbound(Message::Startup { id: *b"JULIA-DEV01" }).unwrap();
        assert_eq!(d.state(), DispatcherState::Idle);
        assert_eq!(d.in_flight, None);
    }

    #[test]
    fn reset_chunks_only_legal_while_idle() {
        let (mut d, _device) = dispatcher_with_loopback();
        d.grid.mark_done(0);
        d.start().unwrap();
        assert!(matches!(d.reset_chunks(), Err(HostError::IllegalStateForCommand)));
        d.handle_inbound(Message::Ok).unwrap();
        d.handle_inbound(Message::Abort).unwrap();
        assert_eq!(d.state(), DispatcherState::Idle);
        d.reset_chunks().unwrap();
        assert!(!d.grid.is_done(0));
    }
}
