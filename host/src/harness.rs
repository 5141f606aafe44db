use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use protocol::Message;

use crate::dispatcher::Dispatcher;
use crate::error::HostError;
use crate::frame_reader::HostFrameReader;
use crate::framebuffer_iface::Framebuffer;
use crate::heartbeat::HostHeartbeat;
use crate::kernel_iface::Kernel;
use crate::link::Link;
use crate::queue::{BoundedQueue, DEFAULT_HOST_QUEUE_CAPACITY};

/// Reader-thread read timeout (spec §5: "reader: blocks up to ~1s").
const READ_TIMEOUT: Duration = Duration::from_secs(1);
/// Display-thread redraw cadence (spec §5: fixed ~100 Hz).
const DISPLAY_PERIOD: Duration = Duration::from_millis(10);
/// Main-loop idle poll interval between queue drains and heartbeat
/// checks (spec §4.8).
const MAIN_POLL_PERIOD: Duration = Duration::from_millis(20);

fn now_ms(epoch: Instant) -> u64 {
    epoch.elapsed().as_millis() as u64
}

/// Owns the three cooperating threads described in spec §5: a reader
/// that only ever blocks on the link, a main thread that owns the
/// dispatcher and heartbeat state, and a display thread that redraws the
/// framebuffer at a fixed cadence. The queue, an `AtomicBool` quit flag,
/// and the link's own mutex are the only things shared across threads.
pub struct Harness<F: Framebuffer + Send + 'static> {
    link: Arc<Mutex<Box<dyn Link>>>,
    dispatcher: Dispatcher<F>,
    queue: Arc<BoundedQueue<Message>>,
    quit: Arc<AtomicBool>,
    epoch: Instant,
}

impl<F: Framebuffer + Send + 'static> Harness<F> {
    pub fn new(link: Arc<Mutex<Box<dyn Link>>>, dispatcher: Dispatcher<F>) -> Self {
        Self {
            link,
            dispatcher,
            queue: Arc::new(BoundedQueue::new(DEFAULT_HOST_QUEUE_CAPACITY)),
            quit: Arc::new(AtomicBool::new(false)),
            epoch: Instant::now(),
        }
    }

    /// Spawns the reader and display threads, then runs the main loop on
    /// the calling thread until `quit` is set or the link is declared
    /// dead. `on_tick` is polled once per main-loop iteration so a CLI
    /// front-end can inject UI commands (spec §6) without this harness
    /// depending on any particular input source.
    pub fn run<K: Kernel>(
        mut self,
        kernel: K,
        redraw: impl Fn(&Mutex<F>) + Send + 'static,
        framebuffer: Arc<Mutex<F>>,
        mut on_tick: impl FnMut(&mut Dispatcher<F>, &K) -> bool,
    ) -> Result<(), HostError> {
        let reader_handle = {
            let link = Arc::clone(&self.link);
            let queue = Arc::clone(&self.queue);
            let quit = Arc::clone(&self.quit);
            std::thread::spawn(move || reader_loop(link, queue, quit))
        };

        let display_handle = {
            let quit = Arc::clone(&self.quit);
            std::thread::spawn(move || display_loop(framebuffer, redraw, quit))
        };

        let mut heartbeat = HostHeartbeat::new(now_ms(self.epoch));
        let result = self.main_loop(&mut heartbeat, &kernel, &mut on_tick);

        self.quit.store(true, Ordering::SeqCst);
        let _ = reader_handle.join();
        let _ = display_handle.join();
        result
    }

    fn main_loop<K: Kernel>(
        &mut self,
        heartbeat: &mut HostHeartbeat,
        kernel: &K,
        on_tick: &mut impl FnMut(&mut Dispatcher<F>, &K) -> bool,
    ) -> Result<(), HostError> {
        loop {
            if self.quit.load(Ordering::SeqCst) {
                return Ok(());
            }

            while let Ok(msg) = self.queue.pop() {
                heartbeat.on_received(now_ms(self.epoch));
                self.dispatcher.handle_inbound(msg)?;
            }

            let now = now_ms(self.epoch);
            heartbeat.poll_probe(now, &self.link)?;
            heartbeat.check_dead(now)?;

            if !on_tick(&mut self.dispatcher, kernel) {
                return Ok(());
            }

            std::thread::sleep(MAIN_POLL_PERIOD);
        }
    }
}

fn reader_loop(
    link: Arc<Mutex<Box<dyn Link>>>,
    queue: Arc<BoundedQueue<Message>>,
    quit: Arc<AtomicBool>,
) {
    let mut frame_reader = HostFrameReader::new();
    while !quit.load(Ordering::SeqCst) {
        let byte = link.lock().unwrap().read_byte(READ_TIMEOUT);
        if let Some(b) = byte {
            frame_reader.feed_byte(b, &queue);
        }
    }
}

fn display_loop<F: Framebuffer>(
    framebuffer: Arc<Mutex<F>>,
    redraw: impl Fn(&Mutex<F>),
    quit: Arc<AtomicBool>,
) {
    while !quit.load(Ordering::SeqCst) {
        redraw(&framebuffer);
        std::thread::sleep(DISPLAY_PERIOD);
    }
}
