use protocol::{ChunkSpec, Message, Settings};

use crate::link::Link;

/// Worker-side state (spec §3/§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Computing,
    Finished,
}

/// Cursor position within the chunk currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub col: u8,
    pub row: u8,
}

/// The worker-side state machine (spec §4.6). Owns installed settings,
/// the chunk currently in flight, its cursor, and the button-abort
/// flag; drives one pixel at a time through `step`.
pub struct Worker {
    state: WorkerState,
    settings: Option<Settings>,
    chunk: Option<ChunkSpec>,
    cursor: Cursor,
    abort_requested: bool,
    version: (u8, u8, u8),
}

/// One action the worker wants performed as a result of handling a
/// message or stepping the compute loop. The caller (main loop) is
/// responsible for actually encoding and writing these to the [`Link`];
/// keeping I/O out of `Worker` itself makes it unit-testable without a
/// real UART.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorkerAction {
    Reply(Message),
    /// Informational `ABORT` sent in addition to the `OK` reply (spec
    /// §4.6: "additionally send ABORT").
    ReplyThenNotify(Message, Message),
    SwitchBaud(u32),
    None,
}

impl Worker {
    pub fn new(version: (u8, u8, u8)) -> Self {
        Self {
            state: WorkerState::Idle,
            settings: None,
            chunk: None,
            cursor: Cursor::default(),
            abort_requested: false,
            version,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// The physical abort button's ISR calls this; it only sets a flag
    /// (spec §4.6, §5: "ISRs... never call into the FSM").
    pub fn request_abort(&mut self) {
        self.abort_requested = true;
    }

    /// Called once per main-loop iteration. If the button flag is set,
    /// aborts the in-flight chunk and returns the notification to send.
    pub fn poll_abort_button(&mut self) -> Option<Message> {
        if !self.abort_requested {
            return None;
        }
        self.abort_requested = false;
        if self.state != WorkerState::Idle {
            self.chunk = None;
            self.state = WorkerState::Idle;
            return Some(Message::Abort);
        }
        None
    }

    /// Handle one inbound message, returning what the caller should
    /// transmit in response, if anything.
    pub fn handle_message(&mut self, msg: Message) -> WorkerAction {
        match msg {
            Message::GetVersion => {
                let (major, minor, patch) = self.version;
                WorkerAction::Reply(Message::Version { major, minor, patch })
            }
            Message::SetCompute { .. } => {
                // Installation is atomic: the whole struct is replaced
                // in one assignment, so a concurrent read (there is
                // none on this single-threaded main loop, but the
                // invariant is spec-mandated) never observes a partial
                // settings value.
                if let Ok(settings) = Settings::try_from(msg) {
                    self.settings = Some(settings);
                }
                WorkerAction::Reply(Message::Ok)
            }
            Message::Compute { .. } => {
                if self.state != WorkerState::Idle {
                    return WorkerAction::None;
                }
                if let Ok(chunk) = ChunkSpec::try_from(msg) {
                    self.chunk = Some(chunk);
                    self.cursor = Cursor::default();
                    self.state = WorkerState::Computing;
                }
                WorkerAction::Reply(Message::Ok)
            }
            Message::Abort => {
                self.chunk = None;
                self.state = WorkerState::Idle;
                WorkerAction::ReplyThenNotify(Message::Ok, Message::Abort)
            }
            Message::Comm { baudrate, .. } => WorkerAction::SwitchBaud(baudrate),
            Message::ConnTest => WorkerAction::Reply(Message::ConnOk),
            _ => WorkerAction::None,
        }
    }

    /// Advance the steady-state Computing loop by exactly one pixel
    /// (spec §4.6). `kernel` is the external numerical collaborator:
    /// `iterations(point, c, max) -> u8`.
    pub fn step<K>(&mut self, kernel: K) -> Option<Message>
    where
        K: FnOnce(f32, f32, f32, f32, u8) -> u8,
    {
        if self.state != WorkerState::Computing {
            return None;
        }
        let (chunk, settings) = match (self.chunk, self.settings) {
            (Some(c), Some(s)) => (c, s),
            _ => return None,
        };

        let col = self.cursor.col;
        let row = self.cursor.row;
        let point_re = chunk.re + col as f32 * settings.d_re;
        let point_im = chunk.im - row as f32 * settings.d_im;
        let iter = kernel(point_re, point_im, settings.c_re, settings.c_im, settings.n);

        let out = Message::ComputeData { cid: chunk.cid, i_re: col, i_im: row, iter };

        self.cursor.col += 1;
        if self.cursor.col == chunk.n_re {
            self.cursor.col = 0;
            self.cursor.row += 1;
            if self.cursor.row == chunk.n_im {
                self.state = WorkerState::Finished;
            }
        }
        Some(out)
    }

    /// Once `step` has driven the cursor past the last pixel, collects
    /// the terminal `DONE` and returns to `Idle`.
    pub fn finish_if_done(&mut self) -> Option<Message> {
        if self.state == WorkerState::Finished {
            self.chunk = None;
            self.state = WorkerState::Idle;
            Some(Message::Done)
        } else {
            None
        }
    }

    pub fn boot_startup(id: [u8; 11]) -> Message {
        Message::Startup { id }
    }
}

/// Runs the `COMM` baud-renegotiation handshake (spec §4.6, §9's
/// ordering-hazard note): wait, switch, wait, then the caller replies
/// `OK`. Split out of `handle_message` because it needs the concrete
/// `Link` and a delay primitive, neither of which `Worker` itself owns.
pub fn perform_baud_switch<L: Link>(link: &mut L, rate: u32, delay_ms: impl Fn(u32)) {
    delay_ms(50);
    link.set_baud(rate);
    delay_ms(50);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_kernel(_re: f32, _im: f32, _c_re: f32, _c_im: f32, _n: u8) -> u8 {
        7
    }

    fn install(worker: &mut Worker) {
        worker.handle_message(Message::SetCompute {
            c_re: -0.4,
            c_im: 0.6,
            d_re: 0.01,
            d_im: 0.01,
            n: 10,
        });
        worker.handle_message(Message::Compute { cid: 0, re: -1.6, im: 1.1, n_re: 2, n_im: 2 });
    }

    #[test]
    fn get_version_replies_installed_version() {
        let mut worker = Worker::new((1, 2, 3));
        assert_eq!(
            worker.handle_message(Message::GetVersion),
            WorkerAction::Reply(Message::Version { major: 1, minor: 2, patch: 3 })
        );
    }

    #[test]
    fn compute_only_accepted_while_idle() {
        let mut worker = Worker::new((0, 0, 1));
        install(&mut worker);
        assert_eq!(worker.state(), WorkerState::Computing);
        // a second COMPUTE while busy is ignored, not re-armed
        let action = worker.handle_message(Message::Compute {
            cid: 1,
            re: 0.0,
            im: 0.0,
            n_re: 1,
            n_im: 1,
        });
        assert_eq!(action, WorkerAction::None);
        assert_eq!(worker.state(), WorkerState::Computing);
    }

    #[test]
    fn full_chunk_produces_pixel_order_then_done() {
        let mut worker = Worker::new((0, 0, 1));
        install(&mut worker);

        let mut pixels = vec![];
        while worker.state() == WorkerState::Computing {
            if let Some(Message::ComputeData { i_re, i_im, iter, .. }) = worker.step(test_kernel) {
                pixels.push((i_re, i_im, iter));
            }
        }
        assert_eq!(pixels, vec![(0, 0, 7), (1, 0, 7), (0, 1, 7), (1, 1, 7)]);
        assert_eq!(worker.finish_if_done(), Some(Message::Done));
        assert_eq!(worker.state(), WorkerState::Idle);
    }

    #[test]
    fn abort_command_replies_ok_then_notifies() {
        let mut worker = Worker::new((0, 0, 1));
        install(&mut worker);
        let action = worker.handle_message(Message::Abort);
        assert_eq!(action, WorkerAction::ReplyThenNotify(Message::Ok, Message::Abort));
        assert_eq!(worker.state(), WorkerState::Idle);
    }

    #[test]
    fn button_abort_mid_chunk_suppresses_further_pixels() {
        let mut worker = Worker::new((0, 0, 1));
        install(&mut worker);
        worker.step(test_kernel);
        worker.step(test_kernel);
        worker.request_abort();
        let notify = worker.poll_abort_button();
        assert_eq!(notify, Some(Message::Abort));
        assert_eq!(worker.state(), WorkerState::Idle);
        assert_eq!(worker.step(test_kernel), None);
    }

    #[test]
    fn conn_test_never_changes_state() {
        let mut worker = Worker::new((0, 0, 1));
        install(&mut worker);
        let before = worker.state();
        assert_eq!(worker.handle_message(Message::ConnTest), WorkerAction::Reply(Message::ConnOk));
        assert_eq!(worker.state(), before);
    }
}
