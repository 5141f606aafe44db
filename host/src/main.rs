use std::io::{self, Read};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use host::cli::{Cli, Command, HELP_TEXT};
use host::dispatcher::{ChunkGrid, Dispatcher};
use host::framebuffer_iface::MemoryFramebuffer;
use host::kernel_iface::EscapeTimeKernel;
use host::link::{Link, SerialLink};
use host::{Harness, HostError};
use protocol::Settings;

const READ_TIMEOUT: Duration = Duration::from_secs(1);

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let port = SerialLink::open(&cli.port, cli.baud, READ_TIMEOUT)
        .with_context(|| format!("opening serial port {}", cli.port))?;
    let link: Arc<Mutex<Box<dyn Link>>> = Arc::new(Mutex::new(Box::new(port)));

    let grid = ChunkGrid::new(
        cli.chunk_rows,
        cli.chunk_cols,
        cli.image_size,
        cli.image_size,
        -1.6,
        1.1,
        0.01,
        0.01,
    );
    let settings = Settings { c_re: -0.4, c_im: 0.6, d_re: 0.01, d_im: 0.01, n: 100 };
    let framebuffer = Arc::new(Mutex::new(MemoryFramebuffer::new(
        cli.image_size as u32,
        cli.image_size as u32,
    )));
    let dispatcher = Dispatcher::new(
        grid,
        cli.policy.into(),
        settings,
        Arc::clone(&link),
        Arc::clone(&framebuffer),
        cli.baud,
    );

    println!("{HELP_TEXT}");
    let commands = Arc::new(Mutex::new(std::collections::VecDeque::new()));
    spawn_stdin_reader(Arc::clone(&commands));

    let harness = Harness::new(link, dispatcher);
    let kernel = EscapeTimeKernel;
    let result = harness.run(kernel, |_fb| {}, framebuffer, move |dispatcher, kernel| {
        while let Some(cmd) = commands.lock().unwrap().pop_front() {
            match cmd {
                Command::Help => println!("{HELP_TEXT}"),
                Command::Quit | Command::ForceQuit => return false,
                Command::Go => log_err(dispatcher.start()),
                Command::Abort => log_err(dispatcher.abort()),
                Command::ClearChunks => log_err(dispatcher.reset_chunks()),
                Command::ResetDevice => {}
                Command::TogglePolicy => {}
                Command::Info => {
                    println!(
                        "state={:?} baud={} finished={}",
                        dispatcher.state(),
                        dispatcher.current_baud(),
                        dispatcher.finished()
                    );
                }
                Command::LocalCompute => log_err(dispatcher.local_compute(kernel)),
                Command::ExportFramebuffer => {}
                Command::CycleBaud => {}
                Command::ToggleVerbose => {}
                Command::FullRecompute => {
                    log_err(dispatcher.reset_chunks());
                    log_err(dispatcher.start());
                }
            }
        }
        true
    });

    match result {
        Ok(()) => Ok(()),
        Err(HostError::LinkDead(secs)) => {
            anyhow::bail!("link declared dead after {secs}s of silence")
        }
        Err(e) => Err(e.into()),
    }
}

fn log_err(result: Result<(), HostError>) {
    if let Err(e) = result {
        log::warn!("command rejected: {e}");
    }
}

fn spawn_stdin_reader(commands: Arc<Mutex<std::collections::VecDeque<Command>>>) {
    std::thread::spawn(move || {
        let mut byte = [0u8; 1];
        let mut stdin = io::stdin();
        loop {
            if stdin.read(&mut byte).unwrap_or(0) == 0 {
                return;
            }
            if let Some(cmd) = Command::from_char(byte[0] as char) {
                commands.lock().unwrap().push_back(cmd);
            }
        }
    });
}
