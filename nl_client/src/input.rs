//! The input-producer context.
//!
//! An [`InputProducer`] runs on its own thread, reads packet lines from a
//! blocking reader, and pushes each parsed packet into the connection's
//! [`OutboundQueue`]. Lines that fail to parse are reported on the prompt
//! writer and the prompt repeats.

use std::{
    io::{self, BufRead, Write},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{debug, warn};
use netlib::OutboundQueue;

use crate::commands::parse_packet_line;

pub const PROMPT: &str = "Packet Input: ";

const SHUTDOWN_POLL: Duration = Duration::from_millis(10);

/// Handle to a running input thread.
pub struct InputProducer {
    stopped: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl InputProducer {
    /// Start reading lines from `reader` on a new thread.
    ///
    /// Each prompt and parse failure is written to `prompt`. Parsed packets
    /// are stamped with `version` and pushed onto `queue` in input order.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn<R, W>(reader: R, prompt: W, queue: OutboundQueue, version: u8) -> io::Result<Self>
    where
        R: BufRead + Send + 'static,
        W: Write + Send + 'static,
    {
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = stopped.clone();
        let handle = thread::Builder::new()
            .name("input".to_string())
            .spawn(move || read_lines(reader, prompt, &queue, version, &flag))?;
        Ok(Self {
            stopped,
            handle: Some(handle),
        })
    }

    /// Ask the thread to exit after the line it is currently reading.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop the thread and join it if it exits within `grace`.
    ///
    /// A thread blocked on a read that never returns cannot be interrupted;
    /// it is detached instead and ends with the process. Returns whether the
    /// thread was joined.
    pub fn shutdown(mut self, grace: Duration) -> bool {
        self.stop();
        let deadline = Instant::now() + grace;
        while !self.is_finished() && Instant::now() < deadline {
            thread::sleep(SHUTDOWN_POLL);
        }
        if !self.is_finished() {
            debug!("input thread still blocked on read, detaching");
            return false;
        }
        if let Some(Err(_)) = self.handle.take().map(JoinHandle::join) {
            warn!("input thread panicked");
        }
        true
    }
}

fn read_lines<R: BufRead, W: Write>(
    mut reader: R,
    mut prompt: W,
    queue: &OutboundQueue,
    version: u8,
    stopped: &AtomicBool,
) {
    let mut line = String::new();
    while !stopped.load(Ordering::SeqCst) {
        write_prompt(&mut prompt, format_args!("{PROMPT}"));

        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => {
                debug!("end of input");
                break;
            }
            Ok(_) => {}
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => {
                warn!("failed to read input: {error}");
                break;
            }
        }
        if stopped.load(Ordering::SeqCst) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        match parse_packet_line(&line, version) {
            Ok(packet) => {
                debug!("queued packet of type {}", packet.kind);
                queue.push(packet);
            }
            Err(error) => write_prompt(&mut prompt, format_args!("{error}\n")),
        }
    }
}

fn write_prompt<W: Write>(prompt: &mut W, text: std::fmt::Arguments<'_>) {
    if let Err(error) = prompt.write_fmt(text).and_then(|()| prompt.flush()) {
        debug!("failed to write prompt: {error}");
    }
}
