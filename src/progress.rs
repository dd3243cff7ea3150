//! Progress indicator shown while a query turn waits on the network.
//!
//! A [`Spinner`] owns one background tokio task that redraws a
//! `Loading |` frame until told to stop. The stop signal is a
//! `watch` channel whose only sender lives in the `Spinner`, and
//! [`Spinner::stop`] awaits the task, so once it returns the terminal is
//! free for other output.
//!
//! Output goes to **stderr** and is disabled when stderr is not a TTY.

use std::io::Write;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

const FRAMES: [char; 4] = ['|', '/', '-', '\\'];
const FRAME_INTERVAL: Duration = Duration::from_millis(100);
const CLEAR: &str = "\r          \r";

pub struct Spinner {
    stop_tx: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl Spinner {
    /// Start drawing to `out`, one frame per `interval`.
    pub fn start<W>(out: W, interval: Duration) -> Self
    where
        W: Write + Send + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(animate(out, interval, stop_rx));
        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// A spinner that draws nothing.
    pub fn disabled() -> Self {
        Self {
            stop_tx: None,
            handle: None,
        }
    }

    /// Spinner on stderr when it is a terminal, otherwise disabled.
    pub fn stderr() -> Self {
        if atty::is(atty::Stream::Stderr) {
            Self::start(std::io::stderr(), FRAME_INTERVAL)
        } else {
            Self::disabled()
        }
    }

    /// Signal the task and wait for it to clear the line and exit.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(true);
        }
    }
}

async fn animate<W: Write>(mut out: W, interval: Duration, mut stop_rx: watch::Receiver<bool>) {
    for frame in FRAMES.iter().cycle() {
        if *stop_rx.borrow() {
            break;
        }
        let _ = write!(out, "\rLoading {}", frame);
        let _ = out.flush();

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = stop_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    let _ = out.write_all(CLEAR.as_bytes());
    let _ = out.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn draws_frames_until_stopped() {
        let buf = SharedBuf::default();
        let spinner = Spinner::start(buf.clone(), Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(40)).await;
        spinner.stop().await;

        let out = buf.contents();
        assert!(out.contains("\rLoading |"));
        assert!(out.contains("Loading /"));
        assert!(out.ends_with(CLEAR));
    }

    #[tokio::test]
    async fn no_output_after_stop() {
        let buf = SharedBuf::default();
        let spinner = Spinner::start(buf.clone(), Duration::from_millis(2));
        tokio::time::sleep(Duration::from_millis(15)).await;
        spinner.stop().await;

        let len_at_stop = buf.contents().len();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(buf.contents().len(), len_at_stop);
    }

    #[tokio::test]
    async fn stop_right_after_start() {
        let buf = SharedBuf::default();
        Spinner::start(buf.clone(), Duration::from_secs(60))
            .stop()
            .await;
        assert!(buf.contents().ends_with(CLEAR));
    }

    #[tokio::test]
    async fn disabled_spinner_stops_immediately() {
        Spinner::disabled().stop().await;
    }
}
