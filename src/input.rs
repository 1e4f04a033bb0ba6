use crate::state::messages::PageEvent;
use log::{debug, warn};
use std::io::{self, BufRead, BufReader, Read};
use std::thread;
use tokio::sync::mpsc;

/// Read page events from stdin on a plain thread. A blocked read never holds
/// up runtime shutdown; the thread simply dies with the process.
pub fn spawn_stdin_events(events: mpsc::Sender<PageEvent>) -> io::Result<thread::JoinHandle<()>> {
    spawn_reader(io::stdin(), events)
}

pub fn spawn_reader<R>(input: R, events: mpsc::Sender<PageEvent>) -> io::Result<thread::JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("page-events".into())
        .spawn(move || read_events(BufReader::new(input), &events))
}

/// One command per line. End of input only stops this reader; the loop keeps
/// running on its timer.
fn read_events(input: impl BufRead, events: &mpsc::Sender<PageEvent>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("failed to read stdin: {e}");
                return;
            }
        };
        let Some(event) = PageEvent::parse(&line) else {
            if !line.trim().is_empty() {
                warn!("unknown command {:?} (try visible, hidden, online, offline, refresh, quit)", line.trim());
            }
            continue;
        };
        if events.blocking_send(event).is_err() {
            return;
        }
    }
    debug!("stdin closed");
}

/// Ctrl-C unloads the page.
pub async fn unload_on_ctrl_c(events: mpsc::Sender<PageEvent>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        let _ = events.send(PageEvent::Unload).await;
    }
}
