//! Console rendering of session events.

use std::io::Write;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::throughput::engine::TransferObserver;
use crate::throughput::{Direction, TransferProgress, TransferResult, BYTES_PER_MIB};

/// Minimum gap between two in-place progress redraws.
const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

/// Writes banners and in-place progress lines to `out`.
///
/// Write errors are ignored: the console is informational only.
pub struct ConsoleObserver<W: Write> {
    out: W,
    show_progress: bool,
    last_redraw: Option<Instant>,
    progress_drawn: bool,
}

impl<W: Write> ConsoleObserver<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            show_progress: true,
            last_redraw: None,
            progress_drawn: false,
        }
    }

    /// Keep banners but suppress progress lines.
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Render one progress line, without the leading carriage return.
pub fn progress_line(progress: &TransferProgress) -> String {
    let mb = progress.bytes_transferred as f64 / BYTES_PER_MIB as f64;
    match (progress.direction, progress.percentage(), progress.expected_bytes) {
        (Direction::Outbound, Some(pct), Some(total)) => format!(
            "Progress: {:.1}% ({} MB / {} MB) {:.1} MB/s",
            pct,
            progress.bytes_transferred / BYTES_PER_MIB,
            total / BYTES_PER_MIB,
            progress.current_speed_mbps()
        ),
        _ => format!(
            "{}: {:.1} MB {:.1} MB/s",
            match progress.direction {
                Direction::Inbound => "Received",
                Direction::Outbound => "Sent",
            },
            mb,
            progress.current_speed_mbps()
        ),
    }
}

impl<W: Write + Send> TransferObserver for ConsoleObserver<W> {
    fn on_listening(&mut self, addr: SocketAddr) {
        let _ = writeln!(self.out, "Server listening on {}, waiting for a client...", addr);
        let _ = self.out.flush();
    }

    fn on_connected(&mut self, peer: SocketAddr) {
        let _ = writeln!(self.out, "Connected to {}", peer);
        let _ = self.out.flush();
    }

    fn on_progress(&mut self, progress: &TransferProgress) {
        if !self.show_progress {
            return;
        }
        let done = progress.expected_bytes == Some(progress.bytes_transferred);
        let due = self
            .last_redraw
            .map_or(true, |at| at.elapsed() >= REDRAW_INTERVAL);
        if !(due || done) {
            return;
        }
        self.last_redraw = Some(Instant::now());
        self.progress_drawn = true;
        let _ = write!(self.out, "\r{}", progress_line(progress));
        let _ = self.out.flush();
    }

    fn on_finished(&mut self, result: &TransferResult) {
        if self.progress_drawn {
            let _ = writeln!(self.out);
            self.progress_drawn = false;
        }
        self.last_redraw = None;
        let _ = writeln!(
            self.out,
            "Transfer complete: {} bytes {}.",
            result.total_bytes(),
            result.direction().verb()
        );
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(direction: Direction, bytes: u64, expected: Option<u64>) -> TransferProgress {
        TransferProgress {
            direction,
            bytes_transferred: bytes,
            expected_bytes: expected,
            elapsed_secs: 1.0,
        }
    }

    #[test]
    fn test_progress_line_outbound() {
        let line = progress_line(&progress(
            Direction::Outbound,
            25 * 1_048_576,
            Some(100 * 1_048_576),
        ));
        assert_eq!(line, "Progress: 25.0% (25 MB / 100 MB) 25.0 MB/s");
    }

    #[test]
    fn test_progress_line_inbound() {
        let line = progress_line(&progress(Direction::Inbound, 1_572_864, None));
        assert_eq!(line, "Received: 1.5 MB 1.5 MB/s");
    }

    #[test]
    fn test_banners_and_throttled_progress() {
        let mut console = ConsoleObserver::new(Vec::new());
        console.on_listening("192.168.1.5:65432".parse().unwrap());
        console.on_connected("192.168.1.9:50000".parse().unwrap());
        for i in 1..=50u64 {
            console.on_progress(&progress(Direction::Inbound, i * 1000, None));
        }
        console.on_finished(&TransferResult::new(Direction::Inbound, 50_000, 1.0));

        let text = String::from_utf8(console.into_inner()).unwrap();
        assert!(text.contains("Server listening on 192.168.1.5:65432"));
        assert!(text.contains("Connected to 192.168.1.9:50000"));
        // Fifty back-to-back chunks collapse into a single redraw.
        assert_eq!(text.matches('\r').count(), 1);
        assert!(text.contains("Transfer complete: 50000 bytes received."));
    }

    #[test]
    fn test_final_outbound_chunk_always_drawn() {
        let mut console = ConsoleObserver::new(Vec::new());
        console.on_progress(&progress(Direction::Outbound, 10, Some(20)));
        console.on_progress(&progress(Direction::Outbound, 20, Some(20)));

        let text = String::from_utf8(console.into_inner()).unwrap();
        assert_eq!(text.matches('\r').count(), 2);
        assert!(text.ends_with("Progress: 100.0% (0 MB / 0 MB) 0.0 MB/s"));
    }

    #[test]
    fn test_without_progress_keeps_banners() {
        let mut console = ConsoleObserver::new(Vec::new()).without_progress();
        console.on_connected("10.0.0.1:1".parse().unwrap());
        console.on_progress(&progress(Direction::Inbound, 100, None));

        let text = String::from_utf8(console.into_inner()).unwrap();
        assert!(text.contains("Connected to 10.0.0.1:1"));
        assert!(!text.contains('\r'));
    }
}
