//! Interactive role-selection menu.
//!
//! Loops until the user picks exit or input ends. Bad input re-prompts;
//! failed sessions print a diagnostic and return to the menu.

use std::io::{self, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::config::{self, ConfigError, ProbeConfig};
use crate::console::ConsoleObserver;
use crate::session::{Orchestrator, SessionConfig, SessionError};
use crate::throughput::report::format_report;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Server,
    Client,
    Exit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Self::Server),
            "2" => Some(Self::Client),
            "3" => Some(Self::Exit),
            _ => None,
        }
    }
}

pub struct Menu<R, W> {
    input: R,
    output: W,
    config: ProbeConfig,
    orchestrator: Orchestrator,
    show_progress: bool,
}

impl<R, W> Menu<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write + Send,
{
    pub fn new(input: R, output: W, config: ProbeConfig) -> Self {
        Self {
            input,
            output,
            config,
            orchestrator: Orchestrator::new(),
            show_progress: true,
        }
    }

    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Run the menu loop. Only console I/O errors escape.
    pub async fn run(&mut self) -> io::Result<()> {
        loop {
            self.print_menu()?;
            let Some(line) = self.prompt("Enter your choice (1-3): ").await? else {
                break;
            };

            match MenuChoice::parse(&line) {
                Some(MenuChoice::Server) => {
                    let Some(port) = self.prompt_port("Enter the listening port").await? else {
                        break;
                    };
                    let session = SessionConfig::server(&self.config).map(|s| s.with_port(port));
                    self.start(session).await?;
                }
                Some(MenuChoice::Client) => {
                    let Some((host, port, payload_bytes)) = self.prompt_client().await? else {
                        break;
                    };
                    let session = SessionConfig::client(&self.config, &host, payload_bytes)
                        .map(|s| s.with_port(port));
                    self.start(session).await?;
                }
                Some(MenuChoice::Exit) => break,
                None => writeln!(self.output, "Invalid choice, please try again.")?,
            }
        }

        self.orchestrator.terminate();
        writeln!(self.output, "Goodbye.")?;
        self.output.flush()
    }

    fn print_menu(&mut self) -> io::Result<()> {
        writeln!(self.output)?;
        writeln!(self.output, "--- LAN Speed Test (with Gigabit evaluation) ---")?;
        writeln!(self.output, "Select a mode:")?;
        writeln!(self.output, "1. Server (wait for a connection)")?;
        writeln!(self.output, "2. Client (connect and send data)")?;
        writeln!(self.output, "3. Exit")
    }

    /// Print `text` and read one line. `None` at end of input.
    async fn prompt(&mut self, text: &str) -> io::Result<Option<String>> {
        write!(self.output, "{}", text)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line))
    }

    /// Ask for a port until one parses. Blank keeps the configured port.
    async fn prompt_port(&mut self, label: &str) -> io::Result<Option<u16>> {
        let default_port = self.config.network.port;
        let text = format!("{} (default {}): ", label, default_port);
        loop {
            let Some(line) = self.prompt(&text).await? else {
                return Ok(None);
            };
            match config::parse_port(&line, default_port) {
                Ok(port) => return Ok(Some(port)),
                Err(e) => writeln!(self.output, "{}", e)?,
            }
        }
    }

    async fn prompt_client(&mut self) -> io::Result<Option<(String, u16, u64)>> {
        let host = loop {
            let Some(line) = self.prompt("Enter the server IP address: ").await? else {
                return Ok(None);
            };
            match config::parse_host(&line) {
                Ok(host) => break host,
                Err(e) => writeln!(self.output, "{}", e)?,
            }
        };

        let Some(port) = self.prompt_port("Enter the server port").await? else {
            return Ok(None);
        };

        let default_mb = self.config.transfer.payload_mb;
        let text = format!("Enter the payload size in MB (default {}): ", default_mb);
        let payload_bytes = loop {
            let Some(line) = self.prompt(&text).await? else {
                return Ok(None);
            };
            match config::parse_payload_mb(&line, default_mb) {
                Ok(bytes) => break bytes,
                Err(e) => writeln!(self.output, "Invalid size: {}", e)?,
            }
        };

        Ok(Some((host, port, payload_bytes)))
    }

    async fn start(&mut self, session: Result<SessionConfig, ConfigError>) -> io::Result<()> {
        let session = match session {
            Ok(session) => session,
            Err(e) => {
                writeln!(self.output, "Invalid configuration: {}", e)?;
                return Ok(());
            }
        };

        if let Some(host) = session.peer_address() {
            writeln!(
                self.output,
                "Connecting to server {}:{}...",
                host,
                session.port()
            )?;
        }

        let outcome = {
            let mut console = ConsoleObserver::new(&mut self.output);
            if !self.show_progress {
                console = console.without_progress();
            }
            self.orchestrator.run(&session, &mut console).await
        };

        match outcome {
            Ok(evaluation) => {
                writeln!(self.output)?;
                write!(self.output, "{}", format_report(&evaluation))?;
            }
            Err(SessionError::Transport(e)) => {
                writeln!(self.output, "Session failed: {}", e)?;
            }
            Err(SessionError::Terminated) => {
                writeln!(self.output, "Session refused: {}", SessionError::Terminated)?;
            }
        }
        self.output.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;

    async fn run_menu(input: &str, config: ProbeConfig) -> (String, SessionState) {
        let mut menu = Menu::new(input.as_bytes(), Vec::new(), config).without_progress();
        menu.run().await.unwrap();
        let state = menu.orchestrator().state();
        (String::from_utf8(menu.into_output()).unwrap(), state)
    }

    #[test]
    fn test_parse_choice() {
        assert_eq!(MenuChoice::parse("1\n"), Some(MenuChoice::Server));
        assert_eq!(MenuChoice::parse(" 2 "), Some(MenuChoice::Client));
        assert_eq!(MenuChoice::parse("3"), Some(MenuChoice::Exit));
        assert_eq!(MenuChoice::parse("4"), None);
        assert_eq!(MenuChoice::parse(""), None);
    }

    #[tokio::test]
    async fn test_exit_choice() {
        let (out, state) = run_menu("3\n", ProbeConfig::default()).await;
        assert!(out.contains("1. Server"));
        assert!(out.contains("Goodbye."));
        assert_eq!(state, SessionState::Terminated);
    }

    #[tokio::test]
    async fn test_invalid_choice_reprompts() {
        let (out, _) = run_menu("9\nabc\n3\n", ProbeConfig::default()).await;
        assert_eq!(out.matches("Invalid choice").count(), 2);
        assert_eq!(out.matches("Enter your choice").count(), 3);
    }

    #[tokio::test]
    async fn test_end_of_input_terminates() {
        let (out, state) = run_menu("", ProbeConfig::default()).await;
        assert!(out.contains("Goodbye."));
        assert_eq!(state, SessionState::Terminated);
    }

    #[tokio::test]
    async fn test_client_prompts_reject_bad_input() {
        // Empty host, then a host; bad ports, default port; bad sizes, then input ends.
        let input = "2\n\n10.0.0.1\n0\nhttp\n\n0\n-3\nlots\n";
        let (out, _) = run_menu(input, ProbeConfig::default()).await;
        assert!(out.contains("server address cannot be empty"));
        assert!(out.contains("'0' is not a valid port"));
        assert!(out.contains("'http' is not a valid port"));
        assert_eq!(out.matches("Enter the server port (default 65432)").count(), 3);
        assert_eq!(out.matches("Invalid size").count(), 3);
        assert!(out.contains("(default 100)"));
        assert!(!out.contains("Connecting to server"));
    }

    #[tokio::test]
    async fn test_connect_failure_returns_to_menu() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut config = ProbeConfig::default();
        config.network.port = port;

        let (out, state) = run_menu("2\n127.0.0.1\n\n1\n3\n", config).await;
        assert!(out.contains(&format!("Connecting to server 127.0.0.1:{}", port)));
        assert!(out.contains("Session failed: failed to connect"));
        // Menu shown again after the failure.
        assert_eq!(out.matches("Select a mode:").count(), 2);
        assert_eq!(state, SessionState::Terminated);
    }

    #[tokio::test]
    async fn test_typed_port_overrides_default() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let input = format!("2\n127.0.0.1\n{}\n1\n3\n", port);
        let (out, _) = run_menu(&input, ProbeConfig::default()).await;
        assert!(out.contains(&format!("Connecting to server 127.0.0.1:{}", port)));
        assert!(out.contains("Session failed"));
    }

    #[tokio::test]
    async fn test_server_port_prompt_reprompts_then_ends() {
        let (out, state) = run_menu("1\n99999\n", ProbeConfig::default()).await;
        assert!(out.contains("Enter the listening port (default 65432)"));
        assert!(out.contains("'99999' is not a valid port"));
        assert!(out.contains("Goodbye."));
        assert_eq!(state, SessionState::Terminated);
    }
}
