//! Capture configuration

use std::time::Duration;

use super::reframer::OverflowPolicy;

/// Output format requested from tshark (`-T`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Newline-delimited JSON, one object per line
    #[default]
    Ek,
    /// Pretty-printed JSON array; most lines are fragments
    Json,
}

impl OutputFormat {
    /// Value passed to `-T`
    pub fn as_arg(&self) -> &'static str {
        match self {
            OutputFormat::Ek => "ek",
            OutputFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ek" => Ok(OutputFormat::Ek),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}

/// Capture subprocess configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Start the capture subprocess at all
    pub enabled: bool,

    /// Capture program to run
    pub program: String,

    /// Network interface to capture on
    pub interface: String,

    /// Requested output format
    pub format: OutputFormat,

    /// Full argument list, replacing the generated tshark arguments
    pub args: Option<Vec<String>>,

    /// Size of each stdout read
    pub read_buffer_size: usize,

    /// Longest unterminated line kept before the overflow policy applies
    pub max_line_len: usize,

    /// What to do with oversized lines
    pub overflow_policy: OverflowPolicy,

    /// Lines buffered between the stdout reader and the decoder
    pub line_channel_capacity: usize,

    /// Time allowed for a graceful exit before the process is killed
    pub shutdown_grace: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "tshark".to_string(),
            interface: "lo".to_string(),
            format: OutputFormat::default(),
            args: None,
            read_buffer_size: 64 * 1024, // 64KB
            max_line_len: 1024 * 1024,   // 1MB
            overflow_policy: OverflowPolicy::default(),
            line_channel_capacity: 1024,
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

impl CaptureConfig {
    /// Run an arbitrary command instead of tshark
    pub fn command(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args: Some(args),
            ..Default::default()
        }
    }

    /// Disable the capture subprocess
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Set the capture interface
    pub fn interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = interface.into();
        self
    }

    /// Set the output format
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the maximum line length
    pub fn max_line_len(mut self, len: usize) -> Self {
        self.max_line_len = len;
        self
    }

    /// Set the overflow policy
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Set the graceful shutdown window
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Arguments passed to the capture program
    pub fn build_args(&self) -> Vec<String> {
        match self.args {
            Some(ref args) => args.clone(),
            None => vec![
                "-i".to_string(),
                self.interface.clone(),
                "-T".to_string(),
                self.format.as_arg().to_string(),
                // flush after every packet
                "-l".to_string(),
            ],
        }
    }
}
