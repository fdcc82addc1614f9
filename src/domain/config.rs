use serde::{Deserialize, Serialize};

/// TermLine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermLineConfig {
    /// Global configuration
    #[serde(default)]
    pub global: GlobalConfig,
    /// Terminal configuration
    pub terminal: TerminalConfig,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Completed-line history limit per direction
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

/// Per-terminal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Transport to open
    pub transport: TransportConfig,
    /// Raw repository capacities
    #[serde(default)]
    pub buffers: BufferConfig,
    /// Line break policies
    #[serde(default)]
    pub line_break: LineBreakConfig,
    /// Display toggles
    #[serde(default)]
    pub display: DisplayConfig,
    /// Binary or text framing
    #[serde(default)]
    pub mode: TerminalMode,
}

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransportConfig {
    #[serde(rename = "serial")]
    Serial {
        port: String,
        baud_rate: u32,
        #[serde(default = "default_data_bits")]
        data_bits: u8,
        #[serde(default = "default_stop_bits")]
        stop_bits: u8,
        #[serde(default)]
        parity: ParityConfig,
        #[serde(default)]
        flow_control: FlowControlConfig,
    },
    #[serde(rename = "tcp_client")]
    TcpClient {
        host: String,
        port: u16,
        #[serde(default = "default_connect_timeout")]
        connect_timeout_ms: u64,
    },
    #[serde(rename = "tcp_server")]
    TcpServer {
        /// Bind address, e.g. "0.0.0.0:9000"
        bind: String,
    },
    #[serde(rename = "udp")]
    Udp {
        /// Local bind address
        local: String,
        /// Remote peer address
        remote: String,
    },
    #[serde(rename = "auto_socket")]
    AutoSocket {
        remote_host: String,
        remote_port: u16,
        /// Listen address used when falling back to the server role
        local_bind: String,
        #[serde(default)]
        retry: AutoSocketRetryConfig,
    },
}

/// AutoSocket retry parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoSocketRetryConfig {
    /// Full client-then-server attempts before giving up
    #[serde(default = "default_max_start_cycles")]
    pub max_start_cycles: u32,
    /// Lower bound of the randomized wait between cycles
    #[serde(default = "default_min_backoff")]
    pub min_backoff_ms: u64,
    /// Upper bound of the randomized wait between cycles
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    /// Client connect timeout within one cycle
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

/// Parity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParityConfig {
    None,
    Odd,
    Even,
}

/// Flow control configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControlConfig {
    None,
    Hardware,
    Software,
}

/// Raw repository capacities, in elements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    #[serde(default = "default_direction_capacity")]
    pub tx_capacity: usize,
    #[serde(default = "default_direction_capacity")]
    pub rx_capacity: usize,
    #[serde(default = "default_bidir_capacity")]
    pub bidir_capacity: usize,
}

/// Line break policy configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LineBreakConfig {
    #[serde(default)]
    pub timed: TimedLineBreak,
    #[serde(default)]
    pub length: LengthLineBreak,
    /// Close the other direction's open line when traffic changes direction
    #[serde(default)]
    pub direction_enabled: bool,
}

/// Inactivity-based line break
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedLineBreak {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_timed_timeout")]
    pub timeout_ms: u64,
}

/// Maximum-length line break
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LengthLineBreak {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_max_line_length")]
    pub max_length: usize,
}

/// Display toggles
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayConfig {
    /// Prefix each line with its start timestamp
    #[serde(default)]
    pub show_timestamp: bool,
    /// Suffix each line with its data element count
    #[serde(default)]
    pub show_length: bool,
}

/// Framing mode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TerminalMode {
    Text {
        #[serde(default = "default_eol")]
        eol: String,
    },
    Binary,
}

// Default value functions

fn default_log_level() -> String {
    "info".to_string()
}

fn default_history_limit() -> usize {
    1000
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_connect_timeout() -> u64 {
    3000
}

fn default_max_start_cycles() -> u32 {
    3
}

fn default_min_backoff() -> u64 {
    50
}

fn default_max_backoff() -> u64 {
    300
}

fn default_direction_capacity() -> usize {
    1024
}

fn default_bidir_capacity() -> usize {
    2048
}

fn default_timed_timeout() -> u64 {
    500
}

fn default_max_line_length() -> usize {
    80
}

fn default_eol() -> String {
    "\n".to_string()
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            history_limit: default_history_limit(),
        }
    }
}

impl Default for AutoSocketRetryConfig {
    fn default() -> Self {
        Self {
            max_start_cycles: default_max_start_cycles(),
            min_backoff_ms: default_min_backoff(),
            max_backoff_ms: default_max_backoff(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

impl Default for ParityConfig {
    fn default() -> Self {
        ParityConfig::None
    }
}

impl Default for FlowControlConfig {
    fn default() -> Self {
        FlowControlConfig::None
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            tx_capacity: default_direction_capacity(),
            rx_capacity: default_direction_capacity(),
            bidir_capacity: default_bidir_capacity(),
        }
    }
}

impl Default for TimedLineBreak {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_ms: default_timed_timeout(),
        }
    }
}

impl Default for LengthLineBreak {
    fn default() -> Self {
        Self {
            enabled: false,
            max_length: default_max_line_length(),
        }
    }
}

impl Default for TerminalMode {
    fn default() -> Self {
        TerminalMode::Text { eol: default_eol() }
    }
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::TcpClient {
                host: "127.0.0.1".to_string(),
                port: 10000,
                connect_timeout_ms: default_connect_timeout(),
            },
            buffers: BufferConfig::default(),
            line_break: LineBreakConfig::default(),
            display: DisplayConfig::default(),
            mode: TerminalMode::default(),
        }
    }
}

impl Default for TermLineConfig {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            terminal: TerminalConfig::default(),
        }
    }
}
