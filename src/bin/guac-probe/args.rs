use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(about, long_about = None, version)]
pub struct Args {
    /// Tunnel endpoint to connect to, e.g. wss://gateway/tunnel or
    /// https://gateway/tunnel.
    pub url: String,
    /// Guacamole protocol to request (vnc, rdp, ssh, ...).
    #[arg(short = 'P', long, default_value = "vnc")]
    pub protocol: String,
    /// Opaque `connect` arguments forwarded after the protocol name, e.g.
    /// hostname/port/password pairs expected by the chosen protocol.
    #[arg(long = "connect-arg", value_delimiter = ',')]
    pub connect_args: Vec<String>,
    #[arg(long, default_value_t = 1024)]
    pub width: i64,
    #[arg(long, default_value_t = 768)]
    pub height: i64,
    #[arg(long)]
    pub dpi: Option<i64>,
    #[arg(long, value_delimiter = ',')]
    pub audio: Vec<String>,
    #[arg(long, value_delimiter = ',')]
    pub video: Vec<String>,
    #[arg(long, value_delimiter = ',', default_value = "image/png,image/jpeg")]
    pub image: Vec<String>,
    #[arg(long)]
    pub timezone: Option<String>,
    /// Which transport(s) to try. `auto` tries a WebSocket first and
    /// falls back to HTTP long-polling against the same base URL.
    #[arg(short, long, value_enum, default_value_t = Transport::Auto)]
    pub transport: Transport,
    /// Enables human-friendly logging.
    #[arg(short, long, default_value_t)]
    pub debug: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Transport {
    WebSocket,
    Http,
    Auto,
}
