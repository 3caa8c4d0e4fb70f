mod args;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use url::Url;

use crate::args::{Args, Transport};
use guac_client_core::tunnel::chained::Candidate;
use guac_client_core::tunnel::{ChainedTunnel, HttpTunnel, Tunnel, TunnelConfig, WebSocketTunnel};
use guac_client_core::{Client, ClientConfig, ConnectParams, Sinks};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.debug {
        tracing_subscriber::fmt().with_max_level(Level::TRACE).init();
    } else {
        tracing_subscriber::fmt().json().init();
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(error) = signal::ctrl_c().await {
                warn!(%error, "something strange with ctrl-c handling!");
            };
            cancel.cancel();
        });
    }

    match run(args, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "encountered runtime error");
            ExitCode::FAILURE
        },
    }
}

/// Builds the tunnel variant(s) implied by `--transport` and `url`'s
/// scheme, then drives a [`Client`] over it until disconnect or
/// cancellation.
async fn run(args: Args, cancel: CancellationToken) -> Result<()> {
    let config = TunnelConfig::default();
    let (tunnel, events): (Arc<dyn Tunnel>, _) = build_tunnel(&args.url, args.transport, config)?;

    let mut client = Client::new(tunnel, events, Sinks::default(), ClientConfig::default());
    client.router_mut().set_listener(|opcode, params| {
        info!(opcode, ?params, "received instruction");
    });

    let params = ConnectParams {
        protocol: args.protocol,
        width: args.width,
        height: args.height,
        dpi: args.dpi,
        audio_mimetypes: args.audio,
        video_mimetypes: args.video,
        image_mimetypes: args.image,
        timezone: args.timezone,
        connect_args: args.connect_args,
    };

    client.connect(None, params).await.context("connecting to the gateway")?;
    info!(uuid = ?client.uuid(), "connection established, waiting for sync");

    tokio::select! {
        result = client.run() => result.context("driving the client loop")?,
        _ = cancel.cancelled() => {
            info!("shutting down on signal");
            client.disconnect();
        },
    }

    Ok(())
}

fn build_tunnel(url: &str, transport: Transport, config: TunnelConfig) -> Result<(Arc<dyn Tunnel>, tokio::sync::mpsc::UnboundedReceiver<guac_client_core::tunnel::TunnelEvent>)> {
    match transport {
        Transport::WebSocket => {
            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            let tunnel: Arc<dyn Tunnel> = Arc::new(WebSocketTunnel::new(url, config, tx));
            Ok((tunnel, rx))
        },
        Transport::Http => {
            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            let tunnel: Arc<dyn Tunnel> = Arc::new(HttpTunnel::new(url, config, tx));
            Ok((tunnel, rx))
        },
        Transport::Auto => {
            let (ws_url, http_url) = derive_urls(url)?;

            let (ws_tx, ws_rx) = tokio::sync::mpsc::unbounded_channel();
            let (http_tx, http_rx) = tokio::sync::mpsc::unbounded_channel();
            let ws_tunnel: Arc<dyn Tunnel> = Arc::new(WebSocketTunnel::new(ws_url, config, ws_tx));
            let http_tunnel: Arc<dyn Tunnel> = Arc::new(HttpTunnel::new(http_url, config, http_tx));

            let candidates = vec![
                Candidate { tunnel: ws_tunnel, events: ws_rx, connect_data: None },
                Candidate { tunnel: http_tunnel, events: http_rx, connect_data: None },
            ];

            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            let tunnel: Arc<dyn Tunnel> = Arc::new(ChainedTunnel::new(candidates, tx));
            Ok((tunnel, rx))
        },
    }
}

/// Derives the WebSocket and HTTP variants of the same gateway address,
/// preserving whether it was given as a plain or TLS-secured URL, so
/// `--transport auto` can probe both against one address.
fn derive_urls(url: &str) -> Result<(String, String)> {
    let parsed = Url::parse(url).with_context(|| format!("parsing tunnel URL {url}"))?;
    let secure = match parsed.scheme() {
        "ws" | "http" => false,
        "wss" | "https" => true,
        other => return Err(anyhow!("unsupported URL scheme {other}")),
    };

    let mut ws = parsed.clone();
    ws.set_scheme(if secure { "wss" } else { "ws" }).map_err(|()| anyhow!("failed to derive WebSocket URL"))?;
    let mut http = parsed;
    http.set_scheme(if secure { "https" } else { "http" }).map_err(|()| anyhow!("failed to derive HTTP URL"))?;

    Ok((ws.into(), http.into()))
}
