use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use oneshot_net::{
    oneshot_error, oneshot_log, ClientConfig, ClientError, ConnectionTarget, LoginRequest, OneShotClient,
    OutboundPayload, ReadMode, TlsTrustConfig, Transport,
};

#[derive(Parser, Debug)]
#[command(name = "oneshot")]
#[command(about = "Send one payload over TCP or TLS and print the reply", long_about = None)]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target host
    #[arg(long)]
    host: Option<String>,

    /// Target port
    #[arg(short, long)]
    port: Option<u16>,

    /// Wrap the connection in TLS
    #[arg(long)]
    tls: bool,

    /// PEM bundle with the trust anchors for TLS
    #[arg(long)]
    ca_bundle: Option<PathBuf>,

    /// Do not match the certificate name against the host (insecure)
    #[arg(long)]
    no_check_hostname: bool,

    /// Name used for SNI and the certificate name check
    #[arg(long)]
    server_name: Option<String>,

    /// Send this text as-is
    #[arg(short, long, conflicts_with = "login")]
    text: Option<String>,

    /// Send the login request from this JSON file, terminated by CRLFCRLF
    #[arg(long)]
    login: Option<PathBuf>,

    /// How to collect the response
    #[arg(long, value_enum)]
    read_mode: Option<ReadModeArg>,

    /// Delimiter for --read-mode delimiter
    #[arg(long, default_value = "\r\n\r\n")]
    delimiter: String,

    /// Upper bound for the response size in bytes
    #[arg(long)]
    max_bytes: Option<usize>,

    /// Deadline for connect and TLS handshake, in milliseconds
    #[arg(long)]
    connect_timeout_ms: Option<u64>,

    /// Deadline for sending and receiving, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Set TCP_NODELAY
    #[arg(long)]
    no_delay: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ReadModeArg {
    Single,
    ToClose,
    Delimiter,
}

fn build_config(args: &Args) -> Result<ClientConfig, ClientError> {
    let mut cfg = match &args.config {
        Some(path) => ClientConfig::from_json_file(path)?,
        None => {
            let (Some(host), Some(port)) = (&args.host, args.port) else {
                return Err(ClientError::Config("--host and --port are required without --config".into()));
            };
            ClientConfig::new(ConnectionTarget::plain(host.clone(), port))
        }
    };

    if let Some(host) = &args.host {
        cfg.target.host = host.clone();
    }
    if let Some(port) = args.port {
        cfg.target.port = port;
    }
    if args.tls {
        cfg.target.transport = Transport::Tls;
    }

    if let Some(bundle) = &args.ca_bundle {
        let trust = match cfg.trust.take() {
            Some(mut trust) => {
                trust.ca_bundle_path = bundle.clone();
                trust
            }
            None => TlsTrustConfig::new(bundle.clone()),
        };
        cfg.trust = Some(trust);
    }
    if let Some(trust) = cfg.trust.as_mut() {
        if args.no_check_hostname {
            trust.check_hostname = false;
        }
        if let Some(name) = &args.server_name {
            trust.server_name = Some(name.clone());
        }
    }

    if let Some(mode) = args.read_mode {
        cfg.read_mode = match mode {
            ReadModeArg::Single => ReadMode::Single,
            ReadModeArg::ToClose => ReadMode::ToClose,
            ReadModeArg::Delimiter => ReadMode::UntilDelimiter(args.delimiter.clone()),
        };
    }
    if let Some(max) = args.max_bytes {
        cfg.max_response_bytes = max;
    }
    if args.connect_timeout_ms.is_some() {
        cfg.connect_timeout_ms = args.connect_timeout_ms;
    }
    if args.timeout_ms.is_some() {
        cfg.io_timeout_ms = args.timeout_ms;
    }
    if args.no_delay {
        cfg.no_delay = true;
    }

    cfg.validate()?;
    Ok(cfg)
}

fn build_payload(args: &Args) -> Result<OutboundPayload, ClientError> {
    match (&args.text, &args.login) {
        (Some(text), _) => Ok(OutboundPayload::text(text.clone())),
        (None, Some(path)) => OutboundPayload::json(&LoginRequest::from_json_file(path)?),
        (None, None) => Err(ClientError::Config("nothing to send, use --text or --login".into())),
    }
}

async fn execute(args: Args) -> Result<(), ClientError> {
    let cfg = build_config(&args)?;
    let payload = build_payload(&args)?;
    let client = OneShotClient::new(cfg);

    // Dropping the run future on Ctrl-C closes the socket
    tokio::select! {
        res = client.run(&payload) => {
            let response = res?;
            println!("+++ Received +++ :: {}", response);
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => Err(ClientError::Interrupted),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    oneshot_log::init(args.verbose);

    match execute(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            oneshot_error!("{e}");
            eprintln!("oneshot: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
