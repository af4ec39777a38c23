// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! # Runtime Configuration
//!
//! Command-line arguments, validated once at startup into a [`Config`].
//! Validation failures are fatal; the service never starts half-configured.
//!
//! | Flag | Description | Default |
//! |------|-------------|---------|
//! | `--addr` | HTTP listen address | `0.0.0.0:8080` |
//! | `--metrics-addr` | Metrics listen address | `0.0.0.0:9000` |
//! | `--hmac-secret` | Base64 credential secret, ≥ 32 bytes decoded | required |
//! | `--db-path` | SQLite database path | `db.sqlite3` |
//! | `--rescue-proxy-api-addr` | rescue-proxy gRPC `host:port` | required |
//! | `--rocketscan-api-url` | Rocketscan REST fallback URL | none |
//! | `--allowed-origins` | Comma-separated CORS origins, or `*` | `http://localhost:8080` |
//! | `--secure-grpc` | TLS to the rescue proxy | `true` |
//! | `--enable-solo-validators` | Serve solo-validator requests | `true` |
//! | `--api-path` | Base path for the API routes | `/rescue/v1` |
//! | `--debug` | Verbose logging | `false` |

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::Parser;

use crate::api::DEFAULT_BASE_PATH;

/// Minimum decoded length of the HMAC secret.
const MIN_SECRET_BYTES: usize = 32;

/// Raw command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "rescue-credential-api", about = "Credential issuance API for the rescue node")]
pub struct Args {
    /// Address on which to listen for HTTP requests.
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub addr: String,

    /// Address on which to listen for /metrics requests.
    #[arg(long, default_value = "0.0.0.0:9000")]
    pub metrics_addr: String,

    /// The secret to use for credential HMACs: at least 32 bytes of
    /// entropy, base64-encoded. `dd if=/dev/urandom bs=4 count=8 | base64`
    /// generates a suitable value.
    #[arg(long)]
    pub hmac_secret: String,

    /// SQLite database path.
    #[arg(long, default_value = "db.sqlite3")]
    pub db_path: PathBuf,

    /// Address (`host:port`) of the rescue-proxy gRPC API.
    #[arg(long)]
    pub rescue_proxy_api_addr: String,

    /// URL of the Rocketscan REST API, used as a node-list fallback.
    #[arg(long)]
    pub rocketscan_api_url: Option<String>,

    /// Comma-separated list of allowed CORS origins, or `*`.
    #[arg(long, default_value = "http://localhost:8080")]
    pub allowed_origins: String,

    /// Whether to use gRPC over TLS.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub secure_grpc: bool,

    /// Whether to serve solo validator credentials.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub enable_solo_validators: bool,

    /// Base path the API routes are mounted under.
    #[arg(long, default_value = DEFAULT_BASE_PATH)]
    pub api_path: String,

    /// Whether to enable verbose logging.
    #[arg(long)]
    pub debug: bool,
}

/// Validated application configuration.
pub struct Config {
    pub listen_addr: SocketAddr,
    pub metrics_addr: SocketAddr,
    pub credential_secret: Vec<u8>,
    pub db_path: PathBuf,
    pub rescue_proxy_api_addr: String,
    pub rocketscan_api_url: Option<String>,
    pub allowed_origins: Vec<String>,
    pub secure_grpc: bool,
    pub enable_solo_validators: bool,
    pub api_path: String,
    pub debug: bool,
}

/// A rejected command-line argument.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    InvalidListenAddr(String),
    InvalidMetricsAddr(String),
    InvalidSecret(&'static str),
    InvalidProxyAddr(String),
    InvalidOrigin(String),
    InvalidApiPath(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidListenAddr(addr) => write!(f, "invalid --addr value: {addr}"),
            ConfigError::InvalidMetricsAddr(addr) => {
                write!(f, "invalid --metrics-addr value: {addr}")
            }
            ConfigError::InvalidSecret(reason) => {
                write!(f, "invalid --hmac-secret: {reason}")
            }
            ConfigError::InvalidProxyAddr(addr) => {
                write!(f, "invalid --rescue-proxy-api-addr value: {addr}")
            }
            ConfigError::InvalidOrigin(origin) => {
                write!(f, "invalid --allowed-origins entry: {origin}")
            }
            ConfigError::InvalidApiPath(path) => write!(f, "invalid --api-path value: {path}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Parse the process arguments and validate them.
    pub fn parse() -> Result<Self, ConfigError> {
        Self::from_args(Args::parse())
    }

    /// Validate raw arguments into a usable configuration.
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let listen_addr = args
            .addr
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddr(args.addr.clone()))?;
        let metrics_addr = args
            .metrics_addr
            .parse()
            .map_err(|_| ConfigError::InvalidMetricsAddr(args.metrics_addr.clone()))?;

        let credential_secret = STANDARD
            .decode(&args.hmac_secret)
            .map_err(|_| ConfigError::InvalidSecret("not valid base64"))?;
        if credential_secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::InvalidSecret(
                "decoded secret is shorter than the required 32 bytes",
            ));
        }

        // The proxy address is host:port, where host may be a DNS name.
        match args.rescue_proxy_api_addr.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
            _ => {
                return Err(ConfigError::InvalidProxyAddr(
                    args.rescue_proxy_api_addr.clone(),
                ))
            }
        }

        let allowed_origins: Vec<String> = args
            .allowed_origins
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
        for origin in &allowed_origins {
            if origin != "*"
                && !origin.starts_with("http://")
                && !origin.starts_with("https://")
            {
                return Err(ConfigError::InvalidOrigin(origin.clone()));
            }
        }

        if !args.api_path.starts_with('/') || args.api_path.ends_with('/') {
            return Err(ConfigError::InvalidApiPath(args.api_path.clone()));
        }

        Ok(Self {
            listen_addr,
            metrics_addr,
            credential_secret,
            db_path: args.db_path,
            rescue_proxy_api_addr: args.rescue_proxy_api_addr,
            rocketscan_api_url: args.rocketscan_api_url,
            allowed_origins,
            secure_grpc: args.secure_grpc,
            enable_solo_validators: args.enable_solo_validators,
            api_path: args.api_path,
            debug: args.debug,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_args() -> Args {
        Args {
            addr: "127.0.0.1:8080".into(),
            metrics_addr: "127.0.0.1:9000".into(),
            // 32 zero bytes.
            hmac_secret: STANDARD.encode([0u8; 32]),
            db_path: "db.sqlite3".into(),
            rescue_proxy_api_addr: "proxy.example:50051".into(),
            rocketscan_api_url: None,
            allowed_origins: "http://localhost:8080".into(),
            secure_grpc: true,
            enable_solo_validators: true,
            api_path: "/rescue/v1".into(),
            debug: false,
        }
    }

    #[test]
    fn valid_arguments_parse() {
        let config = Config::from_args(valid_args()).expect("valid arguments");
        assert_eq!(config.credential_secret.len(), 32);
        assert_eq!(config.allowed_origins, vec!["http://localhost:8080"]);
        assert_eq!(config.api_path, "/rescue/v1");
    }

    #[test]
    fn secret_must_be_base64() {
        let mut args = valid_args();
        args.hmac_secret = "!!not-base64!!".into();
        assert!(matches!(
            Config::from_args(args),
            Err(ConfigError::InvalidSecret("not valid base64"))
        ));
    }

    #[test]
    fn secret_must_decode_to_32_bytes() {
        let mut args = valid_args();
        args.hmac_secret = STANDARD.encode([0u8; 31]);
        assert!(matches!(
            Config::from_args(args),
            Err(ConfigError::InvalidSecret(_))
        ));
    }

    #[test]
    fn proxy_address_needs_a_port() {
        let mut args = valid_args();
        args.rescue_proxy_api_addr = "proxy.example".into();
        assert!(matches!(
            Config::from_args(args),
            Err(ConfigError::InvalidProxyAddr(_))
        ));
    }

    #[test]
    fn origins_split_and_validate() {
        let mut args = valid_args();
        args.allowed_origins = "https://a.example, http://b.example".into();
        let config = Config::from_args(args).expect("valid origins");
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "http://b.example"]
        );

        let mut args = valid_args();
        args.allowed_origins = "*".into();
        assert!(Config::from_args(args).is_ok());

        let mut args = valid_args();
        args.allowed_origins = "ftp://nope.example".into();
        assert!(matches!(
            Config::from_args(args),
            Err(ConfigError::InvalidOrigin(_))
        ));
    }

    #[test]
    fn api_path_shape_is_checked() {
        let mut args = valid_args();
        args.api_path = "rescue/v1".into();
        assert!(matches!(
            Config::from_args(args),
            Err(ConfigError::InvalidApiPath(_))
        ));

        let mut args = valid_args();
        args.api_path = "/rescue/v1/".into();
        assert!(matches!(
            Config::from_args(args),
            Err(ConfigError::InvalidApiPath(_))
        ));
    }

    #[test]
    fn config_error_instances_are_comparable() {
        // ConfigError derives PartialEq so tests can assert exact variants;
        // sanity-check Display while at it.
        let err = ConfigError::InvalidProxyAddr("nope".into());
        assert!(err.to_string().contains("--rescue-proxy-api-addr"));
    }
}
