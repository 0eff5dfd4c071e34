//! # CLI Module
//!
//! Command-line interface for the `gatepool` binary.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Start the worker pool and the HTTP server, then run until SIGINT/SIGTERM:
//!
//! ```bash
//! gatepool serve --config config/local.yaml --workers 8 --queue-capacity 64
//! ```
//!
//! Options:
//! - `--config <FILE>` - YAML configuration file (see [`crate::config`])
//! - `--addr <ADDR>` - Listen address, overrides config and `GATEPOOL_ADDR`
//! - `--workers <N>` - Worker coroutines
//! - `--queue-capacity <N>` - Jobs that may wait for a worker
//!
//! On shutdown the server stops accepting, then the pool drains for at most
//! `server.shutdown_timeout_secs`.
//!
//! ### `config`
//!
//! Print the fully resolved configuration (file, env and defaults) as YAML:
//!
//! ```bash
//! gatepool config --config config/production.yaml
//! ```
//!
//! ## Routes served
//!
//! | Method | Path          | Pooled | Handler |
//! |--------|---------------|--------|---------|
//! | GET    | `/health`     | no     | [`health`](crate::handlers::health) |
//! | GET    | `/pool/stats` | no     | [`pool_stats`](crate::handlers::pool_stats) |
//! | GET    | `/echo`       | yes    | [`echo`](crate::handlers::echo) |
//! | POST   | `/echo`       | yes    | [`echo`](crate::handlers::echo) |
//! | GET    | `/sleep`      | yes    | [`sleep`](crate::handlers::sleep) |

mod commands;


pub use commands::{build_routes, run_cli, serve, Cli, Commands};
