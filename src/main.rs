//! AI Post Generator - Rust Backend
//!
//! 使用 axum 框架构建的后端服务，把主题转发给 Gemini 生成文章；
//! 同一个二进制也提供终端客户端（提交、重新生成、本地历史）。

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod cli;
mod client;
mod config;
mod error;
mod llm;
mod models;
mod server;
mod services;
mod state;
mod utils;

use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 客户端命令的输出走 stdout，日志写 stderr 并降低默认级别
    let default_filter = if cli.is_serve() {
        "postgen_rs=info,tower_http=debug"
    } else {
        "postgen_rs=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    cli::run(cli).await
}
