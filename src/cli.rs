//! 命令行入口

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::client::{ClientSession, FileStorage, HistoryEntry, HttpTransport};
use crate::config::get_config;
use crate::server;
use crate::services::Style;

/// 客户端请求超时，略长于服务端的上游超时
const CLIENT_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Parser, Debug)]
#[command(name = "postgen", version, about = "Generate posts on any topic with Gemini")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// 后端地址（客户端命令使用）
    #[arg(long, global = true, default_value = "http://127.0.0.1:3000")]
    pub server: String,

    /// 客户端本地状态文件
    #[arg(long, global = true)]
    pub state_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 启动后端服务
    Serve,
    /// 生成一篇文章
    Ask {
        topic: String,
        #[arg(long, default_value = "Professional")]
        style: String,
    },
    /// 交互式会话
    Session {
        #[arg(long, default_value = "Professional")]
        style: String,
    },
    /// 管理本地历史
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum HistoryAction {
    /// 列出历史
    List {
        #[arg(long)]
        filter: Option<String>,
    },
    /// 显示一条历史
    Show { id: i64 },
    /// 清空历史
    Clear,
}

impl Cli {
    /// 是否运行后端（决定默认日志级别）
    pub fn is_serve(&self) -> bool {
        matches!(self.command, None | Some(Command::Serve))
    }
}

type Session = ClientSession<HttpTransport, FileStorage>;

fn default_state_file() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("storage")
        .join("client_state.json")
}

fn open_session(cli: &Cli) -> anyhow::Result<Session> {
    let transport =
        HttpTransport::new(&cli.server, CLIENT_TIMEOUT).context("failed to create HTTP client")?;
    let path = cli.state_file.clone().unwrap_or_else(default_state_file);
    Ok(ClientSession::new(transport, FileStorage::open(path)))
}

fn print_entries(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        println!("(no history)");
        return;
    }
    for entry in entries {
        println!("{:>14}  [{}] {}", entry.id, entry.tone, entry.topic);
    }
}

async fn run_ask(session: &Session, topic: &str, style: &str) -> anyhow::Result<()> {
    match session.submit(topic, style).await {
        Ok(rendered) => {
            println!("{}", rendered);
            Ok(())
        }
        Err(e) => anyhow::bail!("{}", e),
    }
}

fn print_session_help() {
    println!("Type a topic to generate a post. Commands:");
    println!("  :regen             regenerate with the last topic and style");
    println!("  :style <name>      set the style ({})", style_names());
    println!("  :suggest <text>    topic suggestions");
    println!("  :history [term]    list history, optionally filtered");
    println!("  :show <id>         show a history entry");
    println!("  :clear             clear history");
    println!("  :theme             toggle theme");
    println!("  :quit              exit");
}

fn style_names() -> String {
    Style::ALL
        .iter()
        .map(|s| s.label())
        .collect::<Vec<_>>()
        .join(", ")
}

async fn run_session(session: &Session, initial_style: &str) -> anyhow::Result<()> {
    let mut style = Style::from_label(initial_style).label().to_string();
    println!("Theme: {}, style: {}", session.theme(), style);
    print_session_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, arg) = match line.strip_prefix(':') {
            Some(rest) => {
                let mut parts = rest.splitn(2, ' ');
                let command = parts.next().unwrap_or_default();
                (Some(command), parts.next().unwrap_or_default().trim())
            }
            None => (None, line),
        };

        match command {
            None => match session.submit(arg, &style).await {
                Ok(rendered) => println!("{}\n", rendered),
                Err(e) => println!("{}\n", e),
            },
            Some("regen") => match session.regenerate().await {
                Ok(rendered) => println!("{}\n", rendered),
                Err(e) => println!("{}\n", e),
            },
            Some("style") => {
                style = Style::from_label(arg).label().to_string();
                println!("Style: {}", style);
            }
            Some("suggest") => {
                for suggestion in session.suggest(arg).await {
                    println!("  {}", suggestion);
                }
            }
            Some("history") => print_entries(&session.filter_history(arg)),
            Some("show") => match arg.parse::<i64>().ok().and_then(|id| session.select_history(id)) {
                Some(rendered) => println!("{}\n", rendered),
                None => println!("No history entry with id {}", arg),
            },
            Some("clear") => {
                session.clear_history()?;
                println!("History cleared.");
            }
            Some("theme") => println!("Theme: {}", session.toggle_theme()?),
            Some("quit") | Some("q") => break,
            Some(_) => print_session_help(),
        }
    }

    Ok(())
}

fn run_history(session: &Session, action: &HistoryAction) -> anyhow::Result<()> {
    match action {
        HistoryAction::List { filter } => {
            print_entries(&session.filter_history(filter.as_deref().unwrap_or_default()));
        }
        HistoryAction::Show { id } => match session.select_history(*id) {
            Some(rendered) => println!("{}", rendered),
            None => anyhow::bail!("no history entry with id {}", id),
        },
        HistoryAction::Clear => {
            session.clear_history()?;
            println!("History cleared.");
        }
    }
    Ok(())
}

/// 执行命令
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        None | Some(Command::Serve) => server::serve(get_config()).await,
        Some(Command::Ask { topic, style }) => {
            let session = open_session(&cli)?;
            run_ask(&session, topic, style).await
        }
        Some(Command::Session { style }) => {
            let session = open_session(&cli)?;
            run_session(&session, style).await
        }
        Some(Command::History { action }) => {
            let session = open_session(&cli)?;
            run_history(&session, action)
        }
    }
}
