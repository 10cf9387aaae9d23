// author: kodeholic (powered by Claude)
//
// lctrace: 릴레이 시그널링 실시간 관찰 CLI
//
// 사용법:
//   lctrace [--host HOST] [--port PORT] [--filter KIND] [ROOM_CODE]
//
// 예시:
//   lctrace                            # 전체 룸 이벤트
//   lctrace abc-def-ghi                # 해당 룸만
//   lctrace --filter offer             # OFFER 계열만
//   lctrace abc-def-ghi -f leave

use chrono::{Local, TimeZone};
use clap::Parser;
use colored::Colorize;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::io::{BufRead, BufReader};

// ----------------------------------------------------------------------------
// [CLI 인자]
// ----------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name    = "lctrace",
    about   = "mini-rtcsession 릴레이 이벤트 스트림 관찰",
    version,
)]
struct Cli {
    /// 릴레이 호스트
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// 릴레이 포트
    #[arg(long, env = "RTC_RELAY_PORT", default_value_t = 3000)]
    port: u16,

    /// kind 부분 일치 필터 (대소문자 무관)
    #[arg(long, short = 'f')]
    filter: Option<String>,

    /// 관찰할 룸 코드 (생략 시 전체)
    room: Option<String>,
}

// ----------------------------------------------------------------------------
// [TraceEvent 역직렬화]: src/trace.rs 직렬화 형태
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TraceEvent {
    ts:      u64,
    dir:     String, // "in" | "out" | "sys"
    room:    Option<String>,
    peer:    Option<u32>,
    kind:    String,
    summary: String,
}

// ----------------------------------------------------------------------------
// [메인]
// ----------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();

    let url = match &cli.room {
        Some(code) => format!("http://{}:{}/trace/{}", cli.host, cli.port, code),
        None       => format!("http://{}:{}/trace",    cli.host, cli.port),
    };
    let filter = cli.filter.as_ref().map(|s| s.to_lowercase());

    print_header(&url, filter.as_deref());

    let client = match Client::builder().timeout(None).build() {
        Ok(c)  => c,
        Err(e) => {
            eprintln!("{} reqwest client 생성 실패: {}", "✗".red(), e);
            std::process::exit(1);
        }
    };

    let resp = match client.get(&url).header("Accept", "text/event-stream").send() {
        Ok(r)  => r,
        Err(e) => {
            eprintln!("{} 릴레이 연결 실패: {}", "✗".red(), e);
            eprintln!("  릴레이가 실행 중인지 확인하세요: {}", url.dimmed());
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        eprintln!("{} HTTP {}", "✗".red(), resp.status());
        std::process::exit(1);
    }

    let mut count: u64 = 0;
    for line in BufReader::new(resp).lines() {
        let line = match line {
            Ok(l)  => l,
            Err(e) => {
                eprintln!("{} 스트림 읽기 실패: {}", "✗".red(), e);
                break;
            }
        };

        // SSE: "data: {JSON}" 만 처리, keep-alive 주석과 빈 줄은 무시
        let Some(json) = line.strip_prefix("data: ") else { continue };

        let event: TraceEvent = match serde_json::from_str(json) {
            Ok(e)  => e,
            Err(e) => {
                eprintln!("{} JSON 파싱 실패: {} ({})", "⚠".yellow(), e, json);
                continue;
            }
        };

        if let Some(ref f) = filter {
            if !event.kind.to_lowercase().contains(f.as_str()) {
                continue;
            }
        }

        print_event(&event);
        count += 1;
    }

    println!("{}", "─".repeat(90).dimmed());
    println!("  스트림 종료 (총 {} 이벤트)", count);
}

// ----------------------------------------------------------------------------
// [출력]
// ----------------------------------------------------------------------------

fn print_header(url: &str, filter: Option<&str>) {
    println!("{}", "─".repeat(90).dimmed());
    println!(
        "  {} {}  {}  {}",
        "lctrace".bold().cyan(),
        "▶".green(),
        url.dimmed(),
        filter.map(|f| format!("[filter: {}]", f).yellow().to_string()).unwrap_or_default(),
    );
    println!("{}", "─".repeat(90).dimmed());
    println!(
        "  {:<12} {:<6} {:<18} {:<6} {:<12} {}",
        "TIME".dimmed(),
        "DIR".dimmed(),
        "KIND".dimmed(),
        "PEER".dimmed(),
        "ROOM".dimmed(),
        "SUMMARY".dimmed(),
    );
    println!("{}", "─".repeat(90).dimmed());
}

fn print_event(e: &TraceEvent) {
    let dir = match e.dir.as_str() {
        "in"  => "↓ IN ".bright_blue().to_string(),
        "out" => "↑ OUT".bright_green().to_string(),
        "sys" => "· SYS".bright_yellow().to_string(),
        other => other.dimmed().to_string(),
    };
    let peer = e.peer.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
    let room = e.room.as_deref().unwrap_or("-");

    println!(
        "  {} {} {:<18} {:<6} {:<12} {}",
        format_ts(e.ts).dimmed(),
        dir,
        colorize_kind(&e.kind),
        peer.bright_white(),
        room.dimmed(),
        e.summary.dimmed(),
    );
}

fn colorize_kind(kind: &str) -> String {
    match kind {
        "ROLLBACK" | "PROTOCOL_VIOLATION" | "ANSWER_FAILED" => kind.bright_red().bold().to_string(),
        "JOIN" | "LEAVE" | "NAME"                           => kind.bright_cyan().to_string(),
        "PLI"                                               => kind.bright_magenta().to_string(),
        k if k.starts_with("CANDIDATE")                     => kind.normal().to_string(),
        _                                                   => kind.bright_yellow().to_string(),
    }
}

/// Unix millis → 로컬 "HH:MM:SS.mmm"
fn format_ts(ms: u64) -> String {
    match Local.timestamp_millis_opt(ms as i64).single() {
        Some(t) => t.format("%H:%M:%S%.3f").to_string(),
        None    => "--:--:--.---".to_string(),
    }
}
