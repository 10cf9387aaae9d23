// author: kodeholic (powered by Claude)
//
// lcadmin: mini-rtcsession 릴레이 운영 관리 CLI
//
// 사용법:
//   lcadmin [--host HOST] [--port PORT] <COMMAND>
//
//   lcadmin status            릴레이 상태 요약 (uptime, 룸 수, 접속 수)
//   lcadmin rooms             Room 전체 테이블
//   lcadmin rooms <code>      Room 상세 (멤버 목록)
//   lcadmin code              새 룸 코드 발급

use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;
use tabled::{Table, Tabled};

// ----------------------------------------------------------------------------
// [CLI 정의]
// ----------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name    = "lcadmin",
    about   = "mini-rtcsession 릴레이 운영 관리 CLI",
    version,
)]
struct Cli {
    /// 릴레이 호스트
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// 릴레이 포트 (WS/HTTP 공용)
    #[arg(long, env = "RTC_RELAY_PORT", default_value_t = 3000)]
    port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 릴레이 상태 요약
    Status,

    /// Room 목록 또는 상세
    Rooms {
        /// 룸 코드 지정 시 상세 보기
        code: Option<String>,
    },

    /// 새 룸 코드 발급
    Code,
}

// ----------------------------------------------------------------------------
// [응답 타입]: http/dto.rs 와 대응
// ----------------------------------------------------------------------------

#[derive(Deserialize)]
struct ServerStatus {
    uptime_secs:  u64,
    room_count:   usize,
    member_count: usize,
}

#[derive(Deserialize)]
struct AdminRoomSummary {
    code:         String,
    member_count: usize,
    capacity:     usize,
    created_at:   u64,
}

#[derive(Deserialize)]
struct AdminRoomDetail {
    code:       String,
    capacity:   usize,
    created_at: u64,
    members:    Vec<AdminMember>,
}

#[derive(Deserialize, Tabled)]
struct AdminMember {
    #[tabled(rename = "ID")]
    id:        u32,
    #[tabled(rename = "NAME")]
    name:      String,
    #[tabled(skip)]
    #[allow(dead_code)]
    joined_at: u64,
    #[tabled(rename = "AGE(s)")]
    age_secs:  u64,
}

#[derive(Deserialize)]
struct RoomCode {
    code: String,
}

// 표시용 (생성 시각 포맷 적용)
#[derive(Tabled)]
struct RoomRow {
    #[tabled(rename = "CODE")]
    code:    String,
    #[tabled(rename = "MEMBERS")]
    members: String,
    #[tabled(rename = "CREATED")]
    created: String,
}

// ----------------------------------------------------------------------------
// [main]
// ----------------------------------------------------------------------------

fn main() {
    let cli  = Cli::parse();
    let base = format!("http://{}:{}", cli.host, cli.port);

    let result = match &cli.command {
        Command::Status                  => cmd_status(&base),
        Command::Rooms { code: None }    => cmd_rooms(&base),
        Command::Rooms { code: Some(c) } => cmd_room_detail(&base, c),
        Command::Code                    => cmd_code(&base),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "ERROR:".red().bold(), e);
        std::process::exit(1);
    }
}

// ----------------------------------------------------------------------------
// [커맨드 구현]
// ----------------------------------------------------------------------------

fn cmd_status(base: &str) -> Result<(), Box<dyn std::error::Error>> {
    let s: ServerStatus = get_json(&format!("{}/admin/status", base))?;

    let hours   = s.uptime_secs / 3600;
    let minutes = (s.uptime_secs % 3600) / 60;
    let secs    = s.uptime_secs % 60;

    println!();
    println!("{}", "  mini-rtcsession Relay Status".bold().cyan());
    println!("  {}", "─".repeat(36).dimmed());
    println!("  {:16} {}",
        "Uptime:".bold(),
        format!("{}h {}m {}s", hours, minutes, secs).green()
    );
    println!("  {:16} {}", "Rooms:".bold(),   s.room_count.to_string().yellow());
    println!("  {:16} {}", "Members:".bold(), s.member_count.to_string().yellow());
    println!();
    Ok(())
}

fn cmd_rooms(base: &str) -> Result<(), Box<dyn std::error::Error>> {
    let rooms: Vec<AdminRoomSummary> = get_json(&format!("{}/admin/rooms", base))?;

    if rooms.is_empty() {
        println!("{}", "  열린 Room 없음".dimmed());
        return Ok(());
    }

    let rows: Vec<RoomRow> = rooms.iter().map(|r| RoomRow {
        code:    r.code.clone(),
        members: if r.member_count >= r.capacity {
            format!("{}/{}", r.member_count, r.capacity).red().bold().to_string()
        } else {
            format!("{}/{}", r.member_count, r.capacity)
        },
        created: format_ts(r.created_at),
    }).collect();

    println!();
    println!("{}", Table::new(&rows));
    println!("  {} room(s)", rooms.len());
    println!();
    Ok(())
}

fn cmd_room_detail(base: &str, code: &str) -> Result<(), Box<dyn std::error::Error>> {
    let room: AdminRoomDetail = get_json(&format!("{}/admin/rooms/{}", base, code))?;

    println!();
    println!("{}", format!("  Room: {}", room.code).bold().cyan());
    println!("  {}", "─".repeat(36).dimmed());
    println!("  {:16} {}", "Capacity:".bold(), format!("{}/{}", room.members.len(), room.capacity));
    println!("  {:16} {}", "Created:".bold(),  format_ts(room.created_at));

    println!();
    println!("{}", "  Members".bold());
    if room.members.is_empty() {
        println!("    {}", "(없음)".dimmed());
    } else {
        println!("{}", Table::new(&room.members).to_string()
            .lines()
            .map(|l| format!("  {}", l))
            .collect::<Vec<_>>()
            .join("\n"));
    }
    println!();
    Ok(())
}

fn cmd_code(base: &str) -> Result<(), Box<dyn std::error::Error>> {
    let c: RoomCode = get_json(&format!("{}/code", base))?;
    println!("{}", c.code.green().bold());
    Ok(())
}

// ----------------------------------------------------------------------------
// [공통 유틸]
// ----------------------------------------------------------------------------

/// GET 요청 + JSON 역직렬화
fn get_json<T: for<'de> serde::Deserialize<'de>>(url: &str) -> Result<T, Box<dyn std::error::Error>> {
    let resp = reqwest::blocking::get(url)?;
    let status = resp.status();
    if !status.is_success() {
        let body: serde_json::Value = resp.json().unwrap_or_default();
        let msg = body["error"].as_str().unwrap_or("unknown error");
        return Err(format!("[{}] {}", status, msg).into());
    }
    Ok(resp.json()?)
}

/// Unix millis → 로컬 "YYYY-MM-DD HH:MM:SS"
fn format_ts(ms: u64) -> String {
    if ms == 0 { return "-".to_string(); }
    match Local.timestamp_millis_opt(ms as i64).single() {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        None    => "-".to_string(),
    }
}
