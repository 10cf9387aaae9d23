// author: kodeholic (powered by Claude)
// HTTP 응답 DTO: Admin / 일반 조회 공용

use serde::Serialize;

// ----------------------------------------------------------------------------
// [일반 조회]
// ----------------------------------------------------------------------------

/// GET /code 응답
#[derive(Serialize)]
pub struct RoomCode {
    pub code: String,
}

// ----------------------------------------------------------------------------
// [Admin]
// ----------------------------------------------------------------------------

/// GET /admin/status
#[derive(Serialize)]
pub struct ServerStatus {
    pub uptime_secs:  u64,
    pub room_count:   usize,
    pub member_count: usize,
}

/// GET /admin/rooms 아이템
#[derive(Serialize)]
pub struct AdminRoomSummary {
    pub code:         String,
    pub member_count: usize,
    pub capacity:     usize,
    pub created_at:   u64,
}

/// GET /admin/rooms/{code}
#[derive(Serialize)]
pub struct AdminRoomDetail {
    pub code:       String,
    pub capacity:   usize,
    pub created_at: u64,
    pub members:    Vec<AdminMember>,
}

#[derive(Serialize)]
pub struct AdminMember {
    pub id:        u32,
    pub name:      String,
    pub joined_at: u64,
    pub age_secs:  u64,
}
