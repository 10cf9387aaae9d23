// author: kodeholic (powered by Claude)
// 릴레이: 서버(룸 단위 시그널링 전달)와 클라이언트 링크

pub mod link;
pub mod room;
pub mod server;

pub use link::{connect, RelayCloser, RelayEvent, RelayLink};
pub use room::{Member, Room, RoomHub};
pub use server::{ws_handler, AppState};
