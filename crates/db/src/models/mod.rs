pub mod board;
pub mod board_member;
pub mod card;
pub mod card_history;
pub mod position;
pub mod swim_lane;
pub mod user;
