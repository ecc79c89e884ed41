pub mod control;
pub mod health;
pub mod player_api;
pub mod redirect;
