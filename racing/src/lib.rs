pub mod ai;
pub mod car;
pub mod config;
pub mod geometry;
pub mod items;
pub mod player;
pub mod race;
pub mod simulation;
pub mod track;
pub mod track_format;
