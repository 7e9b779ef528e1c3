pub mod camera;
pub mod context;
pub mod gate;
pub mod handle_race;
pub mod horse;
pub mod race;
pub mod scheduler;
pub mod skill;
pub mod track;
pub mod weather;
