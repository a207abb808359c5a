pub mod core;
pub mod grading;
pub mod layouts;
pub mod periods;
pub mod ranking;
pub mod roster;
