// src/motion/mod.rs - Speed planning and hoop kinematics
pub mod kinematics;
pub mod speed_planner;

pub use kinematics::CoreXyKinematics;
pub use speed_planner::{plan_block, plan_speeds};
