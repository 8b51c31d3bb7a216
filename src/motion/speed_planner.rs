// src/motion/speed_planner.rs - Per-stitch speed ramps around jump stitches
//
// The thread only tolerates gradual changes of needle speed. Jump stitches are
// the only places allowed to run at the low jump speed, so every other stitch
// ramps towards them from both sides:
//
//   ____       ____  max speed
//       \     /
//        \   /
//         \-/        min jump speed
//          ^
//        jump
use crate::config::SpeedProfile;
use crate::pes::pattern::{Pattern, Stitch};

/// Assign a speed to every stitch of every block.
///
/// The first and last stitch of each block are flagged as jumps first, since
/// the machine decelerates into and accelerates out of every block boundary.
pub fn plan_speeds(pattern: &mut Pattern, profile: &SpeedProfile) {
    for (index, block) in pattern.blocks.iter_mut().enumerate() {
        plan_block(&mut block.stitches, profile);
        tracing::trace!("Planned speeds for block {} ({} stitches)", index, block.stitches.len());
    }
}

/// Speed planning for a single block.
pub fn plan_block(stitches: &mut [Stitch], profile: &SpeedProfile) {
    for stitch in stitches.iter_mut() {
        stitch.speed = profile.max_speed;
    }

    let len = stitches.len();
    if len == 0 {
        return;
    }
    stitches[0].jump = true;
    stitches[len - 1].jump = true;

    for idx in 0..len {
        if !stitches[idx].jump {
            continue;
        }
        stitches[idx].speed = profile.min_jump_speed;
        ramp_backward(stitches, idx, profile);
        ramp_forward(stitches, idx, profile);
    }
}

/// Slow down towards the jump at `idx`, leaving any stitch that is already
/// slower than the proposed ramp untouched.
fn ramp_backward(stitches: &mut [Stitch], idx: usize, profile: &SpeedProfile) {
    let mut previous = stitches[idx].speed;
    for current in stitches[..idx].iter_mut().rev() {
        let candidate = next_ramp_speed(previous, profile);
        if current.speed > candidate {
            current.speed = candidate;
        } else {
            break;
        }
        if candidate == profile.max_speed {
            break;
        }
        previous = candidate;
    }
}

/// Speed up after the jump at `idx`. Forward writes are unconditional; a
/// later jump resets its own speed when its turn comes.
fn ramp_forward(stitches: &mut [Stitch], idx: usize, profile: &SpeedProfile) {
    let mut previous = stitches[idx].speed;
    for current in stitches[idx + 1..].iter_mut() {
        let candidate = next_ramp_speed(previous, profile);
        current.speed = candidate;
        if candidate == profile.max_speed {
            break;
        }
        previous = candidate;
    }
}

fn next_ramp_speed(previous: u32, profile: &SpeedProfile) -> u32 {
    previous.saturating_add(profile.ramp_step).min(profile.max_speed)
}
