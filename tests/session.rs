// Integration tests for the session driver
mod common;

use async_trait::async_trait;
use common::PesBuilder;
use pes_stitcher::communication::{SimulatedController, StreamTransport, Transport, TransportError};
use pes_stitcher::{
    ArithmeticError, AutoConfirm, Axis, Color, ColorCheckpoint, CommandEncoder, CommandKind, Config, MotorPhase,
    Pattern, Session, SessionError, SessionState, ZeroStepPolicy, parse_pes, plan_speeds,
};
use tokio_test::io::Builder;

const MAGIC: u32 = 0xDECA_FBAD;

fn test_config() -> Config {
    let mut config = Config::default();
    config.session.enable_settle_ms = 0;
    config.session.response_timeout_ms = 200;
    config
}

fn planned(data: &[u8], config: &Config) -> Pattern {
    let mut pattern = parse_pes(data).unwrap();
    plan_speeds(&mut pattern, &config.speed);
    pattern
}

/// Two blocks, the first with an interior jump.
fn two_block_pattern(config: &Config) -> Pattern {
    let data = PesBuilder::new(&[1, 29])
        .short(10, 2)
        .short(3, 1)
        .long(200, -40)
        .short(3, 1)
        .color_change()
        .short(5, 0)
        .short(5, 1)
        .end()
        .build();
    planned(&data, config)
}

/// Remembers every color change it was asked about and stops at `stop_at`.
#[derive(Default)]
struct RecordingCheckpoint {
    seen: Vec<(usize, &'static str)>,
    stop_at: Option<usize>,
}

#[async_trait]
impl ColorCheckpoint for RecordingCheckpoint {
    async fn color_change(&mut self, block: usize, color: &'static Color) -> Result<(), SessionError> {
        self.seen.push((block, color.name));
        if self.stop_at == Some(block) {
            return Err(SessionError::Aborted { block });
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_full_session_against_simulated_controller() {
    let config = test_config();
    let pattern = two_block_pattern(&config);
    let mut controller = SimulatedController::new(MAGIC);
    let mut checkpoint = RecordingCheckpoint::default();

    let report = Session::for_pattern(&mut controller, &mut checkpoint, &config, &pattern)
        .run(&pattern)
        .await
        .unwrap();

    assert_eq!(checkpoint.seen, vec![(0, "Color1"), (1, "White")]);
    assert_eq!(report.blocks, 2);
    assert_eq!(report.stitches, 6);
    assert_eq!(report.commands_sent, 2 + 2 * 6);
    assert_eq!(report.controller_errors, 0);
    assert_eq!(report.busy_retries, 0);
    // block ends plus the long stitch
    assert_eq!(report.jump_stitches, 5);

    let received = controller.received();
    assert_eq!(received.len(), 14);
    assert_eq!(received[0].kind, CommandKind::EnableSteppers);
    assert_eq!(received[13].kind, CommandKind::DisableSteppers);
    let indices: Vec<u32> = received[1..13].iter().map(|c| c.index).collect();
    assert_eq!(indices, (0..12).collect::<Vec<u32>>());
    assert!(received[1..13].iter().all(|c| c.kind == CommandKind::Move));
    assert!(!controller.is_enabled());
    assert_eq!(controller.errors(), 0);
}

#[tokio::test]
async fn test_stitch_phases_turn_one_rotation() {
    let config = test_config();
    let pattern = two_block_pattern(&config);
    let mut controller = SimulatedController::new(MAGIC);
    let mut checkpoint = AutoConfirm;

    Session::for_pattern(&mut controller, &mut checkpoint, &config, &pattern)
        .run(&pattern)
        .await
        .unwrap();

    let motor: Vec<i32> = controller.received()[1..13].iter().map(|c| c.motor.step_count).collect();
    // jump, stitch, jump, jump | jump, jump
    assert_eq!(
        motor,
        vec![0, 11600, 2900, 8700, 0, 11600, 0, 11600, 0, 11600, 0, 11600]
    );
    assert_eq!(controller.motor_ticks(), 6 * 11600);

    // every move is addressed in shifted machine coordinates
    let rig = &config.rig;
    let mut encoder = CommandEncoder::new(rig, pattern.machine_offset(), MAGIC);
    let mut expected = Vec::new();
    for stitch in pattern.stitches() {
        for phase in MotorPhase::for_stitch(stitch) {
            expected.push(encoder.encode_move(stitch, phase.ticks(rig)).unwrap());
        }
    }
    assert_eq!(&controller.received()[1..13], expected.as_slice());
}

#[tokio::test]
async fn test_busy_responses_are_read_through() {
    let config = test_config();
    let pattern = two_block_pattern(&config);
    let mut controller = SimulatedController::new(MAGIC).with_busy_records([0, 3, 13]);
    let mut checkpoint = AutoConfirm;

    let mut session = Session::for_pattern(&mut controller, &mut checkpoint, &config, &pattern);
    let report = session.run(&pattern).await.unwrap();
    assert_eq!(session.state(), SessionState::Done);
    drop(session);

    assert_eq!(report.busy_retries, 3);
    assert_eq!(report.commands_sent, 14);
    assert_eq!(controller.received().len(), 14);
}

#[tokio::test]
async fn test_operator_abort_stops_before_block() {
    let config = test_config();
    let pattern = two_block_pattern(&config);
    let mut controller = SimulatedController::new(MAGIC);
    let mut checkpoint = RecordingCheckpoint { stop_at: Some(1), ..Default::default() };

    let mut session = Session::for_pattern(&mut controller, &mut checkpoint, &config, &pattern);
    let result = session.run(&pattern).await;
    assert!(matches!(result, Err(SessionError::Aborted { block: 1 })));
    assert_eq!(session.state(), SessionState::WaitColorConfirm { block: 1 });
    assert_eq!(session.report().blocks, 1);
    drop(session);

    // block 0 went out in full, nothing rolls back
    assert_eq!(controller.received().len(), 1 + 8);
    assert!(controller.is_enabled());
    assert_eq!(checkpoint.seen.len(), 2);
}

/// Middle stitch sits on the x == y diagonal, so motor A has nothing to do.
fn diagonal_pattern(config: &Config) -> Pattern {
    let data = PesBuilder::new(&[1]).short(1, 0).short(0, 1).short(2, -1).end().build();
    planned(&data, config)
}

#[tokio::test]
async fn test_zero_step_phases_are_skipped_by_default() {
    let config = test_config();
    assert_eq!(config.session.zero_step_policy, ZeroStepPolicy::SkipPhase);
    let pattern = diagonal_pattern(&config);
    let mut controller = SimulatedController::new(MAGIC);
    let mut checkpoint = AutoConfirm;

    let report = Session::for_pattern(&mut controller, &mut checkpoint, &config, &pattern)
        .run(&pattern)
        .await
        .unwrap();

    assert_eq!(report.skipped_phases, 2);
    assert_eq!(report.stitches, 3);
    assert_eq!(report.commands_sent, 2 + 4);
    // indices stay dense across the skipped phases
    let indices: Vec<u32> = controller.received()[1..5].iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_zero_step_phase_fails_when_configured() {
    let mut config = test_config();
    config.session.zero_step_policy = ZeroStepPolicy::Fail;
    let pattern = diagonal_pattern(&config);
    let mut controller = SimulatedController::new(MAGIC);
    let mut checkpoint = AutoConfirm;

    let mut session = Session::for_pattern(&mut controller, &mut checkpoint, &config, &pattern);
    let result = session.run(&pattern).await;
    assert!(matches!(
        result,
        Err(SessionError::Arithmetic { block: 0, stitch: 1, source: ArithmeticError::DivisionByZero { axis: Axis::X } })
    ));
    assert_eq!(session.state(), SessionState::PerStitch { block: 0, stitch: 1 });
    drop(session);
    assert_eq!(controller.received().len(), 1 + 2);
}

#[tokio::test]
async fn test_wire_bytes_over_a_stream() {
    let config = test_config();
    let data = PesBuilder::new(&[1]).short(5, 3).end().build();
    let pattern = planned(&data, &config);

    let rig = &config.rig;
    let mut encoder = CommandEncoder::new(rig, pattern.machine_offset(), MAGIC);
    let stitch = pattern.blocks[0].stitches[0];
    assert!(stitch.jump);
    let travel = encoder.encode_move(&stitch, MotorPhase::JumpMove.ticks(rig)).unwrap();
    let settle = encoder.encode_move(&stitch, MotorPhase::JumpSettle.ticks(rig)).unwrap();

    let mock = Builder::new()
        .write(&encoder.control(CommandKind::EnableSteppers).to_bytes())
        .read(b"ok enable\n")
        .write(&travel.to_bytes())
        .read(b"!busy\n")
        .read(b"ok 0\n")
        .write(&settle.to_bytes())
        .read(b"ok 1\n")
        .write(&encoder.control(CommandKind::DisableSteppers).to_bytes())
        .read(b"err unknown\n")
        .build();
    let mut transport = StreamTransport::new(mock);
    let mut checkpoint = AutoConfirm;

    let report = Session::for_pattern(&mut transport, &mut checkpoint, &config, &pattern)
        .run(&pattern)
        .await
        .unwrap();

    assert_eq!(report.commands_sent, 4);
    assert_eq!(report.busy_retries, 1);
    // error replies are reported, not fatal
    assert_eq!(report.controller_errors, 1);
    assert_eq!(transport.stats().bytes_sent, 4 * 36);
}

#[tokio::test]
async fn test_split_replies_are_joined_before_the_next_command() {
    let config = test_config();
    let data = PesBuilder::new(&[1]).short(5, 3).end().build();
    let pattern = planned(&data, &config);

    let rig = &config.rig;
    let mut encoder = CommandEncoder::new(rig, pattern.machine_offset(), MAGIC);
    let stitch = pattern.blocks[0].stitches[0];
    let travel = encoder.encode_move(&stitch, MotorPhase::JumpMove.ticks(rig)).unwrap();
    let settle = encoder.encode_move(&stitch, MotorPhase::JumpSettle.ticks(rig)).unwrap();

    // every record is only written once the previous reply line is complete
    let mock = Builder::new()
        .write(&encoder.control(CommandKind::EnableSteppers).to_bytes())
        .read(b"ok")
        .read(b" enable\n")
        .write(&travel.to_bytes())
        .read(b"ok 0\n")
        .write(&settle.to_bytes())
        .read(b"o")
        .read(b"k ")
        .read(b"1\n")
        .write(&encoder.control(CommandKind::DisableSteppers).to_bytes())
        .read(b"ok disable\n")
        .build();
    let mut transport = StreamTransport::new(mock);
    let mut checkpoint = AutoConfirm;

    let report = Session::for_pattern(&mut transport, &mut checkpoint, &config, &pattern)
        .run(&pattern)
        .await
        .unwrap();

    assert_eq!(report.commands_sent, 4);
    assert_eq!(report.busy_retries, 0);
    assert_eq!(report.controller_errors, 0);
    assert_eq!(transport.bytes_available(), 0);
}

#[tokio::test]
async fn test_closed_stream_ends_session() {
    let config = test_config();
    let data = PesBuilder::new(&[1]).short(5, 3).end().build();
    let pattern = planned(&data, &config);

    let encoder = CommandEncoder::new(&config.rig, pattern.machine_offset(), MAGIC);
    let mock = Builder::new()
        .write(&encoder.control(CommandKind::EnableSteppers).to_bytes())
        .read(b"ok enable\n")
        .write(&encoder.clone().encode_move(&pattern.blocks[0].stitches[0], 0).unwrap().to_bytes())
        .build();
    let mut transport = StreamTransport::new(mock);
    let mut checkpoint = AutoConfirm;

    let result = Session::for_pattern(&mut transport, &mut checkpoint, &config, &pattern)
        .run(&pattern)
        .await;
    assert!(matches!(result, Err(SessionError::Transport(TransportError::Closed))));
}

#[tokio::test]
async fn test_silent_controller_times_out() {
    let mut config = test_config();
    config.session.response_timeout_ms = 20;
    let data = PesBuilder::new(&[1]).short(5, 3).end().build();
    let pattern = planned(&data, &config);

    let (client, _server) = tokio::io::duplex(1024);
    let mut transport = StreamTransport::new(client);
    let mut checkpoint = AutoConfirm;

    let mut session = Session::for_pattern(&mut transport, &mut checkpoint, &config, &pattern);
    let result = session.run(&pattern).await;
    assert!(matches!(result, Err(SessionError::Transport(TransportError::Timeout { .. }))));
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_empty_pattern_only_toggles_drivers() {
    let config = test_config();
    let data = PesBuilder::new(&[1]).end().build();
    let pattern = planned(&data, &config);
    let mut controller = SimulatedController::new(MAGIC);
    let mut checkpoint = RecordingCheckpoint::default();

    let report = Session::for_pattern(&mut controller, &mut checkpoint, &config, &pattern)
        .run(&pattern)
        .await
        .unwrap();
    assert_eq!(report.commands_sent, 2);
    assert!(checkpoint.seen.is_empty());
    assert!(!controller.is_enabled());
}
