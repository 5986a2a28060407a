//! Boot sequence tests: lamp self-test, initial set and its timeout.

use rs_blocksig::config::{LampConfig, NodeConfig, SignalConfig, SignalsConfig, TimingConfig};
use rs_blocksig::hal::{MockLamp, MockMqtt, MockSensor};
use rs_blocksig::{Aspect, BlockNode, NodePhase, SignalDirection, SignalType};

type Node = BlockNode<MockSensor, MockLamp, MockMqtt>;

fn node_with(config: NodeConfig) -> Node {
    BlockNode::new(
        config,
        [MockSensor::new(), MockSensor::new()],
        [MockLamp::new(), MockLamp::new()],
        [MockLamp::new()],
        MockMqtt::new(),
    )
}

fn run(node: &mut Node, from: u64, to: u64) {
    let mut t = from;
    while t <= to {
        node.tick(t).unwrap();
        t += 20;
    }
}

/// Number of separate lit periods in a lamp's write history.
fn flashes(lamp: &MockLamp) -> usize {
    let mut count = 0;
    let mut lit = false;
    for &level in &lamp.history {
        if level > 0 && !lit {
            count += 1;
        }
        lit = level > 0;
    }
    count
}

fn outputs(node: &Node) -> Vec<&MockLamp> {
    SignalDirection::ALL
        .iter()
        .flat_map(|&d| node.controller().signal(d).lamps())
        .map(|lamp| lamp.output())
        .collect()
}

// ============================================================================
// Self-test
// ============================================================================

#[test]
fn every_lamp_flashes_the_configured_count() {
    let mut node = node_with(NodeConfig::default());

    run(&mut node, 0, 980);
    assert_eq!(node.state().phase, NodePhase::StartUp);

    // 400 ms period: the third dark phase starts at 1000
    node.tick(1000).unwrap();
    assert_eq!(node.state().phase, NodePhase::InitialSet);

    run(&mut node, 1020, 3000);
    for lamp in outputs(&node) {
        assert_eq!(flashes(lamp), 3);
        assert_eq!(lamp.level, 0);
        // Lit at the brightness ceiling, never above
        assert!(lamp.history.iter().all(|&l| l == 0 || l == 125));
    }
}

#[test]
fn self_test_uses_configured_flash_period() {
    let config = NodeConfig::default().with_lamps(
        LampConfig::default()
            .with_flash_at_startup(2)
            .with_flash_slow_ms(200),
    );
    let mut node = node_with(config);

    run(&mut node, 0, 280);
    assert_eq!(node.state().phase, NodePhase::StartUp);
    node.tick(300).unwrap();
    assert_eq!(node.state().phase, NodePhase::InitialSet);
}

#[test]
fn zero_flash_period_does_not_stall_start_up() {
    let config = NodeConfig::default().with_lamps(LampConfig::default().with_flash_slow_ms(0));
    let mut node = node_with(config);
    node.client_mut().queue_message("mqtt_n/bs-1/forward", "d80");
    node.client_mut().queue_message("mqtt_n/bs-1/backward", "stop");
    run(&mut node, 0, 100);

    assert_eq!(node.state().phase, NodePhase::Running);
    assert_eq!(node.state().aspects, [Aspect::Clear, Aspect::Stop]);
    let backward = &node.controller().signal(SignalDirection::Backward).lamps()[0];
    assert!(!backward.is_flashing());
    assert!(backward.output().history.iter().all(|&level| level == 0));
}

// ============================================================================
// Initial set
// ============================================================================

#[test]
fn initial_set_shows_stop_until_every_signal_is_commanded() {
    let mut node = node_with(NodeConfig::default());
    run(&mut node, 0, 1000);

    assert_eq!(node.state().aspects, [Aspect::Stop, Aspect::Stop]);

    node.client_mut().queue_message("mqtt_n/bs-1/forward", "d40");
    run(&mut node, 1020, 3000);
    assert_eq!(node.state().phase, NodePhase::InitialSet);

    node.client_mut().queue_message("mqtt_n/bs-1/backward", "d80");
    node.tick(3020).unwrap();
    assert_eq!(node.state().phase, NodePhase::Running);
    assert_eq!(node.state().aspects, [Aspect::Caution, Aspect::Clear]);
}

#[test]
fn initial_set_times_out_with_signals_at_stop() {
    let config = NodeConfig::default()
        .with_timing(TimingConfig::default().with_initial_set_timeout_ms(3000));
    let mut node = node_with(config);
    run(&mut node, 0, 1000);

    node.client_mut().queue_message("mqtt_n/bs-1/forward", "d80");
    run(&mut node, 1020, 3980);
    assert_eq!(node.state().phase, NodePhase::InitialSet);

    node.tick(4000).unwrap();
    assert_eq!(node.state().phase, NodePhase::Running);
    assert_eq!(node.state().aspects, [Aspect::Clear, Aspect::Stop]);
}

#[test]
fn commands_during_self_test_apply_on_initial_set() {
    let mut node = node_with(NodeConfig::default());
    node.client_mut().queue_message("mqtt_n/bs-1/forward", "d80");
    run(&mut node, 0, 980);

    // Held, the self-test keeps flashing
    assert_eq!(node.state().aspects, [Aspect::Stop, Aspect::Stop]);
    assert_eq!(node.stats().commands_accepted, 1);

    node.tick(1000).unwrap();
    assert_eq!(node.state().phase, NodePhase::InitialSet);
    assert_eq!(node.state().aspects, [Aspect::Clear, Aspect::Stop]);

    run(&mut node, 1020, 1060);
    let forward = node.controller().signal(SignalDirection::Forward).lamps();
    assert!(forward.iter().all(|lamp| lamp.output().level == 125));
}

#[test]
fn unused_signal_does_not_block_initial_set() {
    let config = NodeConfig::default()
        .with_lamps(LampConfig::default().with_flash_at_startup(1))
        .with_signals(
            SignalsConfig::default()
                .with_backward(SignalConfig::new("backward", SignalType::NotUsed)),
        );
    let mut node = node_with(config);
    run(&mut node, 0, 400);
    assert_eq!(node.state().phase, NodePhase::InitialSet);

    node.client_mut().queue_message("mqtt_n/bs-1/forward", "stop");
    node.tick(420).unwrap();
    assert_eq!(node.state().phase, NodePhase::Running);
}

// ============================================================================
// Reset
// ============================================================================

#[test]
fn reset_repeats_the_boot_sequence() {
    let config = NodeConfig::default().with_lamps(LampConfig::default().with_flash_at_startup(1));
    let mut node = node_with(config);
    run(&mut node, 0, 400);
    node.client_mut().queue_message("mqtt_n/bs-1/forward", "d80");
    node.client_mut().queue_message("mqtt_n/bs-1/backward", "d80");
    node.tick(420).unwrap();
    assert_eq!(node.state().phase, NodePhase::Running);

    node.reset();
    assert_eq!(node.state().phase, NodePhase::StartUp);
    assert_eq!(node.state().aspects, [Aspect::Stop, Aspect::Stop]);

    // Self-test starts again on the next tick
    node.tick(1000).unwrap();
    let lamp = &node.controller().signal(SignalDirection::Backward).lamps()[0];
    assert!(lamp.is_flashing());
    run(&mut node, 1020, 1400);
    assert_eq!(node.state().phase, NodePhase::InitialSet);
}
