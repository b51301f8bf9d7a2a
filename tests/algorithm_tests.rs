use polyfm::synth::algorithm::{builtin_bank, Algorithm, Connection, OPERATOR_COUNT};
use polyfm::synth::operator::Operator;

const SAMPLE_RATE: f32 = 44_100.0;

fn operators(frequency: f32) -> [Operator; OPERATOR_COUNT] {
    std::array::from_fn(|_| {
        let mut op = Operator::new(SAMPLE_RATE);
        op.set_frequency(frequency);
        op
    })
}

#[test]
fn modulation_bends_the_carrier_output() {
    let bank = builtin_bank();
    let simple_fm = &bank[0];

    // Same graph, but with the modulator muted: outputs must diverge
    // once the modulator contributes phase.
    let mut modulated = operators(220.0);
    modulated[1].set_frequency(440.0);

    let mut muted = operators(220.0);
    muted[1].set_frequency(440.0);
    muted[1].set_amplitude(0.0);

    let mut diverged = false;
    for _ in 0..128 {
        let a = simple_fm.process_sample(&mut modulated);
        let b = simple_fm.process_sample(&mut muted);
        if (a - b).abs() > 1e-4 {
            diverged = true;
        }
    }
    assert!(diverged, "a live modulator must change the carrier");
}

#[test]
fn organ_algorithm_sums_all_four_carriers() {
    let bank = builtin_bank();
    let organ = &bank[7];
    assert_eq!(organ.carriers(), &[0, 1, 2, 3]);

    let mut graph_ops = operators(110.0);
    let mut lone_ops = operators(110.0);
    for _ in 0..64 {
        let from_graph = organ.process_sample(&mut graph_ops);
        let manual: f32 = lone_ops
            .iter_mut()
            .map(|op| op.process_sample(0.0))
            .sum();
        assert!((from_graph - manual).abs() < 1e-6);
    }
}

#[test]
fn connection_weight_scales_modulation_depth() {
    let heavy = Algorithm::new(0, "heavy", vec![Connection::new(1, 0, 1.0)], vec![0]).unwrap();
    let light = Algorithm::new(0, "light", vec![Connection::new(1, 0, 0.1)], vec![0]).unwrap();

    let mut heavy_ops = operators(200.0);
    let mut light_ops = operators(200.0);
    heavy_ops[1].set_frequency(400.0);
    light_ops[1].set_frequency(400.0);

    // Accumulated absolute difference from a clean sine grows with the
    // connection weight.
    let mut clean = operators(200.0);
    let mut heavy_diff = 0.0_f32;
    let mut light_diff = 0.0_f32;
    for _ in 0..512 {
        let reference = clean[0].process_sample(0.0);
        heavy_diff += (heavy.process_sample(&mut heavy_ops) - reference).abs();
        light_diff += (light.process_sample(&mut light_ops) - reference).abs();
    }
    assert!(heavy_diff > light_diff * 2.0);
}

#[test]
fn evaluation_is_deterministic_for_a_fixed_graph() {
    let bank = builtin_bank();
    let serial = &bank[1]; // 3 -> 2 -> 1 -> 0

    let mut first_ops = operators(330.0);
    let mut second_ops = operators(330.0);
    for _ in 0..256 {
        let a = serial.process_sample(&mut first_ops);
        let b = serial.process_sample(&mut second_ops);
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn serial_stack_reaches_the_carrier_through_every_link() {
    let bank = builtin_bank();
    let serial = &bank[1];

    // Muting the deepest modulator (op 3) must still audibly differ
    // from muting nothing, proving the chain is wired end to end.
    let mut full = operators(220.0);
    let mut cut = operators(220.0);
    cut[3].set_amplitude(0.0);

    let mut difference = 0.0_f32;
    for _ in 0..256 {
        difference +=
            (serial.process_sample(&mut full) - serial.process_sample(&mut cut)).abs();
    }
    assert!(difference > 0.01);
}

#[test]
fn feedback_is_an_operator_property_not_a_connection() {
    // A self-loop is rejected as a connection...
    assert!(Algorithm::new(0, "self", vec![Connection::new(0, 0, 1.0)], vec![0]).is_err());

    // ...but the operator's own feedback term produces the effect.
    let bank = builtin_bank();
    let organ = &bank[7];
    let mut plain = operators(220.0);
    let mut fed = operators(220.0);
    for op in fed.iter_mut() {
        op.set_feedback_amount(0.7);
    }
    let mut difference = 0.0_f32;
    for _ in 0..256 {
        difference += (organ.process_sample(&mut fed) - organ.process_sample(&mut plain)).abs();
    }
    assert!(difference > 0.01);
}
