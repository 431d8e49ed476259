//! End-to-end tests: build, compile and run graphs.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use passgraph_core::config::ConfigRecord;
use passgraph_graphics::compiler::StepKind;
use passgraph_graphics::passes::{AccumulateConfig, AccumulatePass};
use passgraph_graphics::{
    compile, presets, BuildError, CompileError, CompileOptions, EdgeKind, Executor, Extent2d,
    FrameError, GraphBuilder, HostDevice, Lifetime, PassError, PassRegistry, RenderGraph,
};
use rstest::rstest;

use common::{
    init_logger, small_options, AsyncCopy, AsyncSource, CopyPass, Counter, Failing, Source,
};

fn reference_graph() -> RenderGraph {
    let registry = PassRegistry::with_builtin_passes();
    presets::restir_dlss(&registry).unwrap()
}

// ============================================================================
// Reference graph
// ============================================================================

#[test]
fn test_reference_graph_order_and_output() {
    init_logger();
    let graph = reference_graph();
    let plan = compile(&graph, &small_options()).unwrap();

    assert_eq!(
        plan.pass_order(),
        ["VBufferRT", "ReSTIRPass", "AccumulatePass", "DLSSPass", "ToneMapper"]
    );
    assert_eq!(plan.outputs().len(), 1);
    assert_eq!(plan.outputs()[0].name, "ToneMapper.dst");
}

#[test]
fn test_reference_graph_runs() {
    init_logger();
    let mut graph = reference_graph();
    let device = HostDevice::new();
    let mut executor = Executor::new();
    executor
        .ensure_compiled(&graph, &small_options(), &device)
        .unwrap();

    for frame in 0..3 {
        let outputs = executor.execute_frame(&mut graph, &device).unwrap();
        assert_eq!(outputs.frame, frame);
        assert_eq!(outputs.images.len(), 1);
        let image = outputs.get("ToneMapper.dst").unwrap();
        assert_eq!(image.extent, Extent2d::new(8, 4));
        // The sphere covers the centre, the corners are background.
        assert!(image.texel(4, 2).unwrap()[0] > 0.0);
        assert_eq!(image.texel(0, 0).unwrap()[0], 0.0);
    }
    assert_eq!(executor.pool().outstanding(), 0);
    assert_eq!(executor.stats().completed, 3);
}

#[test]
fn test_compilation_is_deterministic() {
    let options = small_options();
    let first = compile(&reference_graph(), &options).unwrap();
    let second = compile(&reference_graph(), &options).unwrap();
    assert_eq!(first, second);

    let graph = reference_graph();
    assert_eq!(compile(&graph, &options).unwrap(), compile(&graph, &options).unwrap());
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_immediate_cycle_is_rejected() {
    let mut graph = RenderGraph::new();
    graph.add_pass("A", CopyPass::boxed()).unwrap();
    graph.add_pass("B", CopyPass::boxed()).unwrap();
    graph.add_edge("A.out", "B.in").unwrap();
    graph.add_edge("B.out", "A.in").unwrap();
    graph.mark_output("B.out").unwrap();

    assert_eq!(
        compile(&graph, &small_options()).unwrap_err(),
        CompileError::CycleDetected {
            passes: vec!["A".into(), "B".into()]
        }
    );
}

#[test]
fn test_duplicate_name() {
    let registry = PassRegistry::with_builtin_passes();
    let mut builder = GraphBuilder::new(&registry);
    builder
        .add_pass("ToneMapper", "ToneMapper", &ConfigRecord::new())
        .unwrap();
    assert_eq!(
        builder
            .add_pass("ToneMapper", "ToneMapper", &ConfigRecord::new())
            .unwrap_err(),
        BuildError::DuplicateName("ToneMapper".into())
    );
    assert_eq!(builder.graph().pass_count(), 1);
}

#[rstest]
#[case::missing_pass("Nope.output", "ToneMapper.src")]
#[case::missing_port("DLSSPass.colour", "ToneMapper.src")]
#[case::malformed("DLSSPass", "ToneMapper.src")]
#[case::missing_destination("DLSSPass.output", "ToneMapper.source")]
fn test_unknown_port(#[case] src: &str, #[case] dst: &str) {
    let registry = PassRegistry::with_builtin_passes();
    let mut builder = GraphBuilder::new(&registry);
    builder
        .add_pass("DLSSPass", "DLSSPass", &ConfigRecord::new())
        .unwrap();
    builder
        .add_pass("ToneMapper", "ToneMapper", &ConfigRecord::new())
        .unwrap();

    let revision = builder.graph().revision();
    assert!(matches!(
        builder.add_edge(src, dst),
        Err(BuildError::UnknownPort(_))
    ));
    assert_eq!(builder.graph().revision(), revision);
    assert!(builder.graph().edges().is_empty());
}

#[test]
fn test_no_final_output() {
    let mut graph = RenderGraph::new();
    graph.add_pass("src", Source::constant(1.0)).unwrap();
    assert_eq!(
        compile(&graph, &small_options()).unwrap_err(),
        CompileError::NoFinalOutput
    );
}

#[test]
fn test_unbound_required_input() {
    let mut graph = RenderGraph::new();
    graph.add_pass("copy", CopyPass::boxed()).unwrap();
    graph.mark_output("copy.out").unwrap();
    assert_eq!(
        compile(&graph, &small_options()).unwrap_err(),
        CompileError::UnboundRequiredInput {
            pass: "copy".into(),
            port: "in".into()
        }
    );
}

// ============================================================================
// Temporal feedback
// ============================================================================

#[test]
fn test_feedback_self_edge_sees_previous_frame() {
    init_logger();
    let mut graph = RenderGraph::new();
    graph.add_pass("counter", Counter::boxed()).unwrap();
    graph.add_edge("counter.count", "counter.prev").unwrap();
    graph.mark_output("counter.count").unwrap();
    assert_eq!(graph.edges()[0].kind, EdgeKind::Feedback);

    let device = HostDevice::new();
    let mut executor = Executor::new();
    executor
        .ensure_compiled(&graph, &small_options(), &device)
        .unwrap();
    let plan = executor.plan().unwrap();
    assert_eq!(plan.slot_named("counter.count").unwrap().lifetime, Lifetime::Temporal);
    assert_eq!(plan.feedback().len(), 1);

    for frame in 0..5u64 {
        let outputs = executor.execute_frame(&mut graph, &device).unwrap();
        let count = outputs.get("counter.count").unwrap().texel(0, 0).unwrap()[0];
        assert_eq!(count, (frame + 1) as f32);
    }
    // Both history buffers, allocated once at install.
    assert_eq!(device.allocation_count(), 2);
}

#[test]
fn test_explicit_feedback_edge_delays_by_one_frame() {
    let mut graph = RenderGraph::new();
    graph.add_pass("src", Source::frame_counter()).unwrap();
    graph.add_pass("delay", CopyPass::boxed()).unwrap();
    graph.add_feedback_edge("src.out", "delay.in").unwrap();
    graph.mark_output("delay.out").unwrap();

    let device = HostDevice::new();
    let mut executor = Executor::new();
    executor
        .ensure_compiled(&graph, &small_options(), &device)
        .unwrap();

    let mut seen = Vec::new();
    for _ in 0..3 {
        let outputs = executor.execute_frame(&mut graph, &device).unwrap();
        seen.push(outputs.get("delay.out").unwrap().texel(0, 0).unwrap()[0]);
    }
    assert_eq!(seen, [0.0, 1.0, 2.0]);
}

// ============================================================================
// Disabled passes
// ============================================================================

#[test]
fn test_disabled_accumulate_passes_input_through() {
    let disabled = AccumulatePass::new(AccumulateConfig {
        enabled: false,
        ..AccumulateConfig::default()
    });
    let mut graph = RenderGraph::new();
    graph.add_pass("src", Source::frame_counter()).unwrap();
    graph.add_pass("acc", Box::new(disabled)).unwrap();
    graph.add_edge("src.out", "acc.input").unwrap();
    graph.mark_output("acc.output").unwrap();

    let device = HostDevice::new();
    let mut executor = Executor::new();
    executor
        .ensure_compiled(&graph, &small_options(), &device)
        .unwrap();
    let plan = executor.plan().unwrap();
    assert_eq!(plan.execution_order(), ["src"]);
    assert_eq!(plan.steps()[1].kind, StepKind::Bypass);
    assert!(plan.slot_named("acc.output").is_some());

    for frame in 0..2u64 {
        let outputs = executor.execute_frame(&mut graph, &device).unwrap();
        let value = outputs.get("acc.output").unwrap().texel(1, 1).unwrap()[0];
        assert_eq!(value, (frame + 1) as f32);
    }

    // Enabling the pass recompiles and starts averaging.
    assert!(graph.set_pass_enabled("acc", true));
    assert!(executor
        .ensure_compiled(&graph, &small_options(), &device)
        .unwrap());
    let third = executor.execute_frame(&mut graph, &device).unwrap();
    assert_eq!(third.get("acc.output").unwrap().texel(0, 0).unwrap()[0], 3.0);
    let fourth = executor.execute_frame(&mut graph, &device).unwrap();
    assert_eq!(fourth.get("acc.output").unwrap().texel(0, 0).unwrap()[0], 3.5);
}

#[test]
fn test_disabled_restir_yields_black() {
    let mut graph = reference_graph();
    assert!(graph.set_pass_enabled("ReSTIRPass", false));

    let device = HostDevice::new();
    let mut executor = Executor::new();
    executor
        .ensure_compiled(&graph, &small_options(), &device)
        .unwrap();
    assert_eq!(
        executor.plan().unwrap().execution_order(),
        ["VBufferRT", "DLSSPass", "ToneMapper"]
    );

    let outputs = executor.execute_frame(&mut graph, &device).unwrap();
    let average = outputs.get("ToneMapper.dst").unwrap().average();
    assert_eq!(&average[..3], &[0.0, 0.0, 0.0]);
}

// ============================================================================
// Resources
// ============================================================================

#[test]
fn test_transients_with_disjoint_lifetimes_share_storage() {
    let mut graph = RenderGraph::new();
    graph.add_pass("p0", Source::constant(0.5)).unwrap();
    graph.add_pass("p1", CopyPass::boxed()).unwrap();
    graph.add_pass("p2", CopyPass::boxed()).unwrap();
    graph.add_pass("p3", CopyPass::boxed()).unwrap();
    graph.add_edge("p0.out", "p1.in").unwrap();
    graph.add_edge("p1.out", "p2.in").unwrap();
    graph.add_edge("p2.out", "p3.in").unwrap();
    graph.mark_output("p3.out").unwrap();

    let device = HostDevice::new();
    let mut executor = Executor::new();
    executor
        .ensure_compiled(&graph, &small_options(), &device)
        .unwrap();
    let outputs = executor.execute_frame(&mut graph, &device).unwrap();
    assert_eq!(outputs.get("p3.out").unwrap().texel(7, 3).unwrap()[0], 0.5);

    // Four slots, but never more than two alive at once.
    assert_eq!(executor.plan().unwrap().slots().len(), 4);
    assert_eq!(device.allocation_count(), 2);

    executor.execute_frame(&mut graph, &device).unwrap();
    assert_eq!(device.allocation_count(), 2);
    assert_eq!(executor.pool().outstanding(), 0);
}

#[test]
fn test_failed_frame_keeps_history_and_releases_transients() {
    init_logger();
    let (failing, fail) = Failing::switchable();
    let mut graph = RenderGraph::new();
    graph.add_pass("counter", Counter::boxed()).unwrap();
    graph.add_pass("check", failing).unwrap();
    graph.add_edge("counter.count", "counter.prev").unwrap();
    graph.add_edge("counter.count", "check.in").unwrap();
    graph.mark_output("check.out").unwrap();

    let device = HostDevice::new();
    let mut executor = Executor::new();
    executor
        .ensure_compiled(&graph, &small_options(), &device)
        .unwrap();

    let first = executor.execute_frame(&mut graph, &device).unwrap();
    assert_eq!(first.get("check.out").unwrap().texel(0, 0).unwrap()[0], 1.0);

    fail.store(true, Ordering::SeqCst);
    let err = executor.execute_frame(&mut graph, &device).unwrap_err();
    assert_eq!(
        err,
        FrameError::PassFailed {
            pass: "check".into(),
            frame: 1,
            source: PassError::Failed("switched off".into()),
        }
    );
    assert_eq!(executor.frame_index(), 1);
    assert_eq!(executor.pool().outstanding(), 0);
    assert_eq!(executor.stats().aborted, 1);

    fail.store(false, Ordering::SeqCst);
    let retry = executor.execute_frame(&mut graph, &device).unwrap();
    assert_eq!(retry.frame, 1);
    assert_eq!(retry.get("check.out").unwrap().texel(0, 0).unwrap()[0], 2.0);
}

// ============================================================================
// Submissions
// ============================================================================

#[test]
fn test_async_submission_is_joined_before_consumers() {
    let mut graph = RenderGraph::new();
    graph
        .add_pass("async", AsyncSource::boxed(7.0, Duration::from_millis(30)))
        .unwrap();
    graph.add_pass("copy", CopyPass::boxed()).unwrap();
    graph.add_edge("async.out", "copy.in").unwrap();
    graph.mark_output("copy.out").unwrap();
    graph.mark_output("async.out").unwrap();

    let device = HostDevice::new();
    let mut executor = Executor::new();
    executor
        .ensure_compiled(&graph, &small_options(), &device)
        .unwrap();
    let outputs = executor.execute_frame(&mut graph, &device).unwrap();
    assert_eq!(outputs.get("copy.out").unwrap().texel(2, 2).unwrap()[0], 7.0);
    assert_eq!(outputs.get("async.out").unwrap().texel(2, 2).unwrap()[0], 7.0);
}

#[test]
fn test_async_reader_retires_before_slot_is_reused() {
    init_logger();
    let mut graph = RenderGraph::new();
    graph.add_pass("src", Source::constant(1.0)).unwrap();
    graph
        .add_pass("async", AsyncCopy::boxed(Duration::from_millis(100)))
        .unwrap();
    graph.add_pass("copy", CopyPass::boxed()).unwrap();
    graph.add_pass("late", Source::constant(9.0)).unwrap();
    graph.add_edge("src.out", "async.in").unwrap();
    graph.add_edge("src.out", "copy.in").unwrap();
    for output in ["async.out", "copy.out", "late.out"] {
        graph.mark_output(output).unwrap();
    }

    let device = HostDevice::new();
    let mut executor = Executor::new();
    executor
        .ensure_compiled(&graph, &small_options(), &device)
        .unwrap();
    assert_eq!(
        executor.plan().unwrap().execution_order(),
        ["src", "async", "copy", "late"]
    );

    // `src.out` is released after `copy`, and `late.out` takes over its storage.
    let outputs = executor.execute_frame(&mut graph, &device).unwrap();
    assert_eq!(outputs.get("async.out").unwrap().texel(0, 0).unwrap()[0], 1.0);
    assert_eq!(outputs.get("copy.out").unwrap().texel(0, 0).unwrap()[0], 1.0);
    assert_eq!(outputs.get("late.out").unwrap().texel(0, 0).unwrap()[0], 9.0);
    assert_eq!(device.allocation_count(), 3);
    assert_eq!(executor.pool().outstanding(), 0);
}

// ============================================================================
// Recompilation
// ============================================================================

#[test]
fn test_recompile_keeps_feedback_history() {
    let mut graph = RenderGraph::new();
    graph.add_pass("counter", Counter::boxed()).unwrap();
    graph.add_edge("counter.count", "counter.prev").unwrap();
    graph.mark_output("counter.count").unwrap();

    let device = HostDevice::new();
    let mut executor = Executor::new();
    executor
        .ensure_compiled(&graph, &small_options(), &device)
        .unwrap();
    for _ in 0..2 {
        executor.execute_frame(&mut graph, &device).unwrap();
    }

    graph.add_pass("extra", Source::constant(0.5)).unwrap();
    graph.mark_output("extra.out").unwrap();
    assert!(executor
        .ensure_compiled(&graph, &small_options(), &device)
        .unwrap());

    let outputs = executor.execute_frame(&mut graph, &device).unwrap();
    assert_eq!(outputs.get("counter.count").unwrap().texel(0, 0).unwrap()[0], 3.0);
    // The history pair survived; only `extra.out` is new.
    assert_eq!(device.allocation_count(), 3);
}

#[test]
fn test_compile_error_keeps_installed_plan() {
    let mut graph = RenderGraph::new();
    graph.add_pass("src", Source::constant(2.0)).unwrap();
    graph.mark_output("src.out").unwrap();

    let device = HostDevice::new();
    let mut executor = Executor::new();
    executor
        .ensure_compiled(&graph, &small_options(), &device)
        .unwrap();
    let installed = executor.plan().unwrap().revision();

    graph.add_pass("dangling", CopyPass::boxed()).unwrap();
    assert!(matches!(
        executor.ensure_compiled(&graph, &small_options(), &device),
        Err(CompileError::UnboundRequiredInput { .. })
    ));
    assert_eq!(executor.plan().unwrap().revision(), installed);
    assert_eq!(executor.stats().compilations, 1);

    let outputs = executor.execute_frame(&mut graph, &device).unwrap();
    assert_eq!(outputs.get("src.out").unwrap().texel(0, 0).unwrap()[0], 2.0);
}

#[test]
fn test_extent_change_recompiles() {
    let graph = reference_graph();
    let device = HostDevice::new();
    let mut executor = Executor::new();
    let small = small_options();
    let large = CompileOptions::default().with_extent(Extent2d::new(16, 8));

    assert!(executor.ensure_compiled(&graph, &small, &device).unwrap());
    assert!(!executor.ensure_compiled(&graph, &small, &device).unwrap());
    assert!(executor.ensure_compiled(&graph, &large, &device).unwrap());
    assert_eq!(executor.plan().unwrap().extent(), Extent2d::new(16, 8));
}
