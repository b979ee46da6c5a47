use super::*;
use crate::foundation::core::Rgba;

fn plan(method: PeelingMethod, layers: u32) -> PassPlan {
    PassPlan::for_method(method, &PeelOpts::default().with_layers(layers)).unwrap()
}

#[test]
fn geometry_pass_counts_follow_the_method() {
    for n in 1..=9u32 {
        assert_eq!(
            plan(PeelingMethod::DualPeeling, n).geometry_pass_count(),
            n.div_ceil(2) as usize + 1,
            "dual N={n}"
        );
        assert_eq!(dual_pass_count(n) as usize, n.div_ceil(2) as usize + 1);
        assert_eq!(
            plan(PeelingMethod::FrontToBack, n).geometry_pass_count(),
            n as usize,
            "front-to-back N={n}"
        );
        assert_eq!(plan(PeelingMethod::WeightedAverage, n).geometry_pass_count(), 1);
        assert_eq!(plan(PeelingMethod::WeightedSum, n).geometry_pass_count(), 1);
    }
}

#[test]
fn zero_layers_is_a_configuration_error() {
    let err = PassPlan::for_method(PeelingMethod::DualPeeling, &PeelOpts::default().with_layers(0))
        .unwrap_err();
    assert!(matches!(err, PeelError::Config(_)));
}

#[test]
fn dual_layout_uses_seven_targets_and_three_attachments() {
    let p = plan(PeelingMethod::DualPeeling, 4);
    assert_eq!(p.buffers.len(), 7);
    assert_eq!(p.max_color_attachments(), 3);
    assert_eq!(p.composite_count(), 2);
    let formats: Vec<_> = p.buffers.iter().map(|b| b.format).collect();
    assert_eq!(
        formats.iter().filter(|&&f| f == TargetFormat::Rg32Float).count(),
        2
    );
}

#[test]
fn no_pass_reads_what_it_writes() {
    for method in [
        PeelingMethod::DualPeeling,
        PeelingMethod::FrontToBack,
        PeelingMethod::WeightedAverage,
        PeelingMethod::WeightedSum,
    ] {
        for pass in &plan(method, 6).passes {
            let writes = pass.writes();
            assert!(
                pass.reads.iter().all(|r| !writes.contains(r)),
                "{method} pass {} reads a written buffer",
                pass.index
            );
            if let Some(c) = pass.composite {
                assert_ne!(c.source, c.target);
            }
        }
    }
}

#[test]
fn ping_pong_slots_alternate_between_peel_passes() {
    let p = plan(PeelingMethod::FrontToBack, 5);
    for pair in p.passes.windows(2).skip(1) {
        let (a, b) = (&pair[0], &pair[1]);
        let da = a.depth.unwrap().buffer;
        let db = b.depth.unwrap().buffer;
        assert_ne!(da.slot, db.slot);
        assert_eq!(b.reads, vec![da]);
    }
    // The init pass seeds slot 0, read by the first peel pass.
    assert_eq!(p.passes[1].reads[0].slot, 0);
    assert_eq!(p.passes[1].depth.unwrap().buffer.slot, 1);
}

#[test]
fn dual_resolve_reads_the_last_written_front_slot() {
    for n in 1..=6 {
        let p = plan(PeelingMethod::DualPeeling, n);
        let last = p.passes.last().unwrap();
        let front = last
            .colors
            .iter()
            .find(|c| c.buffer.role == BufferRole::FrontBlender)
            .unwrap()
            .buffer;
        assert_eq!(p.resolve.reads[0], front, "N={n}");
        assert_eq!(p.resolve.equation, ResolveEquation::DualFrontBack);
    }
}

#[test]
fn dual_back_blender_starts_at_the_background() {
    let opts = PeelOpts::default().with_background(Rgba::new(0.2, 0.4, 0.6, 1.0));
    let p = PassPlan::for_method(PeelingMethod::DualPeeling, &opts).unwrap();
    let back = p.passes[0]
        .colors
        .iter()
        .find(|c| c.buffer == BACK_BLENDER)
        .unwrap();
    assert_eq!(back.clear, Some([0.2, 0.4, 0.6, 0.0]));
    assert_eq!(back.blend, None);
}

#[test]
fn weighted_average_adds_a_coverage_target() {
    let avg = plan(PeelingMethod::WeightedAverage, 4);
    let sum = plan(PeelingMethod::WeightedSum, 4);
    assert_eq!(avg.buffers.len(), 2);
    assert_eq!(sum.buffers.len(), 1);
    assert!(
        avg.passes[0]
            .colors
            .iter()
            .all(|c| c.blend == Some(BlendState::ADDITIVE))
    );
}

#[test]
fn plan_serializes_with_method_identifier() {
    let json = serde_json::to_value(plan(PeelingMethod::FrontToBack, 2)).unwrap();
    assert_eq!(json["method"], "FRONT_TO_BACK");
    assert_eq!(json["passes"].as_array().unwrap().len(), 2);
    assert_eq!(json["passes"][1]["kind"]["kind"], "peel");
    assert_eq!(json["resolve"]["equation"], "front_to_back");
}

#[test]
fn front_to_back_depth_clears_above_the_far_plane() {
    for pass in &plan(PeelingMethod::FrontToBack, 3).passes {
        let depth = pass.depth.unwrap();
        assert_eq!(depth.compare, CompareFunction::Less);
        assert!(depth.compare.passes(MAX_DEPTH, depth.clear.unwrap()));
    }
}
