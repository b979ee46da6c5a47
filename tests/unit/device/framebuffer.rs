use super::*;

fn vp(w: u32, h: u32) -> Viewport {
    Viewport::new(i64::from(w), i64::from(h)).unwrap()
}

const A: BufferRef = BufferRef::new(BufferRole::FrontBlender, 0);
const B: BufferRef = BufferRef::new(BufferRole::FrontBlender, 1);
const D: BufferRef = BufferRef::single(BufferRole::PeelDepth);

fn set_with_two() -> FramebufferSet {
    let mut fb = FramebufferSet::new(vp(4, 3), DeviceLimits::default()).unwrap();
    fb.allocate(A, TargetFormat::Rgba32Float).unwrap();
    fb.allocate(B, TargetFormat::Rgba32Float).unwrap();
    fb
}

#[test]
fn allocation_respects_target_limit() {
    let limits = DeviceLimits {
        max_render_targets: 2,
        ..DeviceLimits::default()
    };
    let mut fb = FramebufferSet::new(vp(4, 4), limits).unwrap();
    fb.allocate(A, TargetFormat::Rgba32Float).unwrap();
    fb.allocate(B, TargetFormat::Rgba32Float).unwrap();
    let err = fb.allocate(D, TargetFormat::Depth32Float).unwrap_err();
    assert!(matches!(err, PeelError::Allocation(_)), "{err}");
    assert_eq!(fb.len(), 2);
}

#[test]
fn duplicate_keys_are_rejected() {
    let mut fb = set_with_two();
    assert!(matches!(
        fb.allocate(A, TargetFormat::Rgba8Unorm),
        Err(PeelError::Allocation(_))
    ));
}

#[test]
fn oversized_viewport_is_an_allocation_error() {
    let limits = DeviceLimits {
        max_dimension: 8,
        ..DeviceLimits::default()
    };
    assert!(matches!(
        FramebufferSet::new(vp(9, 2), limits),
        Err(PeelError::Allocation(_))
    ));
}

#[test]
fn resize_to_same_size_keeps_identities() {
    let mut fb = set_with_two();
    let before: Vec<_> = fb.targets().map(|(_, t)| t.id()).collect();
    assert!(!fb.resize(vp(4, 3)).unwrap());
    let after: Vec<_> = fb.targets().map(|(_, t)| t.id()).collect();
    assert_eq!(before, after);
    assert_eq!(fb.allocation_count(), 2);
}

#[test]
fn resize_reallocates_every_target_at_new_size() {
    let mut fb = set_with_two();
    let before: Vec<_> = fb.targets().map(|(_, t)| t.id()).collect();
    assert!(fb.resize(vp(10, 7)).unwrap());
    for (_, t) in fb.targets() {
        assert_eq!((t.width(), t.height()), (10, 7));
        assert!(!before.contains(&t.id()));
    }
    assert_eq!(fb.allocation_count(), 4);
    assert_eq!(fb.byte_len(), 2 * 10 * 7 * 16);
}

#[test]
fn checked_out_targets_cannot_be_read() {
    let mut fb = set_with_two();
    let err = fb
        .with_pass(&[A], |fb, writes| {
            assert_eq!(writes.len(), 1);
            assert!(fb.get(B).is_ok());
            fb.get(A).map(|_| ())
        })
        .unwrap_err();
    assert!(matches!(err, PeelError::Hazard(_)), "{err}");
    // Checked back in despite the failure.
    assert!(fb.get(A).is_ok());
}

#[test]
fn binding_a_target_twice_is_a_hazard_and_leaks_nothing() {
    let mut fb = set_with_two();
    let err = fb.with_pass(&[A, A], |_, _| Ok(())).unwrap_err();
    assert!(matches!(err, PeelError::Hazard(_)));
    assert!(fb.get(A).is_ok());
    assert_eq!(fb.targets().count(), 2);
}

#[test]
fn writes_in_pass_are_visible_after_checkin() {
    let mut fb = set_with_two();
    fb.with_pass(&[B], |_, writes| {
        let i = writes.position(B).unwrap();
        writes.get_mut(i).store(0, [1.0, 2.0, 3.0, 4.0]);
        Ok(())
    })
    .unwrap();
    assert_eq!(fb.get(B).unwrap().texel(0, 0), [1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn release_drops_everything() {
    let mut fb = set_with_two();
    fb.release();
    assert!(fb.is_empty());
    assert!(matches!(fb.get(A), Err(PeelError::Lifecycle(_))));
}
