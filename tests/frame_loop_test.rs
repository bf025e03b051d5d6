use std::f32::consts::TAU;

use cgmath::{Point3, Vector3};
use orbit_demo::{
    config::SceneConfig,
    controls::Drag,
    scene::{CUBE, CYLINDER, SceneContext, TORUS_KNOT},
};

fn bootstrap() -> SceneContext {
    SceneContext::bootstrap(&SceneConfig::default(), 800, 600)
}

#[test]
fn hundred_frames_accumulate_fixed_increments() {
    let mut ctx = bootstrap();
    for _ in 0..100 {
        ctx.advance_frame();
    }
    assert_eq!(ctx.frame_count(), 100);

    for (id, spec, expected) in [
        (ctx.primitives.cube, CUBE, 1.0),
        (ctx.primitives.torus_knot, TORUS_KNOT, 2.0),
        (ctx.primitives.cylinder, CYLINDER, 4.0),
    ] {
        let mut accumulated = 0.0f32;
        for _ in 0..100 {
            accumulated += spec.spin;
        }
        let rotation = ctx.rotation(id).unwrap();
        assert_eq!(rotation.x, accumulated, "{} x", spec.name);
        assert_eq!(rotation.y, accumulated, "{} y", spec.name);
        assert_eq!(rotation.z, 0.0);
        assert!((rotation.x - expected).abs() < 1e-3, "{} drifted", spec.name);
    }
}

#[test]
fn spinning_never_moves_the_primitives() {
    let mut ctx = bootstrap();
    for _ in 0..10 {
        ctx.advance_frame();
    }
    assert_eq!(ctx.position(ctx.primitives.cube), Some(Vector3::new(0.0, 3.0, 0.0)));
    assert_eq!(ctx.position(ctx.primitives.torus_knot), Some(Vector3::new(3.0, 0.0, 0.0)));
    assert_eq!(ctx.position(ctx.primitives.cylinder), Some(Vector3::new(-3.0, 0.0, 0.0)));
}

#[test]
fn rotation_wraps_after_a_full_turn() {
    let mut ctx = bootstrap();
    for _ in 0..200 {
        ctx.advance_frame();
    }
    let rotation = ctx.rotation(ctx.primitives.cylinder).unwrap();
    assert!((0.0..TAU).contains(&rotation.x));
    assert!((rotation.x - (8.0 - TAU)).abs() < 1e-3);
}

#[test]
fn idle_frames_keep_the_camera_still() {
    let mut ctx = bootstrap();
    for _ in 0..30 {
        assert!(!ctx.advance_frame());
    }
    assert_eq!(ctx.camera.position, Point3::new(2.0, 2.0, 2.0));
    assert_eq!(ctx.camera.target, Point3::new(0.0, 0.0, 0.0));
}

#[test]
fn damped_drag_keeps_moving_after_release() {
    let mut ctx = bootstrap();
    let start = ctx.camera.position;
    ctx.controls.begin_drag(Drag::Rotate);
    ctx.controls.pointer_moved(100.0, 100.0, &ctx.camera);
    ctx.controls.pointer_moved(160.0, 100.0, &ctx.camera);
    ctx.controls.end_drag();

    assert!(ctx.advance_frame());
    let after_one = ctx.camera.position;
    assert_ne!(after_one, start);
    assert!(ctx.advance_frame());
    assert_ne!(ctx.camera.position, after_one);

    for _ in 0..1000 {
        ctx.advance_frame();
    }
    let distance = ctx.camera.distance();
    assert!((distance - 12.0f32.sqrt()).abs() < 1e-3);
}

#[test]
fn resize_updates_aspect_and_projection() {
    let mut ctx = bootstrap();
    ctx.resize(1024, 768).unwrap();
    assert!((ctx.camera.projection.aspect - 1024.0 / 768.0).abs() < 1e-6);
    assert_eq!(ctx.viewport().width(), 1024);
    assert_eq!(ctx.viewport().height(), 768);

    let before = ctx.camera.projection.matrix();
    ctx.resize(1280, 720).unwrap();
    assert!((ctx.camera.projection.aspect - 1280.0 / 720.0).abs() < 1e-6);
    assert_ne!(ctx.camera.projection.matrix(), before);

    ctx.resize(600, 800).unwrap();
    assert!((ctx.camera.projection.aspect - 0.75).abs() < 1e-6);
}

#[test]
fn zero_sized_resize_is_rejected() {
    let mut ctx = bootstrap();
    ctx.resize(1024, 768).unwrap();
    assert!(ctx.resize(0, 768).is_err());
    assert!(ctx.resize(1024, 0).is_err());
    assert_eq!(ctx.viewport().width(), 1024);
    assert!((ctx.camera.projection.aspect - 1024.0 / 768.0).abs() < 1e-6);
    assert!(ctx.camera.projection.matrix().x.x.is_finite());
}
