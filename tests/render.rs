use lumen::camera::{Camera, InputState};
use lumen::{Lumen, Material, Scene, Sphere};
use nalgebra::{Point3, Vector3, Vector4};

const WIDTH: u32 = 33;
const HEIGHT: u32 = 25;

fn magenta_scene() -> Scene {
    Scene {
        spheres: vec![Sphere {
            position: Vector3::new(0.0, 0.0, -3.0),
            radius: 1.0,
            material_index: 0,
        }],
        materials: vec![Material {
            albedo: Vector3::new(1.0, 0.0, 1.0),
            ..Default::default()
        }],
    }
}

fn camera_at_origin(width: u32, height: u32) -> Camera {
    let mut camera = Camera::new(45.0, 0.1, 100.0);
    camera.resize(width, height);
    camera.set_view(Point3::origin(), Vector3::new(0.0, 0.0, -1.0));
    camera
}

fn rgba(pixel: u32) -> [u8; 4] {
    pixel.to_le_bytes()
}

fn assert_close(actual: [u8; 4], expected: [u8; 4]) {
    for (a, e) in actual.iter().zip(expected) {
        assert!((*a as i32 - e as i32).abs() <= 1, "{actual:?} != {expected:?}");
    }
}

fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0) as u8
}

fn displayed(lumen: &Lumen) -> Vec<Vector4<f32>> {
    // render 이후 frame_index는 다음 프레임을 가리키므로 하나 뺌
    let frames = if lumen.settings.accumulate {
        (lumen.frame_index() - 1) as f32
    } else {
        1.0
    };
    lumen.frame().accumulation().iter().map(|c| c / frames).collect()
}

#[test]
fn magenta_sphere_against_sky() {
    let scene = magenta_scene();
    let camera = camera_at_origin(WIDTH, HEIGHT);
    let mut lumen = Lumen::new(WIDTH, HEIGHT);

    for _ in 0..3 {
        lumen.render(&scene, &camera);
    }

    let sky = lumen.settings.sky_color;
    let pixels = lumen.frame().pixels();

    // 가운데는 구에 맞고 튕겨 나간 뒤 하늘을 봄: 하늘색 * albedo
    let center = pixels[(WIDTH / 2 + (HEIGHT / 2) * WIDTH) as usize];
    assert_close(rgba(center), [to_byte(sky.x), 0, to_byte(sky.z), 255]);

    // 모서리는 구를 빗나가서 하늘색 그대로
    let sky_pixel = [to_byte(sky.x), to_byte(sky.y), to_byte(sky.z), 255];
    for corner in [0, WIDTH - 1, (HEIGHT - 1) * WIDTH, HEIGHT * WIDTH - 1] {
        assert_close(rgba(pixels[corner as usize]), sky_pixel);
    }
}

#[test]
fn accumulation_converges() {
    let scene = Scene::demo();
    let mut camera = Camera::new(45.0, 0.1, 100.0);
    camera.resize(32, 24);
    let mut lumen = Lumen::new(32, 24);

    let mut previous = None;
    let mut changes = vec![];
    for _ in 0..32 {
        lumen.render(&scene, &camera);
        let current = displayed(&lumen);

        if let Some(previous) = previous.replace(current.clone()) {
            let change: f32 = current
                .iter()
                .zip(previous.iter())
                .map(|(a, b): (&Vector4<f32>, &Vector4<f32>)| (a - b).xyz().abs().sum())
                .sum();
            changes.push(change);
        }
    }

    assert_eq!(lumen.frame_index(), 33);
    let early: f32 = changes[..4].iter().sum();
    let late: f32 = changes[changes.len() - 4..].iter().sum();
    assert!(late < early, "late change {late} should be smaller than early change {early}");
}

#[test]
fn resize_resets_accumulation() {
    let scene = Scene::demo();
    let mut camera = Camera::new(45.0, 0.1, 100.0);
    camera.resize(16, 16);
    let mut lumen = Lumen::new(16, 16);

    for _ in 0..5 {
        lumen.render(&scene, &camera);
    }
    assert_eq!(lumen.frame_index(), 6);

    assert!(!lumen.resize(16, 16));
    assert_eq!(lumen.frame_index(), 6);

    assert!(lumen.resize(20, 10));
    camera.resize(20, 10);
    assert_eq!(lumen.frame_index(), 1);
    assert!(lumen.frame().accumulation().iter().all(|c| *c == Vector4::zeros()));

    lumen.render(&scene, &camera);
    assert_eq!(lumen.frame_index(), 2);
    assert_eq!(lumen.frame().pixels().len(), 200);
}

#[test]
fn disabled_accumulation_has_no_memory() {
    let scene = Scene::demo();
    let mut camera = Camera::new(45.0, 0.1, 100.0);
    camera.resize(16, 12);
    let mut lumen = Lumen::new(16, 12);

    for _ in 0..4 {
        lumen.render(&scene, &camera);
    }

    lumen.settings.accumulate = false;
    for _ in 0..4 {
        lumen.render(&scene, &camera);
        assert_eq!(lumen.frame_index(), 1);

        // 누적 버퍼에는 이번 프레임의 샘플 하나만 있음
        for (accumulated, pixel) in lumen.frame().accumulation().iter().zip(lumen.frame().pixels()) {
            assert_eq!(accumulated.w, 1.0);
            assert_eq!(rgba(*pixel)[0], to_byte(accumulated.x));
        }
    }
}

#[test]
fn camera_movement_restarts_accumulation() {
    let scene = magenta_scene();
    let mut camera = camera_at_origin(8, 8);
    let mut lumen = Lumen::new(8, 8);

    lumen.render(&scene, &camera);
    lumen.render(&scene, &camera);
    assert_eq!(lumen.frame_index(), 3);

    let input = InputState {
        backward: true,
        ..Default::default()
    };
    if camera.update(0.1, &input) {
        lumen.reset_frame_index();
    }
    assert_eq!(lumen.frame_index(), 1);
    assert!((camera.position() - Point3::new(0.0, 0.0, 0.5)).norm() < 1e-5);
}

#[test]
fn empty_scene_and_dark_sky_render_black() {
    let camera = camera_at_origin(4, 4);
    let mut lumen = Lumen::new(4, 4);
    lumen.settings.sky = false;

    lumen.render(&Scene::default(), &camera);
    assert!(lumen.frame().pixels().iter().all(|p| rgba(*p) == [0, 0, 0, 255]));
}

#[test]
fn emissive_sphere_lights_dark_scene() {
    let mut scene = magenta_scene();
    scene.materials[0].emission_color = Vector3::new(1.0, 1.0, 1.0);
    scene.materials[0].emission_power = 0.5;

    let camera = camera_at_origin(WIDTH, HEIGHT);
    let mut lumen = Lumen::new(WIDTH, HEIGHT);
    lumen.settings.sky = false;
    lumen.render(&scene, &camera);

    let pixels = lumen.frame().pixels();
    assert_close(rgba(pixels[(WIDTH / 2 + (HEIGHT / 2) * WIDTH) as usize]), [127, 127, 127, 255]);
    assert_eq!(rgba(pixels[0]), [0, 0, 0, 255]);
}

#[test]
fn dangling_material_renders_without_panicking() {
    let mut scene = magenta_scene();
    scene.spheres[0].material_index = 9;

    let camera = camera_at_origin(WIDTH, HEIGHT);
    let mut lumen = Lumen::new(WIDTH, HEIGHT);
    lumen.render(&scene, &camera);

    let sky = lumen.settings.sky_color;
    let center = lumen.frame().pixels()[(WIDTH / 2 + (HEIGHT / 2) * WIDTH) as usize];
    assert_close(rgba(center), [to_byte(sky.x), 0, to_byte(sky.z), 255]);
}

#[test]
fn export_writes_displayed_frame() {
    let camera = camera_at_origin(WIDTH, HEIGHT);
    let mut lumen = Lumen::new(WIDTH, HEIGHT);
    lumen.render(&magenta_scene(), &camera);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    lumen.frame().save(&path).unwrap();

    let image = image::open(&path).unwrap().into_rgba8();
    assert_eq!(image.dimensions(), (WIDTH, HEIGHT));
    assert_eq!(image.get_pixel(0, 0).0, rgba(lumen.frame().pixels()[0]));
}

#[test]
fn export_before_render_fails() {
    let renderer = Lumen::default();
    let dir = tempfile::tempdir().unwrap();

    let result = renderer.frame().save(dir.path().join("empty.png"));
    assert!(matches!(result, Err(lumen::Error::EmptyFrame)));
}
