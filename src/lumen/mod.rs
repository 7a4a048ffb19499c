use std::time::Duration;

use log::{trace, warn};
use nalgebra::{Point3, Unit, Vector3, Vector4};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::camera::Camera;
use crate::util::{pixel_seed, random_unit_vector, vec4_to_rgba, Instant};

pub use frame::FrameBuffer;
pub use ray::Ray;
pub use scene::{Material, Scene, Sphere};

mod frame;
mod ray;
pub mod scene;

#[derive(Debug, Clone)]
pub struct Settings {
    pub accumulate: bool,
    // 끄면 하늘이 검은색이 되어 발광체만 빛을 냄
    pub sky: bool,
    pub sky_color: Vector3<f32>,
    pub seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            accumulate: true,
            sky: true,
            sky_color: Vector3::new(0.6, 0.7, 0.9),
            seed: 0,
        }
    }
}

impl Settings {
    pub fn miss_color(&self) -> Vector3<f32> {
        if self.sky {
            self.sky_color
        } else {
            Vector3::zeros()
        }
    }
}

pub struct Lumen {
    frame: FrameBuffer,
    // 누적된 프레임 수. 언제나 1부터 시작
    frame_index: u32,
    // 누적 여부와 상관없이 계속 증가. 픽셀 난수 시드에 쓰임
    render_count: u64,
    last_render_time: Duration,
    pub settings: Settings,
}

impl Default for Lumen {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl Lumen {
    pub const BOUNCE_LIMIT: usize = 8;
    const SURFACE_OFFSET: f32 = 1e-4;

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            frame: FrameBuffer::new(width, height),
            frame_index: 1,
            render_count: 0,
            last_render_time: Duration::ZERO,
            settings: Default::default(),
        }
    }

    /// 픽셀 격자가 바뀌면 이전 샘플은 전부 의미가 없으니 누적도 처음부터 다시 함
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if !self.frame.resize(width, height) {
            return false;
        }

        self.frame_index = 1;
        true
    }

    pub fn reset_frame_index(&mut self) {
        self.frame_index = 1;
    }

    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn last_render_time(&self) -> Duration {
        self.last_render_time
    }

    /// 카메라 광선 캐시와 프레임 버퍼 크기가 같아야 함 (호출 전에 둘 다 resize 할 것)
    pub fn render(&mut self, scene: &Scene, camera: &Camera) {
        let started = Instant::now();
        let width = self.frame.width() as usize;
        let rays = camera.ray_directions();

        if self.frame.is_empty() {
            return;
        }
        let frame_size = (self.frame.width(), self.frame.height());
        if camera.viewport_size() != frame_size || rays.len() != self.frame.pixels().len() {
            warn!(
                "camera viewport {:?} does not match frame {:?}, skipping render",
                camera.viewport_size(),
                frame_size
            );
            return;
        }
        if scene.has_dangling_material() {
            warn!("scene references missing materials, clamping to the last one");
        }

        // 누적을 끄면 이전 프레임은 전혀 남지 않아야 함
        if !self.settings.accumulate {
            self.frame_index = 1;
        }
        if self.frame_index == 1 {
            self.frame.clear_accumulation();
        }

        let frame_index = self.frame_index as f32;
        let render_count = self.render_count;
        let settings = &self.settings;
        let origin = camera.position();
        let (accumulation, pixels) = self.frame.buffers_mut();

        accumulation
            .par_chunks_mut(width)
            .zip(pixels.par_chunks_mut(width))
            .enumerate()
            .for_each(|(y, (accumulation_row, pixel_row))| {
                for x in 0..width {
                    let index = x + y * width;
                    let ray = Ray::new(origin, rays[index]);
                    let mut rng = StdRng::seed_from_u64(pixel_seed(settings.seed, index, render_count));

                    accumulation_row[x] += Self::per_pixel(scene, settings, ray, &mut rng);

                    let accumulated = accumulation_row[x] / frame_index;
                    pixel_row[x] = vec4_to_rgba(&accumulated.map(|c| c.clamp(0.0, 1.0)));
                }
            });

        let rendered_index = self.frame_index;
        if self.settings.accumulate {
            self.frame_index += 1;
        }
        self.render_count += 1;
        self.last_render_time = started.elapsed();

        trace!("frame {} rendered in {:?}", rendered_index, self.last_render_time);
    }

    // DirectX의 RayGen 쉐이더와 같음
    pub fn per_pixel(scene: &Scene, settings: &Settings, mut ray: Ray, rng: &mut StdRng) -> Vector4<f32> {
        let mut radiance = Vector3::zeros();
        let mut throughput = Vector3::new(1.0, 1.0, 1.0);

        for _ in 0..Self::BOUNCE_LIMIT {
            let Some(HitPayload { position, normal, object_index, .. }) = Self::trace_ray(&ray, scene) else {
                radiance += settings.miss_color().component_mul(&throughput);
                break;
            };

            let material = scene.material_for(&scene.spheres[object_index]);

            // 발광은 이번 표면의 albedo를 곱하기 전에 더함
            radiance += material.emission().component_mul(&throughput);
            throughput.component_mul_assign(&material.albedo);

            // position 자체가 구에 접하기 때문에 그대로 다음 광선의 시작점으로 쓰면 자기 자신과 부딪힘
            ray.origin = position + normal.as_ref() * Self::SURFACE_OFFSET;
            ray.direction = scatter(&normal, rng);
        }

        // NaN이나 무한대가 누적 버퍼에 들어가면 그 픽셀은 다시는 복구가 안 됨
        if radiance.iter().all(|c| c.is_finite()) {
            Vector4::new(radiance.x, radiance.y, radiance.z, 1.0)
        } else {
            Vector4::new(0.0, 0.0, 0.0, 1.0)
        }
    }

    pub fn trace_ray(ray: &Ray, scene: &Scene) -> Option<HitPayload> {
        let first = ray.direction.magnitude_squared();
        // 방향이 0인 광선은 아무것과도 안 만남
        if first <= 0.0 || !first.is_finite() {
            return None;
        }

        let mut closest: Option<(usize, f32)> = None;
        for (index, sphere) in scene.spheres.iter().enumerate() {
            if sphere.radius <= 0.0 || sphere.radius.is_nan() {
                continue;
            }

            // 구가 원점에 있다고 가정하고 계산함. 대신 광선 시작점을 그만큼 옮김
            let origin = ray.origin - sphere.position;

            let second = 2.0 * origin.coords.dot(&ray.direction);
            let third = origin.coords.magnitude_squared() - sphere.radius.powi(2);

            // 판별식
            let discriminant = second.powi(2) - 4.0 * first * third;
            if discriminant < 0.0 {
                continue;
            }

            // 가까운 근만 씀. 구 안에서 쏜 광선은 음수가 나와서 버려짐
            let distance = (-second - discriminant.sqrt()) / (2.0 * first);
            if distance <= 0.0 || distance.is_nan() {
                continue;
            }

            if closest.map_or(true, |(_, previous)| distance < previous) {
                closest = Some((index, distance));
            }
        }

        closest.map(|(index, distance)| Self::closest_hit(ray, distance, index, &scene.spheres[index]))
    }

    fn closest_hit(ray: &Ray, distance: f32, object_index: usize, sphere: &Sphere) -> HitPayload {
        let position = ray.at(distance);

        HitPayload {
            distance,
            position,
            normal: Unit::new_normalize(position - Point3::from(sphere.position)),
            object_index,
        }
    }
}

/// 완전 난반사. 법선에 단위 구 위의 무작위 벡터를 더해서 정규화함
fn scatter(normal: &Unit<Vector3<f32>>, rng: &mut StdRng) -> Vector3<f32> {
    let direction = normal.as_ref() + random_unit_vector(rng);

    // 무작위 벡터가 법선과 정반대면 길이가 0이 됨
    Unit::try_new(direction, 1e-6)
        .map(Unit::into_inner)
        .unwrap_or_else(|| normal.into_inner())
}

// 충돌 정보만 담음. 재질과 색상은 per_pixel에서 따로 찾음
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitPayload {
    pub distance: f32,
    pub position: Point3<f32>,
    pub normal: Unit<Vector3<f32>>,
    pub object_index: usize,
}
