use nalgebra::{Isometry3, Matrix4, Perspective3, Point3, Unit, UnitQuaternion, Vector2, Vector3, Vector4};
use rayon::prelude::*;

/// 호스트가 매 프레임 채워서 넘겨주는 입력 상태.
/// `mouse_delta`는 `look`이 눌려 있는 동안에만 쌓아야 함. 안 그러면 다시 누를 때 화면이 튐
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputState {
    pub look: bool,
    pub mouse_delta: Vector2<f32>,

    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

pub struct Camera {
    projection: Matrix4<f32>,
    view: Matrix4<f32>,
    inverse_projection: Matrix4<f32>,
    inverse_view: Matrix4<f32>,

    // 도 단위
    vertical_fov: f32,
    near: f32,
    far: f32,

    position: Point3<f32>,
    forward: Unit<Vector3<f32>>,

    rays: Vec<Vector3<f32>>,

    viewport_width: u32,
    viewport_height: u32,
}

impl Camera {
    const MOUSE_SCALE: f32 = 0.002;
    // 시선과 위쪽 축의 내적이 이보다 크면 look_at이 망가짐
    const POLE_LIMIT: f32 = 0.99;

    pub fn new(vertical_fov: f32, near: f32, far: f32) -> Self {
        let mut to_return = Self {
            projection: Matrix4::identity(),
            view: Matrix4::identity(),
            inverse_projection: Matrix4::identity(),
            inverse_view: Matrix4::identity(),
            vertical_fov,
            near,
            far,
            position: Point3::new(0.0, 0.0, 6.0),
            forward: Unit::new_unchecked(Vector3::new(0.0, 0.0, -1.0)),
            rays: vec![],
            viewport_width: 0,
            viewport_height: 0,
        };

        to_return.reevaluate_view();
        to_return
    }

    /// 마우스는 `look`이 눌려 있을 때만 회전에 쓰이고, 이동 키는 항상 적용됨.
    /// 조금이라도 움직였으면 true. 이 때는 누적 버퍼도 초기화해야 함
    pub fn update(&mut self, time_step: f32, input: &InputState) -> bool {
        let up: Unit<Vector3<f32>> = Vector3::y_axis();
        let right = self.forward.cross(&up).normalize();
        let mut moved = false;

        if input.look && input.mouse_delta != Vector2::zeros() {
            let delta = input.mouse_delta * Self::MOUSE_SCALE;

            let pitch_delta = delta.y * self.rotation_speed();
            let yaw_delta = delta.x * self.rotation_speed();

            let yaw = UnitQuaternion::from_axis_angle(&up, -yaw_delta);
            let pitch = UnitQuaternion::from_axis_angle(&Unit::new_unchecked(right), -pitch_delta);

            let mut rotated = (pitch * yaw) * self.forward;
            // 위나 아래를 똑바로 보면 look_at이 망가지니 그 때는 좌우 회전만 함
            if rotated.dot(up.as_ref()).abs() > Self::POLE_LIMIT {
                rotated = yaw * self.forward;
            }
            rotated.renormalize_fast();

            if rotated != self.forward {
                self.forward = rotated;
                moved = true;
            }
        }

        let mut direction = Vector3::zeros();
        if input.forward {
            direction += self.forward.into_inner();
        }
        if input.backward {
            direction -= self.forward.into_inner();
        }
        if input.right {
            direction += right;
        }
        if input.left {
            direction -= right;
        }
        if input.up {
            direction += up.into_inner();
        }
        if input.down {
            direction -= up.into_inner();
        }

        let step = direction * self.movement_speed() * time_step;
        if step != Vector3::zeros() {
            self.position += step;
            moved = true;
        }

        if moved {
            self.reevaluate_view();
            self.reevaluate_rays();
        }

        moved
    }

    /// 크기가 같으면 아무것도 안 함. 0이 들어오면 광선 캐시를 비움
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        let unchanged = self.viewport_width == width && self.viewport_height == height;
        if unchanged && width != 0 && height != 0 {
            return false;
        }

        self.viewport_width = width;
        self.viewport_height = height;

        if width == 0 || height == 0 {
            self.rays.clear();
            return !unchanged;
        }

        self.reevaluate_projection();
        self.reevaluate_rays();
        true
    }

    pub fn set_view(&mut self, position: Point3<f32>, forward: Vector3<f32>) {
        self.position = position;
        // 길이가 0이거나 위아래를 똑바로 보는 방향이면 이전 시선을 유지함
        match Unit::try_new(forward, 1e-6) {
            Some(forward) if forward.y.abs() <= Self::POLE_LIMIT => self.forward = forward,
            _ => log::debug!("ignoring camera forward {:?}", forward),
        }

        self.reevaluate_view();
        self.reevaluate_rays();
    }

    pub fn set_vertical_fov(&mut self, degrees: f32) -> bool {
        if !(degrees > 0.0 && degrees < 180.0) || degrees == self.vertical_fov {
            return false;
        }

        self.vertical_fov = degrees;
        self.reevaluate_projection_and_rays();
        true
    }

    pub fn set_clip_planes(&mut self, near: f32, far: f32) -> bool {
        if !(near > 0.0 && far > near) || (near == self.near && far == self.far) {
            return false;
        }

        self.near = near;
        self.far = far;
        self.reevaluate_projection_and_rays();
        true
    }

    pub fn rotation_speed(&self) -> f32 {
        0.3
    }

    pub fn movement_speed(&self) -> f32 {
        5.0
    }

    pub fn position(&self) -> Point3<f32> {
        self.position
    }

    pub fn direction(&self) -> Vector3<f32> {
        self.forward.into_inner()
    }

    /// 픽셀마다 하나씩, `x + y * width` 위치에 저장된 월드 좌표계 광선 방향
    pub fn ray_directions(&self) -> &[Vector3<f32>] {
        &self.rays
    }

    pub fn viewport_size(&self) -> (u32, u32) {
        (self.viewport_width, self.viewport_height)
    }

    pub fn vertical_fov(&self) -> f32 {
        self.vertical_fov
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn projection(&self) -> &Matrix4<f32> {
        &self.projection
    }

    pub fn view(&self) -> &Matrix4<f32> {
        &self.view
    }

    pub fn inverse_projection(&self) -> &Matrix4<f32> {
        &self.inverse_projection
    }

    pub fn inverse_view(&self) -> &Matrix4<f32> {
        &self.inverse_view
    }

    fn has_viewport(&self) -> bool {
        self.viewport_width != 0 && self.viewport_height != 0
    }

    fn reevaluate_projection_and_rays(&mut self) {
        if self.has_viewport() {
            self.reevaluate_projection();
            self.reevaluate_rays();
        }
    }

    fn reevaluate_projection(&mut self) {
        let aspect = self.viewport_width as f32 / self.viewport_height as f32;

        let perspective = Perspective3::new(aspect, self.vertical_fov.to_radians(), self.near, self.far);
        self.projection = perspective.to_homogeneous();
        self.inverse_projection = perspective.inverse();
    }

    fn reevaluate_view(&mut self) {
        let target = self.position + self.forward.into_inner();
        let view = Isometry3::look_at_rh(&self.position, &target, &Vector3::y_axis());

        self.view = view.to_homogeneous();
        self.inverse_view = view.inverse().to_homogeneous();
    }

    fn reevaluate_rays(&mut self) {
        if !self.has_viewport() {
            self.rays.clear();
            return;
        }

        let width = self.viewport_width as usize;
        let height = self.viewport_height as usize;
        let inverse_projection = self.inverse_projection;
        let inverse_view = self.inverse_view;

        log::debug!("rebuilding {}x{} ray directions", width, height);

        self.rays.clear();
        self.rays.resize(width * height, Vector3::zeros());
        self.rays
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, ray_direction) in row.iter_mut().enumerate() {
                    *ray_direction = pixel_ray_direction(&inverse_projection, &inverse_view, x, y, width, height);
                }
            });
    }
}

/// 픽셀 중심을 NDC로 옮기고 (y는 뒤집음, 0번 행이 위) 역투영한 뒤 월드 좌표계로 회전시킴
pub fn pixel_ray_direction(
    inverse_projection: &Matrix4<f32>,
    inverse_view: &Matrix4<f32>,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
) -> Vector3<f32> {
    let coord = Vector2::new(
        (x as f32 + 0.5) / width as f32 * 2.0 - 1.0,
        1.0 - (y as f32 + 0.5) / height as f32 * 2.0,
    );

    let target = inverse_projection * Vector4::new(coord.x, coord.y, 1.0, 1.0);
    let local = (target.xyz() / target.w).normalize();

    inverse_view.fixed_view::<3, 3>(0, 0) * local
}
