use nalgebra::{Point3, Vector3};

/// 방향 벡터는 단위 벡터가 아닐 수도 있음. 교차 계산은 이를 감안해서 함.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self { origin, direction }
    }

    pub fn at(&self, distance: f32) -> Point3<f32> {
        self.origin + self.direction * distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_scales_unnormalized_direction() {
        let ray = Ray::new(Point3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 2.0, 0.0));
        assert_eq!(ray.at(0.0), Point3::new(1.0, 0.0, 0.0));
        assert_eq!(ray.at(1.5), Point3::new(1.0, 3.0, 0.0));
    }
}
