use nalgebra::{Vector3, Vector4};
use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand::Rng;
use std::ops::RangeBounds;

cfg_if::cfg_if! {
    // wasm32에선 std::time::Instant가 패닉을 일으킴
    if #[cfg(target_arch = "wasm32")] {
        pub use web_time::Instant;
    } else {
        pub use std::time::Instant;
    }
}

pub fn random_vec<T, R, G>(rng: &mut G, range: R) -> Vector3<T>
where
    T: SampleUniform + nalgebra::Scalar,
    R: RangeBounds<T> + SampleRange<T> + Clone,
    G: Rng,
{
    Vector3::new(
        rng.gen_range(range.clone()),
        rng.gen_range(range.clone()),
        rng.gen_range(range),
    )
}

/// 구 표면 위에 균일하게 분포한 단위 벡터. 정육면체에서 뽑고 구 밖이면 다시 뽑음
pub fn random_unit_vector<G: Rng>(rng: &mut G) -> Vector3<f32> {
    loop {
        let candidate = random_vec(rng, -1.0f32..1.0);
        let length_squared = candidate.norm_squared();
        if length_squared > 1e-6 && length_squared <= 1.0 {
            return candidate / length_squared.sqrt();
        }
    }
}

/// 픽셀마다 다른 시드를 만들기 위한 splitmix64 섞기
pub fn pixel_seed(seed: u64, pixel: usize, frame: u64) -> u64 {
    let mut z = seed
        ^ (pixel as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
        ^ frame.wrapping_mul(0xd1b5_4a32_d192_ed03);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// 메모리 상에서 R, G, B, A 순서가 되도록 묶음 (리틀 엔디언 기준)
pub fn vec4_to_rgba(color: &Vector4<f32>) -> u32 {
    let channel = |value: f32| {
        if value.is_nan() {
            0
        } else {
            (value.clamp(0.0, 1.0) * 255.0) as u32
        }
    };

    channel(color.x) | channel(color.y) << 8 | channel(color.z) << 16 | channel(color.w) << 24
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn unit_vectors_are_unit_length() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let v = random_unit_vector(&mut rng);
            assert!((v.norm() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn random_vec_respects_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let v = random_vec(&mut rng, -0.5f32..0.5);
            assert!(v.iter().all(|c| (-0.5..0.5).contains(c)));
        }
    }

    #[test]
    fn pixel_seed_differs_per_pixel_and_frame() {
        assert_ne!(pixel_seed(0, 0, 1), pixel_seed(0, 1, 1));
        assert_ne!(pixel_seed(0, 0, 1), pixel_seed(0, 0, 2));
        assert_ne!(pixel_seed(0, 0, 1), pixel_seed(1, 0, 1));
        assert_eq!(pixel_seed(5, 9, 3), pixel_seed(5, 9, 3));
    }

    #[test]
    fn rgba_packing_clamps_and_orders_channels() {
        let packed = vec4_to_rgba(&Vector4::new(1.0, 0.0, 2.0, 1.0));
        assert_eq!(packed.to_le_bytes(), [255, 0, 255, 255]);

        let packed = vec4_to_rgba(&Vector4::new(-1.0, f32::NAN, 0.5, 1.0));
        assert_eq!(packed.to_le_bytes(), [0, 0, 127, 255]);
    }
}
