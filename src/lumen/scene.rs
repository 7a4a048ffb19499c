use nalgebra::Vector3;

/// Tailwind CSS 색상표에서 가져온 색들. `from_hex`로 선형 색상으로 바꿔서 사용함
pub mod palette {
    pub const WHITE: u32 = 0xff_ff_ff;
    pub const BLACK: u32 = 0x00_00_00;

    pub const RED_600: u32 = 0xdc_26_26;
    pub const ORANGE_600: u32 = 0xea_58_0c;
    pub const GREEN_600: u32 = 0x16_a3_4a;
    pub const TEAL_700: u32 = 0x0f_76_6e;
    pub const SKY_200: u32 = 0xba_e6_fd;
    pub const SKY_300: u32 = 0x7d_d3_fc;
    pub const SKY_400: u32 = 0x38_bd_f8;
    pub const BLUE_600: u32 = 0x25_63_eb;
    pub const BLUE_700: u32 = 0x1d_4e_d8;
    pub const BLUE_800: u32 = 0x1e_40_af;
    pub const PINK_600: u32 = 0xdb_27_77;

    pub const MAGENTA: u32 = 0xff_00_ff;
}

/// 0xRRGGBB를 [0, 1] 범위의 색상 벡터로 바꿈
pub fn from_hex(hex: u32) -> Vector3<f32> {
    let r = ((hex >> 16) & 0xff) as f32;
    let g = ((hex >> 8) & 0xff) as f32;
    let b = (hex & 0xff) as f32;

    Vector3::new(r, g, b) / 255.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub albedo: Vector3<f32>,
    pub roughness: f32,
    // 아직 셰이딩에는 안 쓰임
    pub metallic: f32,
    pub emission_color: Vector3<f32>,
    pub emission_power: f32,
}

impl Material {
    pub fn emission(&self) -> Vector3<f32> {
        self.emission_color * self.emission_power
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Vector3::new(1.0, 1.0, 1.0),
            roughness: 1.0,
            metallic: 0.0,
            emission_color: Vector3::zeros(),
            emission_power: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub position: Vector3<f32>,
    pub radius: f32,
    pub material_index: usize,
}

impl Default for Sphere {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            radius: 0.5,
            material_index: 0,
        }
    }
}

/// 렌더링 중에는 읽기만 함. 수정은 렌더링 호출 사이에서만 할 것
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub spheres: Vec<Sphere>,
    pub materials: Vec<Material>,
}

impl Scene {
    pub fn demo() -> Self {
        let pink = Material {
            albedo: from_hex(palette::PINK_600),
            roughness: 0.0,
            ..Default::default()
        };
        let ground = Material {
            albedo: from_hex(palette::BLUE_600),
            roughness: 0.1,
            ..Default::default()
        };
        let sun = Material {
            albedo: from_hex(palette::ORANGE_600),
            roughness: 0.1,
            emission_color: from_hex(palette::ORANGE_600),
            emission_power: 20.0,
            ..Default::default()
        };

        Self {
            spheres: vec![
                Sphere {
                    position: Vector3::zeros(),
                    radius: 1.0,
                    material_index: 0,
                },
                Sphere {
                    position: Vector3::new(0.0, -101.0, 0.0),
                    radius: 100.0,
                    material_index: 1,
                },
                Sphere {
                    position: Vector3::new(32.0, 3.8, -32.0),
                    radius: 20.0,
                    material_index: 2,
                },
            ],
            materials: vec![pink, ground, sun],
        }
    }

    pub fn add_sphere(&mut self, sphere: Sphere) -> usize {
        self.spheres.push(sphere);
        self.spheres.len() - 1
    }

    pub fn remove_sphere(&mut self, index: usize) -> Option<Sphere> {
        (index < self.spheres.len()).then(|| self.spheres.remove(index))
    }

    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    /// 뒤에 있던 재질을 가리키던 구들은 한 칸씩 당겨지고, 지워진 재질을 쓰던 구는 0번 재질을 씀
    pub fn remove_material(&mut self, index: usize) -> Option<Material> {
        if index >= self.materials.len() {
            return None;
        }

        let removed = self.materials.remove(index);
        for sphere in &mut self.spheres {
            if sphere.material_index == index {
                sphere.material_index = 0;
            } else if sphere.material_index > index {
                sphere.material_index -= 1;
            }
        }

        Some(removed)
    }

    /// 잘못된 재질 번호는 마지막 재질로 고정함. 재질이 하나도 없으면 기본 재질 사용
    pub fn material_for(&self, sphere: &Sphere) -> Material {
        match self.materials.len() {
            0 => Material::default(),
            len => self.materials[sphere.material_index.min(len - 1)],
        }
    }

    pub fn has_dangling_material(&self) -> bool {
        !self.materials.is_empty()
            && self
                .spheres
                .iter()
                .any(|sphere| sphere.material_index >= self.materials.len())
    }
}
