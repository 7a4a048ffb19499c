use std::iter;

use eframe::egui::{self, ClippedPrimitive, ColorImage, TextEdit, TextureHandle, TextureId, TextureOptions};
use log::{debug, info, warn};
use nalgebra::{Vector2, Vector3};
use wgpu::{
    Backends, Color, CommandBuffer, CommandEncoder, CommandEncoderDescriptor, CompositeAlphaMode, Device,
    DeviceDescriptor, Dx12Compiler, Features, Instance, InstanceDescriptor, Limits, LoadOp, Operations,
    PowerPreference, PresentMode, Queue, RenderPassColorAttachment, RenderPassDescriptor, RequestAdapterOptions,
    Surface, SurfaceConfiguration, SurfaceError, TextureUsages, TextureViewDescriptor,
};
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyboardInput, MouseButton, VirtualKeyCode, WindowEvent};
use winit::event_loop::EventLoop;
use winit::window::{CursorGrabMode, Window};

use crate::camera::{Camera, InputState};
use crate::error::{Error, Result};
use crate::lumen::{Lumen, Material, Scene, Sphere};
use crate::util::Instant;

pub struct Application {
    surface: Surface,
    device: Device,
    queue: Queue,
    config: SurfaceConfiguration,
    pub size: PhysicalSize<u32>,
    // 무조건 winit의 Window를 쓸 것!
    pub window: Window,
    egui_state: egui_winit::State,
    egui_context: egui::Context,
    egui_renderer: egui_wgpu::Renderer,
    egui_screen: egui_wgpu::renderer::ScreenDescriptor,

    lumen: Lumen,
    camera: Camera,
    scene: Scene,
    input: InputState,
    last_update: Instant,

    // 렌더링 결과를 보여줄 egui 텍스쳐와, UI가 요청한 뷰포트 크기 (물리 픽셀)
    viewport: Option<TextureHandle>,
    viewport_size: PhysicalSize<u32>,

    export_path: String,
    export_status: Option<String>,
}

impl Application {
    pub async fn new(window: Window, event_loop: &EventLoop<()>) -> Result<Self> {
        let size = window.inner_size();

        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::all(),
            dx12_shader_compiler: Dx12Compiler::default(),
        });

        // 전달하는 &window가 생성하는 surface보다 오래 유지되어야 함.
        // 둘 다 Application이 소유하니 괜찮음
        let surface = unsafe { instance.create_surface(&window) }?;

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: PowerPreference::default(),
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await
            .ok_or(Error::NoAdapter)?;

        let adapter_info = adapter.get_info();
        info!("using {} ({:?})", adapter_info.name, adapter_info.backend);

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    features: Features::empty(),
                    limits: if cfg!(target_arch = "wasm32") {
                        // 브라우저가 아직 webgpu를 제대로 지원 안하니 webgl2 기준 채택
                        Limits::downlevel_webgl2_defaults()
                    } else {
                        Limits::default()
                    },
                    label: Some("Lumen GPU"),
                },
                None,
            )
            .await?;

        let capabilities = surface.get_capabilities(&adapter);

        // 렌더러는 선형 색상을 그대로 8비트로 넘기므로 sRGB 표면을 씀
        let surface_format = capabilities
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .unwrap_or(capabilities.formats[0]);
        let config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode: CompositeAlphaMode::Auto,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let egui_state = egui_winit::State::new(event_loop);
        let egui_context = egui::Context::default();

        let egui_renderer = egui_wgpu::Renderer::new(
            &device,
            surface_format,
            None, // 깊이 안씀
            1,    // 멀티 샘플링 1번만 할꺼임
        );
        let egui_screen = egui_wgpu::renderer::ScreenDescriptor {
            size_in_pixels: [config.width, config.height],
            pixels_per_point: window.scale_factor() as f32,
        };

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            window,
            egui_state,
            egui_context,
            egui_renderer,
            egui_screen,
            lumen: Lumen::default(),
            camera: Camera::new(45.0, 0.1, 100.0),
            scene: Scene::demo(),
            input: InputState::default(),
            last_update: Instant::now(),
            viewport: None,
            viewport_size: PhysicalSize::new(0, 0),
            export_path: String::from("lumen.png"),
            export_status: None,
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);

        self.egui_screen.size_in_pixels = [self.config.width, self.config.height];
    }

    // true: 앱에서 입력 처리를 했으니 따로 관리할 필요 없음
    // false: 아래 event loop에서 처리 해야 함.
    pub fn input(&mut self, event: &WindowEvent) -> bool {
        let egui_response = self.egui_state.on_event(&self.egui_context, event);
        if egui_response.consumed {
            return true;
        }

        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Right,
                ..
            } => {
                self.set_looking(matches!(state, ElementState::Pressed));
                true
            }
            WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        state,
                        virtual_keycode: Some(key),
                        ..
                    },
                ..
            } => {
                let is_press = matches!(state, ElementState::Pressed);
                match key {
                    VirtualKeyCode::W => self.input.forward = is_press,
                    VirtualKeyCode::A => self.input.left = is_press,
                    VirtualKeyCode::S => self.input.backward = is_press,
                    VirtualKeyCode::D => self.input.right = is_press,
                    VirtualKeyCode::Space => self.input.up = is_press,
                    VirtualKeyCode::LShift => self.input.down = is_press,
                    _ => {
                        return false;
                    }
                };

                true
            }
            _ => false,
        }
    }

    pub fn device_input(&mut self, event: &DeviceEvent) {
        // 시점 조작 중일 때만 마우스 이동량을 쌓음
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.input.look {
                self.input.mouse_delta += Vector2::new(delta.0 as f32, delta.1 as f32);
            }
        }
    }

    fn set_looking(&mut self, looking: bool) {
        if self.input.look == looking {
            return;
        }

        self.input.look = looking;
        self.input.mouse_delta = Vector2::zeros();
        self.window.set_cursor_visible(!looking);

        let grab = if looking {
            self.window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined))
        } else {
            self.window.set_cursor_grab(CursorGrabMode::None)
        };
        if let Err(error) = grab {
            debug!("cursor grab unavailable: {}", error);
        }
    }

    /// 카메라를 움직이고 한 프레임을 렌더링한 뒤, 결과를 UI 텍스쳐로 올림
    pub fn update(&mut self) {
        let now = Instant::now();
        let time_step = now.duration_since(self.last_update).as_secs_f32();
        self.last_update = now;

        if self.camera.update(time_step, &self.input) {
            self.lumen.reset_frame_index();
        }
        self.input.mouse_delta = Vector2::zeros();

        self.lumen.render(&self.scene, &self.camera);

        let frame = self.lumen.frame();
        if frame.is_empty() {
            return;
        }

        let image = ColorImage::from_rgba_unmultiplied(
            [frame.width() as usize, frame.height() as usize],
            frame.as_bytes(),
        );
        match &mut self.viewport {
            Some(texture) => texture.set(image, TextureOptions::NEAREST),
            None => {
                self.viewport = Some(self.egui_context.load_texture("Lumen Output", image, TextureOptions::NEAREST));
            }
        }
    }

    pub fn render(&mut self) -> std::result::Result<(), SurfaceError> {
        let output = self.surface.get_current_texture()?;

        let view = output.texture.create_view(&TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Encoder"),
        });

        let (primitives, egui_commands, freed) = self.update_egui(&mut encoder);

        // render_pass가 encoder를 빌려오기 때문에 아래처럼 따로 빼지 않으면 앞으로 계속 쓸 수 없음
        {
            let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color::BLACK),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });

            self.egui_renderer.render(&mut render_pass, &primitives, &self.egui_screen);
        }

        self.queue.submit(egui_commands.into_iter().chain(iter::once(encoder.finish())));
        output.present();

        for id in &freed {
            self.egui_renderer.free_texture(id);
        }

        // UI가 정한 뷰포트 크기를 다음 프레임부터 반영
        let PhysicalSize { width, height } = self.viewport_size;
        let camera_resized = self.camera.resize(width, height);
        let frame_resized = self.lumen.resize(width, height);
        if camera_resized || frame_resized {
            debug!("viewport resized to {}x{}", width, height);
        }

        Ok(())
    }

    fn update_egui(&mut self, encoder: &mut CommandEncoder) -> (Vec<ClippedPrimitive>, Vec<CommandBuffer>, Vec<TextureId>) {
        let egui_input = self.egui_state.take_egui_input(&self.window);
        let context = self.egui_context.clone();
        let egui_output = context.run(egui_input, |ctx| self.draw_ui(ctx));

        self.egui_state
            .handle_platform_output(&self.window, &self.egui_context, egui_output.platform_output);
        let primitives = self.egui_context.tessellate(egui_output.shapes);
        egui_output.textures_delta.set.iter().for_each(|(id, delta)| {
            self.egui_renderer.update_texture(&self.device, &self.queue, *id, delta);
        });

        self.egui_screen.pixels_per_point = self.egui_context.pixels_per_point();
        let commands = self
            .egui_renderer
            .update_buffers(&self.device, &self.queue, encoder, &primitives, &self.egui_screen);

        (primitives, commands, egui_output.textures_delta.free)
    }

    fn draw_ui(&mut self, ctx: &egui::Context) {
        let mut reset = false;

        egui::SidePanel::right("Settings")
            .resizable(true)
            .width_range(200.0..=512.0)
            .default_width(280.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    reset |= self.settings_ui(ui);
                    ui.separator();
                    reset |= self.camera_ui(ui);
                    ui.separator();
                    reset |= self.scene_ui(ui);
                    ui.separator();
                    self.export_ui(ui);
                });
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let pixels_per_point = ctx.pixels_per_point();
                let available = ui.available_size() * pixels_per_point;
                self.viewport_size = PhysicalSize::new(available.x as u32, available.y as u32);

                if let Some(texture) = &self.viewport {
                    ui.image(texture.id(), texture.size_vec2() / pixels_per_point);
                }
            });

        if reset {
            self.lumen.reset_frame_index();
        }
    }

    fn settings_ui(&mut self, ui: &mut egui::Ui) -> bool {
        let mut changed = false;

        ui.label(format!("Last render: {:.3}ms", self.lumen.last_render_time().as_secs_f64() * 1000.0));
        ui.label(format!("Accumulated frames: {}", self.lumen.frame_index()));

        changed |= ui.checkbox(&mut self.lumen.settings.accumulate, "Accumulate").changed();
        changed |= ui.checkbox(&mut self.lumen.settings.sky, "Sky").changed();
        ui.horizontal(|ui| {
            ui.label("Sky color");
            changed |= color_edit(ui, &mut self.lumen.settings.sky_color);
        });

        if ui.button("Reset").clicked() {
            changed = true;
        }

        changed
    }

    fn camera_ui(&mut self, ui: &mut egui::Ui) -> bool {
        let position = self.camera.position();
        let direction = self.camera.direction();

        ui.heading("Camera");
        ui.label(format!("Position: {:.2}, {:.2}, {:.2}", position.x, position.y, position.z));
        ui.label(format!("Direction: {:.2}, {:.2}, {:.2}", direction.x, direction.y, direction.z));

        let mut fov = self.camera.vertical_fov();
        let response = ui.add(egui::Slider::new(&mut fov, 10.0..=120.0).text("FOV"));

        response.changed() && self.camera.set_vertical_fov(fov)
    }

    fn scene_ui(&mut self, ui: &mut egui::Ui) -> bool {
        let mut changed = false;
        let material_count = self.scene.materials.len();

        ui.heading("Spheres");
        let mut removed_sphere = None;
        for (index, sphere) in self.scene.spheres.iter_mut().enumerate() {
            ui.push_id(("sphere", index), |ui| {
                ui.label(format!("Sphere {}", index));
                changed |= vector_edit(ui, "Position", &mut sphere.position, 0.1);
                changed |= ui
                    .add(
                        egui::DragValue::new(&mut sphere.radius)
                            .speed(0.1)
                            .clamp_range(0.0..=f32::MAX)
                            .prefix("Radius "),
                    )
                    .changed();
                changed |= ui
                    .add(
                        egui::DragValue::new(&mut sphere.material_index)
                            .speed(0.05)
                            .clamp_range(0..=material_count.saturating_sub(1))
                            .prefix("Material "),
                    )
                    .changed();

                if ui.button("Remove").clicked() {
                    removed_sphere = Some(index);
                }
                ui.separator();
            });
        }
        if let Some(index) = removed_sphere {
            changed |= self.scene.remove_sphere(index).is_some();
        }
        if ui.button("Add sphere").clicked() {
            self.scene.add_sphere(Sphere::default());
            changed = true;
        }

        ui.separator();
        ui.heading("Materials");
        let mut removed_material = None;
        let removable = material_count > 1;
        for (index, material) in self.scene.materials.iter_mut().enumerate() {
            ui.push_id(("material", index), |ui| {
                ui.label(format!("Material {}", index));
                ui.horizontal(|ui| {
                    ui.label("Albedo");
                    changed |= color_edit(ui, &mut material.albedo);
                });
                changed |= ui
                    .add(egui::Slider::new(&mut material.roughness, 0.0..=1.0).text("Roughness"))
                    .changed();
                changed |= ui
                    .add(egui::Slider::new(&mut material.metallic, 0.0..=1.0).text("Metallic"))
                    .changed();
                ui.horizontal(|ui| {
                    ui.label("Emission");
                    changed |= color_edit(ui, &mut material.emission_color);
                });
                changed |= ui
                    .add(
                        egui::DragValue::new(&mut material.emission_power)
                            .speed(0.05)
                            .clamp_range(0.0..=f32::MAX)
                            .prefix("Power "),
                    )
                    .changed();

                if ui.add_enabled(removable, egui::Button::new("Remove")).clicked() {
                    removed_material = Some(index);
                }
                ui.separator();
            });
        }
        if let Some(index) = removed_material {
            changed |= self.scene.remove_material(index).is_some();
        }
        if ui.button("Add material").clicked() {
            self.scene.add_material(Material::default());
        }

        changed
    }

    fn export_ui(&mut self, ui: &mut egui::Ui) {
        ui.heading("Export");
        TextEdit::singleline(&mut self.export_path)
            .clip_text(false)
            .desired_width(f32::INFINITY)
            .show(ui);

        if ui.button("Save").clicked() {
            self.export_status = Some(match self.lumen.frame().save(&self.export_path) {
                Ok(()) => format!("Saved {}", self.export_path),
                Err(error) => {
                    warn!("export to {} failed: {}", self.export_path, error);
                    error.to_string()
                }
            });
        }
        if let Some(status) = &self.export_status {
            ui.label(status.as_str());
        }
    }
}

fn color_edit(ui: &mut egui::Ui, color: &mut Vector3<f32>) -> bool {
    let mut rgb: [f32; 3] = (*color).into();
    let changed = ui.color_edit_button_rgb(&mut rgb).changed();
    *color = Vector3::from(rgb);

    changed
}

fn vector_edit(ui: &mut egui::Ui, label: &str, value: &mut Vector3<f32>, speed: f64) -> bool {
    ui.horizontal(|ui| {
        ui.label(label);
        let mut changed = false;
        for component in value.iter_mut() {
            changed |= ui.add(egui::DragValue::new(component).speed(speed)).changed();
        }
        changed
    })
    .inner
}
