//! 구와 단순한 재질로 이루어진 장면을 CPU에서 경로 추적하는 실시간 렌더러.
//!
//! 렌더러 코어([`Lumen`], [`camera::Camera`], [`Scene`])는 창이나 UI 없이도 쓸 수 있고,
//! `viewer` 기능을 켜면 winit + wgpu + egui로 만든 뷰어가 같이 빌드됨.

pub mod camera;
pub mod error;
pub mod lumen;
pub mod util;

#[cfg(feature = "viewer")]
mod app;

pub use error::{Error, Result};
pub use lumen::scene::{from_hex, palette};
pub use lumen::{FrameBuffer, HitPayload, Lumen, Material, Ray, Scene, Settings, Sphere};

#[cfg(feature = "viewer")]
pub use viewer::run;

#[cfg(feature = "viewer")]
mod viewer {
    use cfg_if::cfg_if;
    use log::{error, warn};
    use wgpu::SurfaceError;
    use winit::dpi::LogicalSize;
    use winit::event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent};
    use winit::event_loop::{ControlFlow, EventLoop};
    use winit::window::WindowBuilder;

    // wasm32 환경에서만 wasm_bindgen 활용
    #[cfg(target_arch = "wasm32")]
    use wasm_bindgen::prelude::*;

    use crate::app::Application;

    // wasm 연결시 아래 함수를 시작점으로 삼도록 함.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen(start))]
    pub fn run() {
        // 로거 초기화
        cfg_if! {
            // 만약 현재 환경이 wasm32라면
            if #[cfg(target_arch = "wasm32")] {
                // panic 발생시 웹 브라우저의 console.err에 로그 띄우기
                std::panic::set_hook(Box::new(console_error_panic_hook::hook));
                // 이미 로거가 있으면 그걸 그대로 씀
                let _ = console_log::init_with_level(log::Level::Debug);
            } else {
                // 아니면 기본적인 로거만 불러오기
                env_logger::init();
            }
        }

        cfg_if! {
            if #[cfg(target_arch = "wasm32")] {
                wasm_bindgen_futures::spawn_local(async {
                    if let Err(error) = run_event_loop().await {
                        error!("{}", error);
                    }
                });
            } else {
                if let Err(error) = pollster::block_on(run_event_loop()) {
                    error!("{}", error);
                }
            }
        }
    }

    async fn run_event_loop() -> crate::Result<()> {
        let event_loop = EventLoop::new();
        let window = WindowBuilder::new()
            .with_title("Lumen: Path Tracer")
            .with_inner_size(LogicalSize::new(1280.0, 720.0))
            .build(&event_loop)?;

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowExtWebSys;

            // 페이지의 #lumen 요소에 캔버스를 붙여야 화면에 보임
            let attached = web_sys::window()
                .and_then(|win| win.document())
                .and_then(|doc| doc.get_element_by_id("lumen"))
                .and_then(|dst| dst.append_child(&web_sys::Element::from(window.canvas())).ok());
            if attached.is_none() {
                warn!("failed to attach canvas to #lumen");
            }
        }

        let mut app = Application::new(window, &event_loop).await?;

        event_loop.run(move |event, _, control_flow| match event {
            Event::WindowEvent { ref event, window_id } if window_id == app.window.id() => {
                if app.input(event) {
                    return;
                }

                match event {
                    // 만약 앱을 운영체제에서 닫으려고 하거나
                    WindowEvent::CloseRequested |
                    // ESC가 눌렸다면
                    WindowEvent::KeyboardInput {
                        input: KeyboardInput {
                            state: ElementState::Pressed, virtual_keycode: Some(VirtualKeyCode::Escape), ..
                        }, ..
                    } => *control_flow = ControlFlow::ExitWithCode(0), // 나가기
                    WindowEvent::Resized(size) => app.resize(*size),
                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => app.resize(**new_inner_size),
                    _ => {}
                }
            }
            Event::DeviceEvent { ref event, .. } => app.device_input(event),
            Event::RedrawRequested(window_id) if window_id == app.window.id() => {
                app.update();
                match app.render() {
                    Ok(()) => {}
                    // 표면을 잃어버렸으면 다시 설정
                    Err(SurfaceError::Lost | SurfaceError::Outdated) => app.resize(app.size),
                    Err(SurfaceError::OutOfMemory) => {
                        error!("out of GPU memory");
                        *control_flow = ControlFlow::ExitWithCode(1);
                    }
                    Err(SurfaceError::Timeout) => warn!("surface timeout"),
                }
            }
            Event::MainEventsCleared => app.window.request_redraw(),
            _ => {}
        });
    }
}
