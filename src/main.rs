mod app;
mod ui;

use app::DecisionMakerApp;
use eframe::egui;
use eframe::egui_wgpu;
use tracing_subscriber::EnvFilter;

fn main() -> eframe::Result<()> {
    // RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("DecisionMaker")
            .with_inner_size([1280.0, 900.0])
            .with_min_inner_size([800.0, 600.0])
            .with_drag_and_drop(true),
        wgpu_options: egui_wgpu::WgpuConfiguration {
            present_mode: eframe::wgpu::PresentMode::AutoVsync,
            wgpu_setup: egui_wgpu::WgpuSetup::CreateNew(egui_wgpu::WgpuSetupCreateNew {
                instance_descriptor: eframe::wgpu::InstanceDescriptor {
                    // DX12 first on Windows, Vulkan and GL as fallbacks.
                    backends: eframe::wgpu::Backends::DX12
                        | eframe::wgpu::Backends::VULKAN
                        | eframe::wgpu::Backends::GL,
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    };

    eframe::run_native(
        "DecisionMaker",
        options,
        Box::new(|cc| Ok(Box::new(DecisionMakerApp::new(cc)))),
    )
}
