use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use decisionmaker::data::loader::{self, LoadedData};
use decisionmaker::report;
use decisionmaker::state::app_state::{AppState, VERSION};
use decisionmaker::state::theme::Theme;
use decisionmaker::{analyze_column, AnalysisConfig, AnalysisError, AnalysisResult, Result};
use eframe::egui;

use crate::ui::column_dialog::{self, ColumnDialogResult, ColumnDialogState};
use crate::ui::results_panel::{self, ResultsAction};
use crate::ui::settings_dialog::{self, SettingsDialogState};

const SUPPORTED_EXTENSIONS: [&str; 5] = ["csv", "xls", "xlsx", "json", "xml"];

/// What to do when a screenshot arrives.
enum PendingScreenshot {
    SaveFile,
    Clipboard,
}

type Slot<T> = Arc<Mutex<Option<Result<T>>>>;

/// File load running on a worker thread.
struct PendingLoad {
    source: String,
    result: Slot<LoadedData>,
}

/// Analysis running on a worker thread.
struct PendingAnalysis {
    column: String,
    result: Slot<AnalysisResult>,
}

/// Take a finished worker result out of its slot, if there is one.
fn take_ready<T>(slot: &Slot<T>) -> Option<Result<T>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take()
}

/// Run `job` on a new thread. A panic inside the job is reported through the
/// slot as `AnalysisError::Worker`, so the caller always gets an outcome.
fn spawn_worker<T, F>(job: F) -> Slot<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let slot: Slot<T> = Arc::new(Mutex::new(None));
    let slot_clone = Arc::clone(&slot);
    std::thread::spawn(move || {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job))
            .unwrap_or_else(|payload| Err(AnalysisError::Worker(panic_message(payload.as_ref()))));
        *slot_clone.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(outcome);
    });
    slot
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker thread panicked".to_string())
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// The main DecisionMaker application.
pub struct DecisionMakerApp {
    pub state: AppState,
    /// Table from the most recent import, kept for re-analysis.
    loaded: Option<Arc<LoadedData>>,
    loaded_source: String,
    /// Result of the last successful run. Shared read-only with the UI.
    result: Option<Arc<AnalysisResult>>,
    column_dialog: Option<ColumnDialogState>,
    settings_dialog: Option<SettingsDialogState>,
    /// An error message shown in the footer until dismissed.
    pub error_message: Option<String>,
    /// Transient confirmation shown in the footer.
    pub status_message: Option<String>,
    show_explanation: bool,
    show_about: bool,
    pending_load: Option<PendingLoad>,
    pending_analysis: Option<PendingAnalysis>,
    pending_screenshot: Option<PendingScreenshot>,
    results_rect: Option<egui::Rect>,
}

impl DecisionMakerApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let state = AppState::new();

        let ctx = &cc.egui_ctx;
        let mut style = (*ctx.style()).clone();

        style.text_styles.insert(egui::TextStyle::Body, egui::FontId::proportional(15.0));
        style.text_styles.insert(egui::TextStyle::Button, egui::FontId::proportional(14.5));
        style.text_styles.insert(egui::TextStyle::Heading, egui::FontId::proportional(22.0));
        style.text_styles.insert(egui::TextStyle::Small, egui::FontId::proportional(12.0));
        style.text_styles.insert(egui::TextStyle::Monospace, egui::FontId::monospace(13.5));

        style.spacing.button_padding = egui::vec2(10.0, 5.0);
        style.spacing.item_spacing = egui::vec2(8.0, 6.0);
        style.spacing.window_margin = egui::Margin::same(12);

        ctx.set_style(style);
        ctx.set_visuals(styled_visuals(state.theme));

        Self {
            state,
            loaded: None,
            loaded_source: String::new(),
            result: None,
            column_dialog: None,
            settings_dialog: None,
            error_message: None,
            status_message: None,
            show_explanation: false,
            show_about: false,
            pending_load: None,
            pending_analysis: None,
            pending_screenshot: None,
            results_rect: None,
        }
    }

    fn open_file_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Data Files", &SUPPORTED_EXTENSIONS)
            .add_filter("All Files", &["*"])
            .pick_file()
        {
            self.load_file(&path);
        }
    }

    /// Parse a data file on a worker thread so the UI stays responsive.
    fn load_file(&mut self, path: &Path) {
        let path_buf = path.to_path_buf();
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let result = spawn_worker(move || loader::load_file(&path_buf));
        self.pending_load = Some(PendingLoad { source, result });
    }

    /// Run the pipeline on a worker thread for one column of the loaded table.
    fn start_analysis(&mut self, column: String) {
        let Some(loaded) = self.loaded.clone() else {
            return;
        };
        let config: AnalysisConfig = self.state.config.clone();
        let target = column.clone();
        let result = spawn_worker(move || {
            let frame = loaded.to_frame()?;
            analyze_column(&frame, &target, &config)
        });
        tracing::info!("Analysing column '{}'", column);
        self.pending_analysis = Some(PendingAnalysis { column, result });
    }

    fn open_column_dialog(&mut self) {
        if let Some(loaded) = &self.loaded {
            self.column_dialog = Some(ColumnDialogState::new(
                Arc::clone(loaded),
                self.loaded_source.clone(),
                self.state.last_column.as_deref(),
            ));
        }
    }

    fn poll_workers(&mut self) {
        if let Some(pending) = &self.pending_load {
            if let Some(outcome) = take_ready(&pending.result) {
                let source = pending.source.clone();
                self.pending_load = None;
                match outcome {
                    Ok(loaded) => {
                        self.loaded = Some(Arc::new(loaded));
                        self.loaded_source = source;
                        self.open_column_dialog();
                    }
                    Err(e) => {
                        tracing::error!("Failed to load {}: {e}", source);
                        self.error_message = Some(format!("Failed to load file: {e}"));
                    }
                }
            }
        }

        if let Some(pending) = &self.pending_analysis {
            if let Some(outcome) = take_ready(&pending.result) {
                let column = pending.column.clone();
                self.pending_analysis = None;
                match outcome {
                    Ok(result) => {
                        self.state.last_column = Some(column);
                        self.result = Some(Arc::new(result));
                        self.error_message = None;
                    }
                    Err(e) => {
                        tracing::error!("Analysis of '{}' failed: {e}", column);
                        self.error_message = Some(format!("Analysis failed: {e}"));
                    }
                }
            }
        }
    }

    fn save_settings(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .set_file_name("decisionmaker.json")
            .add_filter("DecisionMaker Settings", &["json"])
            .save_file()
        {
            if let Err(e) = self.state.save(&path) {
                tracing::error!("Failed to save settings: {e}");
                self.error_message = Some(format!("Failed to save settings: {e}"));
            }
        }
    }

    fn load_settings(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("DecisionMaker Settings", &["json"])
            .pick_file()
        {
            match AppState::load(&path) {
                Ok(state) => self.state = state,
                Err(e) => self.error_message = Some(format!("Failed to load settings: {e}")),
            }
        }
    }

    fn export_report(&mut self) {
        let Some(result) = self.result.clone() else {
            return;
        };
        if let Some(dir) = rfd::FileDialog::new().pick_folder() {
            match report::export_report(&result, &dir) {
                Ok(files) => self.status_message = Some(format!("Report saved to {}", files.report.display())),
                Err(e) => {
                    tracing::error!("Failed to export report: {e}");
                    self.error_message = Some(format!("Failed to export report: {e}"));
                }
            }
        }
    }

    fn copy_report(&mut self) {
        let Some(result) = &self.result else {
            return;
        };
        let text = report::render_report(result);
        match arboard::Clipboard::new().and_then(|mut c| c.set_text(text)) {
            Ok(()) => self.status_message = Some("Report copied to clipboard".to_string()),
            Err(e) => self.error_message = Some(format!("Failed to copy to clipboard: {e}")),
        }
    }

    /// Crop the screenshot to the results panel and save or copy it.
    fn handle_screenshot(&mut self, ctx: &egui::Context) {
        if self.pending_screenshot.is_none() {
            return;
        }
        let mut screenshot_image: Option<Arc<egui::ColorImage>> = None;
        ctx.input(|i| {
            for event in &i.raw.events {
                if let egui::Event::Screenshot { image, .. } = event {
                    screenshot_image = Some(image.clone());
                }
            }
        });
        let Some(color_image) = screenshot_image else {
            return;
        };
        let Some(action) = self.pending_screenshot.take() else {
            return;
        };

        let (rgba, width, height) = crop_rgba(&color_image, self.results_rect, ctx.pixels_per_point());

        match action {
            PendingScreenshot::SaveFile => {
                if let Some(path) = rfd::FileDialog::new()
                    .set_file_name("analysis.png")
                    .add_filter("PNG Image", &["png"])
                    .save_file()
                {
                    self.save_png(&path, rgba, width, height);
                }
            }
            PendingScreenshot::Clipboard => match arboard::Clipboard::new() {
                Ok(mut clipboard) => {
                    let img_data = arboard::ImageData {
                        width,
                        height,
                        bytes: std::borrow::Cow::Owned(rgba),
                    };
                    if let Err(e) = clipboard.set_image(img_data) {
                        self.error_message = Some(format!("Failed to copy to clipboard: {e}"));
                    } else {
                        tracing::info!("Copied screenshot to clipboard");
                    }
                }
                Err(e) => {
                    self.error_message = Some(format!("Failed to access clipboard: {e}"));
                }
            },
        }
    }

    fn save_png(&mut self, path: &Path, rgba: Vec<u8>, width: usize, height: usize) {
        match image::RgbaImage::from_raw(width as u32, height as u32, rgba) {
            Some(img) => {
                if let Err(e) = img.save(path) {
                    self.error_message = Some(format!("Failed to save image: {e}"));
                } else {
                    tracing::info!("Saved screenshot to {:?}", path);
                }
            }
            None => self.error_message = Some("Screenshot buffer has the wrong size".to_string()),
        }
    }

    fn show_header(&mut self, ctx: &egui::Context) {
        let mut import = false;
        let mut save_settings = false;
        let mut load_settings = false;

        egui::TopBottomPanel::top("header")
            .frame(egui::Frame::side_top_panel(&ctx.style()).inner_margin(egui::Margin::symmetric(16, 8)))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    let heading_response = ui.heading("DecisionMaker");
                    heading_response.context_menu(|ui| {
                        if ui.button("About DecisionMaker").clicked() {
                            self.show_about = true;
                            ui.close_menu();
                        }
                    });

                    ui.separator();

                    if ui.button("Import Data").clicked() {
                        import = true;
                    }
                    if ui.button("Settings").clicked() {
                        self.settings_dialog = Some(SettingsDialogState::new(&self.state.config));
                    }
                    if ui.button("Save Settings").clicked() {
                        save_settings = true;
                    }
                    if ui.button("Load Settings").clicked() {
                        load_settings = true;
                    }

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        let theme_label = match self.state.theme {
                            Theme::Dark => "Light Mode",
                            Theme::Light => "Dark Mode",
                        };
                        if ui.button(theme_label).clicked() {
                            self.state.theme = self.state.theme.toggle();
                        }

                        ui.separator();
                        ui.small(format!("v{VERSION}"));
                    });
                });
            });

        if import {
            self.open_file_dialog();
        }
        if save_settings {
            self.save_settings();
        }
        if load_settings {
            self.load_settings();
        }
    }

    fn show_footer(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("footer")
            .frame(egui::Frame::side_top_panel(&ctx.style()).inner_margin(egui::Margin::symmetric(16, 6)))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    let config = &self.state.config;
                    let seed = config
                        .seed
                        .map(|s| format!("seed {s}"))
                        .unwrap_or_else(|| "random seed".to_string());
                    ui.label(
                        egui::RichText::new(format!(
                            "{} simulations, {} step(s), {seed}",
                            config.simulations, config.steps
                        ))
                        .weak(),
                    );

                    if let Some(msg) = &self.status_message {
                        ui.separator();
                        ui.label(msg);
                    }

                    if let Some(msg) = &self.error_message {
                        ui.separator();
                        ui.colored_label(egui::Color32::from_rgb(255, 80, 80), msg);
                        if ui.small_button("dismiss").clicked() {
                            self.error_message = None;
                        }
                    }
                });
            });
    }

    fn show_explanation_window(&mut self, ctx: &egui::Context) {
        let mut copy = false;
        egui::Window::new("How to read the results")
            .open(&mut self.show_explanation)
            .collapsible(false)
            .resizable(true)
            .default_width(520.0)
            .default_height(480.0)
            .show(ctx, |ui| {
                if ui.button("Copy text").clicked() {
                    copy = true;
                }
                ui.add_space(4.0);
                egui::ScrollArea::vertical().show(ui, |ui| {
                    for (title, body) in report::EXPLANATION {
                        ui.label(egui::RichText::new(*title).strong());
                        ui.label(*body);
                        ui.add_space(8.0);
                    }
                });
            });

        if copy {
            match arboard::Clipboard::new().and_then(|mut c| c.set_text(report::explanation_text())) {
                Ok(()) => self.status_message = Some("Explanation copied to clipboard".to_string()),
                Err(e) => self.error_message = Some(format!("Failed to copy to clipboard: {e}")),
            }
        }
    }

    fn handle_results_action(&mut self, ctx: &egui::Context, action: ResultsAction) {
        match action {
            ResultsAction::None => {}
            ResultsAction::ChangeColumn => self.open_column_dialog(),
            ResultsAction::Rerun => {
                if let Some(result) = &self.result {
                    let column = result.column.clone();
                    self.start_analysis(column);
                }
            }
            ResultsAction::Explain => self.show_explanation = true,
            ResultsAction::ExportReport => self.export_report(),
            ResultsAction::CopyReport => self.copy_report(),
            ResultsAction::ExportImageSave => {
                self.pending_screenshot = Some(PendingScreenshot::SaveFile);
                ctx.send_viewport_cmd(egui::ViewportCommand::Screenshot(egui::UserData::default()));
            }
            ResultsAction::ExportImageClipboard => {
                self.pending_screenshot = Some(PendingScreenshot::Clipboard);
                ctx.send_viewport_cmd(egui::ViewportCommand::Screenshot(egui::UserData::default()));
            }
        }
    }
}

fn styled_visuals(theme: Theme) -> egui::Visuals {
    let mut vis = theme.visuals();
    vis.window_corner_radius = egui::CornerRadius::same(8);
    vis.widgets.noninteractive.corner_radius = egui::CornerRadius::same(6);
    vis.widgets.inactive.corner_radius = egui::CornerRadius::same(6);
    vis.widgets.hovered.corner_radius = egui::CornerRadius::same(6);
    vis.widgets.active.corner_radius = egui::CornerRadius::same(6);
    vis.widgets.open.corner_radius = egui::CornerRadius::same(6);
    vis.widgets.hovered.bg_stroke = egui::Stroke::new(1.5, egui::Color32::from_gray(160));
    vis.widgets.active.bg_stroke = egui::Stroke::new(2.0, egui::Color32::from_gray(200));
    vis
}

/// RGBA bytes of `image`, cropped to `rect` (in points) when given.
fn crop_rgba(image: &egui::ColorImage, rect: Option<egui::Rect>, ppp: f32) -> (Vec<u8>, usize, usize) {
    let full_w = image.width();
    let full_h = image.height();
    let Some(rect) = rect else {
        let rgba = image.pixels.iter().flat_map(|c| [c.r(), c.g(), c.b(), c.a()]).collect();
        return (rgba, full_w, full_h);
    };

    let x0 = ((rect.left() * ppp) as usize).min(full_w);
    let y0 = ((rect.top() * ppp) as usize).min(full_h);
    let x1 = ((rect.right() * ppp).ceil() as usize).min(full_w);
    let y1 = ((rect.bottom() * ppp).ceil() as usize).min(full_h);
    let cw = x1.saturating_sub(x0);
    let ch = y1.saturating_sub(y0);
    let mut cropped = Vec::with_capacity(cw * ch * 4);
    for row in y0..y1 {
        for col in x0..x1 {
            let c = image.pixels[row * full_w + col];
            cropped.extend_from_slice(&[c.r(), c.g(), c.b(), c.a()]);
        }
    }
    (cropped, cw, ch)
}

impl eframe::App for DecisionMakerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(styled_visuals(self.state.theme));

        // 0. Screenshot requested last frame
        self.handle_screenshot(ctx);

        // 1. Dropped files: the last supported one wins
        let mut dropped: Option<PathBuf> = None;
        ctx.input(|i| {
            for file in &i.raw.dropped_files {
                if let Some(path) = &file.path {
                    if is_supported(path) {
                        dropped = Some(path.clone());
                    }
                }
            }
        });
        if let Some(path) = dropped {
            self.load_file(&path);
        }

        // 2. Worker results
        self.poll_workers();

        // 3. Panels
        self.show_header(ctx);
        self.show_footer(ctx);

        let mut action = ResultsAction::None;
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| match &self.result {
                Some(result) => {
                    action = results_panel::show_results_panel(
                        result,
                        ui,
                        &self.state.theme,
                        &mut self.results_rect,
                    );
                }
                None => {
                    ui.add_space(80.0);
                    ui.vertical_centered(|ui| {
                        ui.heading("Welcome to DecisionMaker");
                        ui.add_space(12.0);
                        ui.label(
                            egui::RichText::new(
                                "Click \"Import Data\" above, or drag-and-drop a CSV, Excel or JSON file to get started.",
                            )
                            .weak(),
                        );
                    });
                }
            });
        });
        self.handle_results_action(ctx, action);

        // 4. Busy indicator
        let busy = match (&self.pending_load, &self.pending_analysis) {
            (Some(_), _) => Some("Loading file...".to_string()),
            (None, Some(p)) => Some(format!("Analysing '{}'...", p.column)),
            (None, None) => None,
        };
        if let Some(text) = busy {
            egui::Window::new("Working")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label(text);
                    });
                });
            ctx.request_repaint();
        }

        // 5. Column dialog
        if let Some(dialog) = &mut self.column_dialog {
            match column_dialog::show_column_dialog(ctx, dialog) {
                Some(ColumnDialogResult::Analyze(column)) => {
                    self.column_dialog = None;
                    self.start_analysis(column);
                }
                Some(ColumnDialogResult::Cancel) => self.column_dialog = None,
                None => {}
            }
        }

        // 6. Settings dialog
        if let Some(dialog) = &mut self.settings_dialog {
            let (keep, applied) = settings_dialog::show_settings_dialog(ctx, dialog);
            if let Some(config) = applied {
                tracing::info!("Analysis settings updated: {:?}", config);
                self.state.config = config;
            }
            if !keep {
                self.settings_dialog = None;
            }
        }

        // 7. Explanation and About windows
        if self.show_explanation {
            self.show_explanation_window(ctx);
        }
        if self.show_about {
            egui::Window::new("About DecisionMaker")
                .open(&mut self.show_about)
                .collapsible(false)
                .resizable(false)
                .default_width(320.0)
                .show(ctx, |ui| {
                    ui.heading("DecisionMaker");
                    ui.label(format!("Version: {VERSION}"));
                    ui.add_space(4.0);
                    ui.label("Descriptive statistics, trend forecasting and Monte Carlo projection for tabular data.");
                    ui.add_space(10.0);
                    ui.label("Right-click the title for this menu.");
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_extensions() {
        assert!(is_supported(Path::new("data.CSV")));
        assert!(is_supported(Path::new("/tmp/sheet.xlsx")));
        assert!(is_supported(Path::new("records.json")));
        assert!(is_supported(Path::new("export.xml")));
        assert!(!is_supported(Path::new("notes.txt")));
        assert!(!is_supported(Path::new("no_extension")));
    }

    #[test]
    fn crop_to_rect() {
        let mut image = egui::ColorImage::new([4, 4], egui::Color32::BLACK);
        image.pixels[5] = egui::Color32::WHITE; // (1, 1)
        let rect = egui::Rect::from_min_max(egui::pos2(1.0, 1.0), egui::pos2(3.0, 3.0));
        let (rgba, w, h) = crop_rgba(&image, Some(rect), 1.0);
        assert_eq!((w, h), (2, 2));
        assert_eq!(rgba.len(), 16);
        assert_eq!(&rgba[0..4], &[255, 255, 255, 255]);
    }

    #[test]
    fn worker_slot_receives_result() {
        let slot = spawn_worker(|| Ok(7));
        let mut outcome = None;
        for _ in 0..200 {
            outcome = take_ready(&slot);
            if outcome.is_some() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(outcome.unwrap().unwrap(), 7);
    }

    fn wait_for<T>(slot: &Slot<T>) -> Option<Result<T>> {
        for _ in 0..200 {
            if let Some(outcome) = take_ready(slot) {
                return Some(outcome);
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn panicking_worker_reports_an_error() {
        let slot: Slot<u32> = spawn_worker(|| panic!("column vanished"));
        match wait_for(&slot) {
            Some(Err(AnalysisError::Worker(message))) => assert!(message.contains("column vanished")),
            other => panic!("expected a worker error, got {other:?}"),
        }
    }

    #[test]
    fn poisoned_slot_is_still_read() {
        let slot: Slot<u32> = Arc::new(Mutex::new(Some(Ok(3))));
        let poisoner = Arc::clone(&slot);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(slot.is_poisoned());
        assert_eq!(take_ready(&slot).unwrap().unwrap(), 3);
    }
}
