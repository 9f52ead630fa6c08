use decisionmaker::processing::histogram::{histogram, BoxSummary, DEFAULT_BINS};
use decisionmaker::processing::trend::MIN_GOOD_R_SQUARED;
use decisionmaker::state::theme::Theme;
use decisionmaker::AnalysisResult;
use egui_plot::{Bar, BarChart, BoxElem, BoxPlot, BoxSpread, HLine, Legend, Plot, VLine};

/// Actions that the results panel can request from the parent.
pub enum ResultsAction {
    None,
    ChangeColumn,
    Rerun,
    Explain,
    ExportReport,
    CopyReport,
    ExportImageSave,
    ExportImageClipboard,
}

fn toolbar_btn(ui: &mut egui::Ui, label: &str) -> egui::Response {
    ui.add(egui::Button::new(label).min_size(egui::vec2(0.0, 26.0)))
}

/// Render the results of one analysis. `last_rect` receives the panel rect so
/// image exports can crop the screenshot to it.
pub fn show_results_panel(
    result: &AnalysisResult,
    ui: &mut egui::Ui,
    theme: &Theme,
    last_rect: &mut Option<egui::Rect>,
) -> ResultsAction {
    let mut action = ResultsAction::None;

    let frame_resp = egui::Frame::group(ui.style())
        .inner_margin(egui::Margin::same(10))
        .corner_radius(egui::CornerRadius::same(8))
        .show(ui, |ui| {
            // --- Title row ---
            ui.horizontal(|ui| {
                ui.heading(format!("Data Analysis Results: {}", result.column));
                ui.label(egui::RichText::new(format!("{} values", result.count)).weak());
            });

            ui.add_space(2.0);

            // --- Toolbar row ---
            ui.horizontal_wrapped(|ui| {
                ui.spacing_mut().item_spacing.x = 4.0;

                if toolbar_btn(ui, "Change Column").on_hover_text("Analyse another column").clicked() {
                    action = ResultsAction::ChangeColumn;
                }
                if toolbar_btn(ui, "Re-run")
                    .on_hover_text("Run the analysis again with the current settings")
                    .clicked()
                {
                    action = ResultsAction::Rerun;
                }
                if toolbar_btn(ui, "How to read").on_hover_text("Explain each metric").clicked() {
                    action = ResultsAction::Explain;
                }

                ui.separator();

                let export_popup_id = ui.make_persistent_id("export_popup");
                let export_btn_resp = toolbar_btn(ui, "Export").on_hover_text("Export the report or an image");
                if export_btn_resp.clicked() {
                    ui.memory_mut(|m| m.toggle_popup(export_popup_id));
                }
                egui::popup_below_widget(
                    ui,
                    export_popup_id,
                    &export_btn_resp,
                    egui::PopupCloseBehavior::CloseOnClickOutside,
                    |ui| {
                        ui.set_min_width(160.0);
                        if ui.button("Save Report").clicked() {
                            action = ResultsAction::ExportReport;
                            ui.memory_mut(|m| m.toggle_popup(export_popup_id));
                        }
                        if ui.button("Copy Report").clicked() {
                            action = ResultsAction::CopyReport;
                            ui.memory_mut(|m| m.toggle_popup(export_popup_id));
                        }
                        if ui.button("Save as Image").clicked() {
                            action = ResultsAction::ExportImageSave;
                            ui.memory_mut(|m| m.toggle_popup(export_popup_id));
                        }
                        if ui.button("Copy Image").clicked() {
                            action = ResultsAction::ExportImageClipboard;
                            ui.memory_mut(|m| m.toggle_popup(export_popup_id));
                        }
                    },
                );
            });

            ui.add_space(6.0);

            ui.columns(2, |cols| {
                show_metrics_table(result, &mut cols[0]);
                show_metric_chart(result, &mut cols[1], theme);
            });

            ui.add_space(8.0);
            ui.separator();
            show_projection(result, ui, theme);

            ui.add_space(8.0);
            ui.separator();
            show_recommendations(result, ui);
        });
    *last_rect = Some(frame_resp.response.rect);

    action
}

fn show_metrics_table(result: &AnalysisResult, ui: &mut egui::Ui) {
    use egui_extras::{Column, TableBuilder};

    let mut rows: Vec<(String, String)> = result
        .scalar_metrics()
        .into_iter()
        .map(|(label, value)| (label.to_string(), format!("{value:.3}")))
        .collect();
    rows.push(("Median".into(), format!("{:.3}", result.median)));
    rows.push((
        "Coefficient of variation %".into(),
        format!("{:.2}", result.coefficient_of_variation),
    ));
    rows.push((
        "Skewness".into(),
        result
            .skewness
            .map(|s| format!("{s:.3}"))
            .unwrap_or_else(|| "n/a".into()),
    ));
    rows.push(("Slope".into(), format!("{:.4}", result.slope)));
    rows.push(("Intercept".into(), format!("{:.4}", result.intercept)));
    rows.push(("R\u{b2}".into(), format!("{:.4}", result.r_squared)));
    rows.push(("p-value".into(), format!("{:.4}", result.p_value)));

    ui.label(egui::RichText::new("Metrics").strong());
    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
        .column(Column::auto().at_least(180.0))
        .column(Column::remainder().at_least(100.0))
        .min_scrolled_height(260.0)
        .header(20.0, |mut header| {
            header.col(|ui| {
                ui.strong("Metric");
            });
            header.col(|ui| {
                ui.strong("Value");
            });
        })
        .body(|body| {
            body.rows(18.0, rows.len(), |mut row| {
                let (label, value) = &rows[row.index()];
                row.col(|ui| {
                    ui.label(label);
                });
                row.col(|ui| {
                    ui.monospace(value);
                });
            });
        });

    if result.r_squared < MIN_GOOD_R_SQUARED {
        ui.add_space(4.0);
        ui.colored_label(
            egui::Color32::from_rgb(230, 160, 40),
            format!(
                "Weak trend: R\u{b2} = {:.2}, the forecast is unreliable.",
                result.r_squared
            ),
        );
    }
}

fn show_metric_chart(result: &AnalysisResult, ui: &mut egui::Ui, theme: &Theme) {
    let metrics = result.scalar_metrics();
    let labels: Vec<String> = metrics.iter().map(|(l, _)| l.to_string()).collect();
    let bars: Vec<Bar> = metrics
        .iter()
        .enumerate()
        .map(|(i, (label, value))| Bar::new(i as f64, *value).width(0.7).name(*label))
        .collect();

    ui.label(egui::RichText::new("Data Analysis Results").strong());
    Plot::new("metric_chart")
        .height(280.0)
        .allow_scroll(false)
        .allow_drag(false)
        .allow_zoom(false)
        .x_axis_formatter(move |mark, _range| {
            let idx = mark.value.round();
            if (mark.value - idx).abs() > 1e-6 || idx < 0.0 {
                return String::new();
            }
            labels.get(idx as usize).cloned().unwrap_or_default()
        })
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).color(theme.metric_color()).name("Metrics"));
        });
}

fn show_projection(result: &AnalysisResult, ui: &mut egui::Ui, theme: &Theme) {
    let draws = result.projections.first_step();
    let (steps, sims) = result.projections.shape();

    ui.label(egui::RichText::new("Monte Carlo projection").strong());
    ui.label(
        egui::RichText::new(format!(
            "{sims} draws per step, {steps} step(s), {} noise. Histogram shows the next step.",
            result.noise_model.label()
        ))
        .weak(),
    );

    let bars: Vec<Bar> = histogram(draws, DEFAULT_BINS)
        .iter()
        .map(|bin| Bar::new(bin.center(), bin.count as f64).width(bin.width()))
        .collect();

    Plot::new("projection_histogram")
        .height(240.0)
        .legend(Legend::default())
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(
                BarChart::new(bars)
                    .color(theme.projection_color())
                    .name("Projected values"),
            );
            plot_ui.vline(VLine::new(result.forecast).color(theme.marker_color()).name("Forecast"));
            plot_ui.vline(VLine::new(result.ideal).name("Ideal"));
            plot_ui.vline(VLine::new(result.tension).name("Tension"));
        });

    // One box per projected step.
    let boxes: Vec<BoxElem> = result
        .projections
        .rows()
        .enumerate()
        .filter_map(|(k, row)| {
            let summary = BoxSummary::compute(row)?;
            Some(
                BoxElem::new(
                    (k + 1) as f64,
                    BoxSpread::new(summary.min, summary.q1, summary.median, summary.q3, summary.max),
                )
                .name(format!("Step {}", k + 1)),
            )
        })
        .collect();

    Plot::new("projection_box")
        .height(200.0)
        .legend(Legend::default())
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.box_plot(BoxPlot::new(boxes).color(theme.projection_color()).name("Projection"));
            plot_ui.hline(HLine::new(result.mean).name("Mean"));
        });
}

fn show_recommendations(result: &AnalysisResult, ui: &mut egui::Ui) {
    ui.label(egui::RichText::new("Recommendations").strong());
    ui.add_space(4.0);
    if result.recommendations.is_empty() {
        ui.label(egui::RichText::new("No recommendations.").weak());
        return;
    }
    for (i, rec) in result.recommendations.iter().enumerate() {
        ui.label(format!("{}. {}", i + 1, rec));
    }
}
